//! Response reception and decoding.
//!
//! The server does not tag responses with opcodes: the Nth response belongs
//! to the Nth request, and the submitted batch is the authoritative schema
//! for interpreting each payload. [`receive`] runs as the background task of
//! one submitted batch, owns the transport's read side for its whole
//! lifetime, and returns the transport when done so the session can carry
//! the next batch.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::{
    codec,
    error::{Error, Status},
    pipeline::flight::{Flight, OpResult, Payload, RangeEntry},
    protocol::{Command, ResponseHeader, MAX_KEY_SIZE, MAX_VALUE_SIZE, RANGE_VALUE_LEN_WIDTH},
    transport::Transport,
};

const COUNTER_WIDTH: usize = core::mem::size_of::<i64>();

/// Background receiver for one submitted batch.
///
/// Consumes responses strictly in request order, publishing each result slot
/// before advancing the high-water mark. On any transport or decoding
/// failure it records the error, completes the flight, and stops; partially
/// decoded results are dropped with the failed slot.
pub(crate) async fn receive(mut transport: Transport, flight: Arc<Flight>) -> Transport {
    for index in 0..flight.len() {
        let kind = flight.ops()[index].kind;
        match read_op_response(&mut transport, kind).await {
            Ok(result) => {
                trace!(
                    index,
                    status = result.status.code(),
                    value_len = result.value_len,
                    "response received"
                );
                flight.publish(index, result);
            }
            Err(err) => {
                warn!(index, error = %err, "receiver terminated");
                flight.fail(err.status());
                return transport;
            }
        }
    }
    debug!(ops = flight.len(), "batch complete");
    flight.complete();
    transport
}

/// Reads and decodes one response, interpreting the payload per the
/// originating command.
pub(crate) async fn read_op_response<R>(reader: &mut R, kind: Command) -> Result<OpResult, Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; ResponseHeader::WIRE_LEN];
    reader.read_exact(&mut buf).await?;
    let header = ResponseHeader::decode(&buf);

    let status = Status::from_code(header.status_code())
        .ok_or(Error::Protocol("unknown status code"))?;

    // Failed operations carry no payload; the next response follows
    // immediately.
    if !status.is_success() {
        return Ok(OpResult {
            status,
            value_len: header.value_len,
            payload: Payload::None,
        });
    }

    let payload = match kind {
        Command::Insert | Command::Delete | Command::Batch => Payload::None,
        Command::Get => {
            let len = header.value_len as usize;
            if len > MAX_VALUE_SIZE {
                return Err(Error::Protocol("value length exceeds protocol maximum"));
            }
            Payload::Bytes(read_vec(reader, len).await?)
        }
        Command::AtomicIncDec => {
            if header.value_len as usize != COUNTER_WIDTH {
                return Err(Error::Protocol("atomic counter payload must be 8 bytes"));
            }
            let mut counter = [0u8; COUNTER_WIDTH];
            reader.read_exact(&mut counter).await?;
            Payload::Counter(codec::read_i64(&counter))
        }
        // value_len is reinterpreted as the number of result entries.
        Command::RangeQuery => {
            Payload::Range(read_range_entries(reader, header.value_len as usize).await?)
        }
    };

    Ok(OpResult {
        status,
        value_len: header.value_len,
        payload,
    })
}

/// Reads `count` range entries, each
/// `{u16 key_len, key, native-word value_len, value}`.
async fn read_range_entries<R>(reader: &mut R, count: usize) -> Result<Vec<RangeEntry>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut entries = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let mut key_len = [0u8; 2];
        reader.read_exact(&mut key_len).await?;
        let key_len = codec::read_u16(&key_len) as usize;
        if key_len > MAX_KEY_SIZE {
            return Err(Error::Protocol("range key length exceeds protocol maximum"));
        }
        let key = read_vec(reader, key_len).await?;

        let mut value_len = [0u8; RANGE_VALUE_LEN_WIDTH];
        reader.read_exact(&mut value_len).await?;
        let value_len = codec::read_usize(&value_len);
        if value_len > MAX_VALUE_SIZE {
            return Err(Error::Protocol("range value length exceeds protocol maximum"));
        }
        let value = read_vec(reader, value_len).await?;

        entries.push(RangeEntry { key, value });
    }
    Ok(entries)
}

async fn read_vec<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn header_bytes(status: i32, value_len: u32) -> Vec<u8> {
        ResponseHeader {
            status: status as u32,
            value_len,
        }
        .encode()
        .to_vec()
    }

    async fn decode(data: &[u8], kind: Command) -> Result<OpResult, Error> {
        let mut reader = data;
        read_op_response(&mut reader, kind).await
    }

    #[tokio::test]
    async fn get_decodes_opaque_bytes() {
        let mut data = header_bytes(0, 5);
        data.extend_from_slice(b"value");
        let result = decode(&data, Command::Get).await.unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.payload, Payload::Bytes(b"value".to_vec()));
    }

    #[tokio::test]
    async fn get_with_zero_length_is_empty_bytes() {
        let data = header_bytes(0, 0);
        let result = decode(&data, Command::Get).await.unwrap();
        assert_eq!(result.payload, Payload::Bytes(Vec::new()));
    }

    #[tokio::test]
    async fn insert_and_delete_carry_no_payload() {
        for kind in [Command::Insert, Command::Delete] {
            let data = header_bytes(0, 0);
            let result = decode(&data, kind).await.unwrap();
            assert_eq!(result.payload, Payload::None);
        }
    }

    #[tokio::test]
    async fn failed_op_payload_is_none_and_stream_is_left_alone() {
        let mut data = header_bytes(Status::KeyNotFound.code(), 0);
        // Bytes of the next response must not be consumed.
        data.extend_from_slice(&header_bytes(0, 0));

        let mut reader: &[u8] = &data;
        let result = read_op_response(&mut reader, Command::Get).await.unwrap();
        assert_eq!(result.status, Status::KeyNotFound);
        assert_eq!(result.payload, Payload::None);
        assert_eq!(reader.len(), ResponseHeader::WIRE_LEN);
    }

    #[tokio::test]
    async fn counter_round_trip() {
        for delta in [-(1i64 << 62), -1, 0, 1, 1i64 << 62] {
            let mut data = header_bytes(0, 8);
            data.extend_from_slice(&delta.to_ne_bytes());
            let result = decode(&data, Command::AtomicIncDec).await.unwrap();
            assert_eq!(result.payload, Payload::Counter(delta));
        }
    }

    #[tokio::test]
    async fn counter_with_wrong_length_is_a_protocol_error() {
        let mut data = header_bytes(0, 4);
        data.extend_from_slice(&[0u8; 4]);
        match decode(&data, Command::AtomicIncDec).await {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    fn range_entry_bytes(key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(key.len() as u16).to_ne_bytes());
        data.extend_from_slice(key);
        data.extend_from_slice(&value.len().to_ne_bytes());
        data.extend_from_slice(value);
        data
    }

    #[tokio::test]
    async fn range_decodes_entries_in_order() {
        let mut data = header_bytes(0, 3);
        data.extend_from_slice(&range_entry_bytes(b"a", b"1"));
        data.extend_from_slice(&range_entry_bytes(b"b", b"2"));
        data.extend_from_slice(&range_entry_bytes(b"c", b"3"));

        let result = decode(&data, Command::RangeQuery).await.unwrap();
        let expected = vec![
            RangeEntry {
                key: b"a".to_vec(),
                value: b"1".to_vec(),
            },
            RangeEntry {
                key: b"b".to_vec(),
                value: b"2".to_vec(),
            },
            RangeEntry {
                key: b"c".to_vec(),
                value: b"3".to_vec(),
            },
        ];
        assert_eq!(result.payload, Payload::Range(expected));
    }

    #[tokio::test]
    async fn range_with_zero_entries_is_empty() {
        let data = header_bytes(0, 0);
        let result = decode(&data, Command::RangeQuery).await.unwrap();
        assert_eq!(result.payload, Payload::Range(Vec::new()));
    }

    #[tokio::test]
    async fn oversize_range_key_is_a_protocol_error() {
        let mut data = header_bytes(0, 1);
        data.extend_from_slice(&((MAX_KEY_SIZE + 1) as u16).to_ne_bytes());
        match decode(&data, Command::RangeQuery).await {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_status_code_is_a_protocol_error() {
        let data = header_bytes(-42, 0);
        match decode(&data, Command::Get).await {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_stream_is_an_io_error() {
        let mut data = header_bytes(0, 100);
        data.extend_from_slice(b"short");
        match decode(&data, Command::Get).await {
            Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected i/o error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversize_get_length_is_a_protocol_error() {
        let data = header_bytes(0, (MAX_VALUE_SIZE + 1) as u32);
        match decode(&data, Command::Get).await {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
