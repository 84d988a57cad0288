//! Host-order serialization of the fixed wire headers.
//!
//! The protocol does not byte-swap: integers are laid out exactly as the
//! host stores them. Interoperability is therefore tied to architectures
//! sharing endianness with the server, a constraint imposed by the server's
//! established format.

use crate::protocol::{BatchHeader, OpHeader, ResponseHeader};
#[cfg(test)]
use crate::{
    error::Error,
    protocol::{MAGIC, VERSION},
};

pub(crate) fn read_u16(buf: &[u8]) -> u16 {
    u16::from_ne_bytes([buf[0], buf[1]])
}

pub(crate) fn read_u32(buf: &[u8]) -> u32 {
    u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]])
}

#[cfg(test)]
pub(crate) fn read_u64(buf: &[u8]) -> u64 {
    u64::from_ne_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

pub(crate) fn read_i64(buf: &[u8]) -> i64 {
    i64::from_ne_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Reads a native machine word, the width range-query entries use for
/// their value-length field.
pub(crate) fn read_usize(buf: &[u8]) -> usize {
    let mut word = [0u8; core::mem::size_of::<usize>()];
    let len = word.len();
    word.copy_from_slice(&buf[..len]);
    usize::from_ne_bytes(word)
}

impl BatchHeader {
    pub(crate) fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.version.to_ne_bytes());
        buf[6..8].copy_from_slice(&self.count.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_ne_bytes());
        buf
    }

    /// Decodes a batch header, rejecting unknown magic or version.
    #[cfg(test)]
    pub(crate) fn decode(buf: &[u8; Self::WIRE_LEN]) -> Result<Self, Error> {
        let header = Self {
            magic: read_u32(&buf[0..4]),
            version: read_u16(&buf[4..6]),
            count: read_u16(&buf[6..8]),
            flags: read_u32(&buf[8..12]),
        };
        if header.magic != MAGIC {
            return Err(Error::Protocol("bad batch magic"));
        }
        if header.version != VERSION {
            return Err(Error::Protocol("unsupported protocol version"));
        }
        Ok(header)
    }
}

impl OpHeader {
    pub(crate) fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..2].copy_from_slice(&self.command.to_ne_bytes());
        buf[2..4].copy_from_slice(&self.key_len.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.value_len.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf
    }

    #[cfg(test)]
    pub(crate) fn decode(buf: &[u8; Self::WIRE_LEN]) -> Self {
        Self {
            command: read_u16(&buf[0..2]),
            key_len: read_u16(&buf[2..4]),
            value_len: read_u32(&buf[4..8]),
            timestamp: read_u64(&buf[8..16]),
        }
    }
}

impl ResponseHeader {
    #[cfg(test)]
    pub(crate) fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..4].copy_from_slice(&self.status.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.value_len.to_ne_bytes());
        buf
    }

    pub(crate) fn decode(buf: &[u8; Self::WIRE_LEN]) -> Self {
        Self {
            status: read_u32(&buf[0..4]),
            value_len: read_u32(&buf[4..8]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, CLIENT_FLAGS, MAX_KEY_SIZE, MAX_VALUE_SIZE};

    #[test]
    fn batch_header_round_trip() {
        for count in [1u16, 42, 128] {
            let header = BatchHeader::for_count(count);
            let decoded = BatchHeader::decode(&header.encode()).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test]
    fn batch_header_sentinels() {
        let encoded = BatchHeader::for_count(7).encode();
        assert_eq!(read_u32(&encoded[0..4]), 0x524F4943);
        assert_eq!(read_u16(&encoded[4..6]), 2);
        assert_eq!(read_u16(&encoded[6..8]), 7);
        assert_eq!(read_u32(&encoded[8..12]), 0x6);
        assert_eq!(CLIENT_FLAGS, 0x6);
    }

    #[test]
    fn batch_header_rejects_bad_magic() {
        let mut encoded = BatchHeader::for_count(1).encode();
        encoded[0] ^= 0xFF;
        match BatchHeader::decode(&encoded) {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn batch_header_rejects_bad_version() {
        let mut header = BatchHeader::for_count(1);
        header.version = 3;
        match BatchHeader::decode(&header.encode()) {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn op_header_round_trip_grid() {
        let kinds = [
            Command::Get,
            Command::Insert,
            Command::Delete,
            Command::RangeQuery,
            Command::AtomicIncDec,
        ];
        for kind in kinds {
            for key_len in [1u16, MAX_KEY_SIZE as u16] {
                for value_len in [0u32, 1, MAX_VALUE_SIZE as u32] {
                    let header = OpHeader {
                        command: kind.as_u16(),
                        key_len,
                        value_len,
                        timestamp: 0xDEAD_BEEF_CAFE_F00D,
                    };
                    assert_eq!(OpHeader::decode(&header.encode()), header);
                }
            }
        }
    }

    #[test]
    fn op_header_round_trip_rand() {
        for _ in 0..256 {
            let header = OpHeader::rand();
            let decoded = OpHeader::decode(&header.encode());
            assert_eq!(decoded, header);
            assert!(Command::from_u16(decoded.command).is_some());
        }
    }

    #[test]
    fn response_header_round_trip() {
        for (status, value_len) in [(0i32, 0u32), (0, 100_000), (-6, 0), (-3, 8)] {
            let header = ResponseHeader {
                status: status as u32,
                value_len,
            };
            let decoded = ResponseHeader::decode(&header.encode());
            assert_eq!(decoded, header);
            assert_eq!(decoded.status_code(), status);
        }
    }

    #[test]
    fn native_word_readers() {
        let value = usize::MAX - 12345;
        assert_eq!(read_usize(&value.to_ne_bytes()), value);
        let counter = -987_654_321i64;
        assert_eq!(read_i64(&counter.to_ne_bytes()), counter);
    }
}
