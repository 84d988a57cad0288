//! Request serialization and delivery.
//!
//! A batch becomes a single vectored transmission of the form
//! `[BatchHeader, (OpHeader_i, Key_i, [Value_i])…]`, where a value slice is
//! present only when the operation carries value bytes. The transport's
//! coalesce hint brackets the send so the kernel can merge the pieces into
//! full segments.

use std::io::IoSlice;

use crate::{
    error::Error,
    pipeline::batch::Batch,
    protocol::{BatchHeader, OpHeader},
    transport::Transport,
};

/// Serializes and delivers `batch` as one transmission.
///
/// Failure is atomic from the caller's perspective: nothing is retried and
/// the session must be considered invalid.
pub(crate) async fn send_batch(transport: &mut Transport, batch: &Batch) -> Result<(), Error> {
    let batch_header = BatchHeader::for_count(batch.len() as u16).encode();
    let op_headers: Vec<[u8; OpHeader::WIRE_LEN]> =
        batch.ops().iter().map(|op| op.header.encode()).collect();

    let mut iov: Vec<IoSlice<'_>> = Vec::with_capacity(1 + 3 * batch.len());
    iov.push(IoSlice::new(&batch_header));
    for (op, header) in batch.ops().iter().zip(&op_headers) {
        iov.push(IoSlice::new(header));
        iov.push(IoSlice::new(op.key_bytes()));
        if let Some(range) = &op.value {
            iov.push(IoSlice::new(batch.staged(range)));
        }
    }

    transport.enable_coalesce();
    let sent = transport.sendv_all(&mut iov).await;
    transport.disable_coalesce();
    sent?;
    Ok(())
}
