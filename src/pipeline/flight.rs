//! In-flight batch state shared between submitter and receiver.
//!
//! The [`Flight`] is the single synchronization object for one submitted
//! batch: the receiver fills result slots and advances the
//! responses-received high-water mark with release ordering; readers observe
//! the mark with acquire ordering and only then touch the slots. Completion
//! is a one-shot [`Gate`] carrying an aggregate status beside it.

use std::sync::{
    atomic::{AtomicI32, AtomicUsize, Ordering},
    OnceLock,
};

use crossbeam_utils::CachePadded;

use super::batch::{Batch, Op};
use crate::{error::Status, sync::Gate};

/// Typed response payload, keyed on the originating command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Insert, Delete, or any failed operation.
    None,
    /// Opaque value returned by Get. Empty when the stored value is empty.
    Bytes(Vec<u8>),
    /// Post-operation counter value returned by AtomicIncDec.
    Counter(i64),
    /// Key/value pairs returned by RangeQuery, in key order.
    Range(Vec<RangeEntry>),
}

/// One key/value pair of a range-query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Result slot contents for one operation.
#[derive(Debug)]
pub(crate) struct OpResult {
    pub(crate) status: Status,
    /// Raw `value_len` from the response header, before per-command
    /// reinterpretation.
    pub(crate) value_len: u32,
    pub(crate) payload: Payload,
}

/// Shared state of one submitted batch.
///
/// Owns the batch (the receiver's decoding schema) and every buffer decoded
/// out of the response stream. Dropped at retirement, which releases them
/// all.
#[derive(Debug)]
pub(crate) struct Flight {
    batch: Batch,
    slots: Box<[OnceLock<OpResult>]>,
    received: CachePadded<AtomicUsize>,
    error: CachePadded<AtomicI32>,
    gate: Gate,
}

impl Flight {
    pub(crate) fn new(batch: Batch) -> Self {
        let slots = (0..batch.len()).map(|_| OnceLock::new()).collect();
        Self {
            batch,
            slots,
            received: CachePadded::new(AtomicUsize::new(0)),
            error: CachePadded::new(AtomicI32::new(Status::Success.code())),
            gate: Gate::new(),
        }
    }

    pub(crate) fn ops(&self) -> &[Op] {
        self.batch.ops()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Fills slot `index` and advances the high-water mark past it.
    ///
    /// Called by the receiver only, strictly in index order. The slot write
    /// completes before the release store, so any reader observing the mark
    /// with acquire ordering sees the slot populated.
    pub(crate) fn publish(&self, index: usize, result: OpResult) {
        let _ = self.slots[index].set(result);
        self.received.store(index + 1, Ordering::Release);
    }

    /// Number of responses received so far.
    pub(crate) fn received(&self) -> usize {
        self.received.load(Ordering::Acquire)
    }

    /// Slot contents for `index`, if already published.
    pub(crate) fn slot(&self, index: usize) -> Option<&OpResult> {
        if index >= self.received() {
            return None;
        }
        self.slots.get(index)?.get()
    }

    /// Records a fatal receiver error and completes the flight.
    pub(crate) fn fail(&self, status: Status) {
        self.error.store(status.code(), Ordering::Release);
        self.gate.open();
    }

    /// Completes the flight successfully.
    pub(crate) fn complete(&self) {
        self.gate.open();
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.gate.is_open()
    }

    /// Resolves once the receiver has finished, successfully or not.
    pub(crate) async fn completed(&self) {
        self.gate.wait().await;
    }

    /// Aggregate status: the first fatal error observed by the receiver, or
    /// success. Meaningful once the flight is complete.
    pub(crate) fn aggregate(&self) -> Status {
        Status::from_code(self.error.load(Ordering::Acquire)).unwrap_or(Status::Protocol)
    }
}
