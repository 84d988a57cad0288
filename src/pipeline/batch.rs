//! Batch assembly.
//!
//! A [`Batch`] accumulates up to [`MAX_BATCH_OPS`] operations before
//! submission. Keys are copied into a fixed inline buffer per operation;
//! values and range upper-bound keys are copied into a single batch-wide
//! staging buffer at cache-line-aligned offsets. Submission later references
//! these buffers directly for the vectored send, so no per-operation
//! allocations happen on the wire path.

use std::ops::Range;

use crate::{
    error::Error,
    protocol::{Command, OpHeader, MAX_BATCH_OPS, MAX_KEY_SIZE, MAX_VALUE_SIZE},
};

pub(crate) const CACHE_LINE_SIZE: usize = 128;

/// One accumulated operation: its wire header, the inline key copy, and the
/// staged value location (when the operation carries one).
#[derive(Debug)]
pub(crate) struct Op {
    pub(crate) kind: Command,
    pub(crate) header: OpHeader,
    key: [u8; MAX_KEY_SIZE],
    pub(crate) value: Option<Range<usize>>,
}

impl Op {
    pub(crate) fn key_bytes(&self) -> &[u8] {
        &self.key[..self.header.key_len as usize]
    }
}

/// An ordered list of operations transmitted as one framed unit.
///
/// A batch is mutable only during assembly. Each `add_*` method either
/// appends one operation or fails with a parameter error, leaving the batch
/// untouched. Once submitted the batch travels with its
/// [`Tracker`](crate::Tracker) and is read-only.
///
/// # Examples
///
/// ```
/// use kvpipe::Batch;
///
/// let mut batch = Batch::new();
/// batch.add_insert(b"alpha", b"1", 1000)?;
/// batch.add_get(b"alpha")?;
/// batch.add_delete(b"alpha", 1001)?;
/// assert_eq!(batch.len(), 3);
/// # Ok::<(), kvpipe::Error>(())
/// ```
#[derive(Debug)]
pub struct Batch {
    ops: Vec<Op>,
    values: Vec<u8>,
}

impl Batch {
    /// An empty batch with the value staging buffer pre-sized.
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            values: Vec::with_capacity(MAX_BATCH_OPS * CACHE_LINE_SIZE),
        }
    }

    /// Number of accumulated operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Appends a Get for `key`.
    pub fn add_get(&mut self, key: &[u8]) -> Result<(), Error> {
        self.check_capacity()?;
        check_key(key)?;
        self.push_op(Command::Get, key, None, 0);
        Ok(())
    }

    /// Appends an Insert of `value` under `key` at `timestamp`.
    pub fn add_insert(&mut self, key: &[u8], value: &[u8], timestamp: u64) -> Result<(), Error> {
        self.check_capacity()?;
        check_key(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::InvalidParam("value exceeds maximum size"));
        }
        self.push_op(Command::Insert, key, Some(value), timestamp);
        Ok(())
    }

    /// Appends a Delete of `key` at `timestamp`.
    pub fn add_delete(&mut self, key: &[u8], timestamp: u64) -> Result<(), Error> {
        self.check_capacity()?;
        check_key(key)?;
        self.push_op(Command::Delete, key, None, timestamp);
        Ok(())
    }

    /// Appends a RangeQuery over the inclusive interval
    /// `start_key..=end_key`. The upper-bound key travels in the value slot.
    pub fn add_range_query(&mut self, start_key: &[u8], end_key: &[u8]) -> Result<(), Error> {
        self.check_capacity()?;
        check_key(start_key)?;
        if end_key.len() > MAX_KEY_SIZE {
            return Err(Error::InvalidParam("key exceeds maximum size"));
        }
        self.push_op(Command::RangeQuery, start_key, Some(end_key), 0);
        Ok(())
    }

    /// Appends an AtomicIncDec applying `delta` to the counter under `key`
    /// at `timestamp`. The delta travels as an 8-byte signed integer in
    /// native byte order.
    pub fn add_atomic_inc_dec(
        &mut self,
        key: &[u8],
        delta: i64,
        timestamp: u64,
    ) -> Result<(), Error> {
        self.check_capacity()?;
        check_key(key)?;
        self.push_op(Command::AtomicIncDec, key, Some(&delta.to_ne_bytes()), timestamp);
        Ok(())
    }

    pub(crate) fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub(crate) fn staged(&self, range: &Range<usize>) -> &[u8] {
        &self.values[range.clone()]
    }

    fn check_capacity(&self) -> Result<(), Error> {
        if self.ops.len() >= MAX_BATCH_OPS {
            return Err(Error::InvalidParam("batch is full"));
        }
        Ok(())
    }

    fn push_op(&mut self, kind: Command, key: &[u8], value: Option<&[u8]>, timestamp: u64) {
        let value_len = value.map_or(0, <[u8]>::len);
        let range = value.filter(|v| !v.is_empty()).map(|v| self.stage(v));

        let mut inline = [0u8; MAX_KEY_SIZE];
        inline[..key.len()].copy_from_slice(key);

        self.ops.push(Op {
            kind,
            header: OpHeader {
                command: kind.as_u16(),
                key_len: key.len() as u16,
                value_len: value_len as u32,
                timestamp,
            },
            key: inline,
            value: range,
        });
    }

    /// Copies `bytes` into the staging buffer at the next cache-line-aligned
    /// offset and returns its location.
    fn stage(&mut self, bytes: &[u8]) -> Range<usize> {
        let start = self.values.len().next_multiple_of(CACHE_LINE_SIZE);
        self.values.resize(start, 0);
        self.values.extend_from_slice(bytes);
        start..start + bytes.len()
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

fn check_key(key: &[u8]) -> Result<(), Error> {
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::InvalidParam("key exceeds maximum size"));
    }
    Ok(())
}
