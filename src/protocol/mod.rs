//! Wire protocol definitions.
//!
//! Every request is a batch: a fixed [`BatchHeader`] followed by `count`
//! operations, each a fixed [`OpHeader`] followed by the key bytes and, when
//! `value_len > 0`, the value bytes. Responses arrive as one
//! [`ResponseHeader`] per operation, in request order, followed by a payload
//! whose shape depends on the originating command.
//!
//! All multi-byte integers travel in the host's native byte order. This is
//! fixed by the server, not a choice; see [`crate::codec`] for the
//! serialization.

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 512;

/// Maximum value length in bytes.
pub const MAX_VALUE_SIZE: usize = 100_000;

/// Maximum number of operations per batch.
pub const MAX_BATCH_OPS: usize = 128;

/// Width in bytes of the per-entry value-length field inside a range-query
/// response. The server transmits it as a native machine word; on 64-bit
/// platforms this is 8.
pub const RANGE_VALUE_LEN_WIDTH: usize = core::mem::size_of::<usize>();

/// Protocol magic, the ASCII bytes "RIOC" read as a big-endian u32.
pub(crate) const MAGIC: u32 = 0x524F_4943;

/// Protocol version.
pub(crate) const VERSION: u16 = 2;

pub(crate) mod flag {
    /// The server processes the batch without per-op acknowledgment
    /// boundaries.
    pub(crate) const PIPELINE: u32 = 0x2;

    /// Further batches may follow on this connection.
    pub(crate) const MORE: u32 = 0x4;
}

/// Flags carried by every batch this client transmits.
pub(crate) const CLIENT_FLAGS: u32 = flag::PIPELINE | flag::MORE;

/// Operation command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub(crate) enum Command {
    Get = 1,
    Insert = 2,
    Delete = 3,
    /// Reserved for server-side use; never sent directly.
    #[allow(dead_code)]
    Batch = 5,
    RangeQuery = 6,
    AtomicIncDec = 7,
}

impl Command {
    pub(crate) const fn as_u16(self) -> u16 {
        self as u16
    }

    #[cfg(test)]
    pub(crate) const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Get),
            2 => Some(Self::Insert),
            3 => Some(Self::Delete),
            5 => Some(Self::Batch),
            6 => Some(Self::RangeQuery),
            7 => Some(Self::AtomicIncDec),
            _ => None,
        }
    }
}

/// Fixed header opening every batch transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchHeader {
    pub(crate) magic: u32,
    pub(crate) version: u16,
    pub(crate) count: u16,
    pub(crate) flags: u32,
}

impl BatchHeader {
    pub(crate) const WIRE_LEN: usize = 12;

    /// Header for a client transmission carrying `count` operations.
    pub(crate) const fn for_count(count: u16) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            count,
            flags: CLIENT_FLAGS,
        }
    }
}

/// Fixed per-operation request header.
///
/// `value_len` is the raw server-interpreted length: the value byte count
/// for Insert/AtomicIncDec, or the upper-bound key length for RangeQuery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpHeader {
    pub(crate) command: u16,
    pub(crate) key_len: u16,
    pub(crate) value_len: u32,
    pub(crate) timestamp: u64,
}

impl OpHeader {
    pub(crate) const WIRE_LEN: usize = 16;

    #[cfg(test)]
    pub(crate) fn rand() -> Self {
        const COMMANDS: [Command; 5] = [
            Command::Get,
            Command::Insert,
            Command::Delete,
            Command::RangeQuery,
            Command::AtomicIncDec,
        ];
        Self {
            command: COMMANDS[rand::random_range(0..COMMANDS.len())].as_u16(),
            key_len: rand::random_range(0..=MAX_KEY_SIZE as u16),
            value_len: rand::random_range(0..=MAX_VALUE_SIZE as u32),
            timestamp: rand::random(),
        }
    }
}

/// Fixed per-operation response header.
///
/// `status` is a signed 32-bit code transmitted as u32. `value_len` is
/// reinterpreted per the originating command: value byte count for Get,
/// payload byte count for AtomicIncDec, entry count for RangeQuery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResponseHeader {
    pub(crate) status: u32,
    pub(crate) value_len: u32,
}

impl ResponseHeader {
    pub(crate) const WIRE_LEN: usize = 8;

    pub(crate) const fn status_code(&self) -> i32 {
        self.status as i32
    }
}
