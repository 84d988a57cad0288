//! Error handling for the client.
//!
//! Two layers exist side by side. [`Status`] is the set of stable numeric
//! codes that cross the wire: the server reports one per operation and the
//! client forwards it verbatim into the matching result slot. [`Error`] is
//! the crate's error type for fallible calls; every variant maps onto
//! exactly one [`Status`] via [`Error::status`], so the numeric taxonomy is
//! preserved end to end.

use std::io;

use thiserror::Error;

/// Stable per-operation status code shared with the server.
///
/// The numeric values are fixed by the wire protocol and must never be
/// renumbered. [`Status::Success`] is the only non-error code; everything
/// else is negative. Semantic outcomes such as [`Status::KeyNotFound`] are
/// ordinary slot statuses for batch consumers and are only promoted to an
/// [`Error`] by the single-operation facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Operation completed.
    Success = 0,
    /// A caller-supplied argument violates a precondition.
    InvalidParam = -1,
    /// Local allocation failure.
    OutOfMemory = -2,
    /// Transport failure, timeout, or byte-stream level decode failure.
    Io = -3,
    /// Magic/version mismatch or a typed payload with the wrong length.
    Protocol = -4,
    /// Server-side backing device error.
    Device = -5,
    /// No entry exists for the key.
    KeyNotFound = -6,
    /// Server resource temporarily contended.
    Busy = -7,
    /// Buffer or length overflow.
    Overflow = -8,
}

impl Status {
    /// The numeric code transmitted on the wire.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps a wire code back to a status. Unknown codes yield `None`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            -1 => Some(Self::InvalidParam),
            -2 => Some(Self::OutOfMemory),
            -3 => Some(Self::Io),
            -4 => Some(Self::Protocol),
            -5 => Some(Self::Device),
            -6 => Some(Self::KeyNotFound),
            -7 => Some(Self::Busy),
            -8 => Some(Self::Overflow),
            _ => None,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::InvalidParam => "invalid parameter",
            Self::OutOfMemory => "out of memory",
            Self::Io => "i/o failure",
            Self::Protocol => "protocol violation",
            Self::Device => "device error",
            Self::KeyNotFound => "key not found",
            Self::Busy => "busy",
            Self::Overflow => "overflow",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Error returned by fallible client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument violates a precondition. Raised locally,
    /// before any wire activity.
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// Local allocation failure.
    #[error("allocation failed")]
    OutOfMemory,

    /// Transport failure or timeout. Once raised for a session, the session
    /// is invalid and every subsequent operation on it fails the same way.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    /// The byte stream violated the wire protocol: bad magic or version, a
    /// typed payload with the wrong length, or a length field exceeding the
    /// protocol maxima.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    /// TLS configuration or handshake failure.
    #[error("tls failure: {0}")]
    Tls(#[from] rustls::Error),

    /// The server reported a backing device error.
    #[error("server device error")]
    Device,

    /// The server holds no entry for the key.
    #[error("key not found")]
    KeyNotFound,

    /// The resource is temporarily contended: the server reported
    /// contention, or a batch is already in flight on this session.
    #[error("resource busy")]
    Busy,

    /// Buffer or length overflow.
    #[error("length overflow")]
    Overflow,
}

impl Error {
    /// The wire status this error corresponds to.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidParam(_) => Status::InvalidParam,
            Self::OutOfMemory => Status::OutOfMemory,
            Self::Io(_) => Status::Io,
            Self::Protocol(_) => Status::Protocol,
            Self::Tls(_) => Status::Protocol,
            Self::Device => Status::Device,
            Self::KeyNotFound => Status::KeyNotFound,
            Self::Busy => Status::Busy,
            Self::Overflow => Status::Overflow,
        }
    }

    /// Promotes a non-success slot status to an error, as the
    /// single-operation facade does.
    pub(crate) fn from_status(status: Status) -> Self {
        match status {
            Status::Success => Self::Protocol("success status is not an error"),
            Status::InvalidParam => Self::InvalidParam("rejected by server"),
            Status::OutOfMemory => Self::OutOfMemory,
            Status::Io => Self::Io(io::Error::other("i/o failure recorded in result")),
            Status::Protocol => Self::Protocol("server reported protocol violation"),
            Status::Device => Self::Device,
            Status::KeyNotFound => Self::KeyNotFound,
            Status::Busy => Self::Busy,
            Status::Overflow => Self::Overflow,
        }
    }

    pub(crate) fn timed_out() -> Self {
        Self::Io(io::Error::new(io::ErrorKind::TimedOut, "operation timed out"))
    }

    pub(crate) fn invalid_session() -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "session invalidated by a previous failure",
        ))
    }

    pub(crate) fn not_yet_received() -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::WouldBlock,
            "response not yet received",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 9] = [
        Status::Success,
        Status::InvalidParam,
        Status::OutOfMemory,
        Status::Io,
        Status::Protocol,
        Status::Device,
        Status::KeyNotFound,
        Status::Busy,
        Status::Overflow,
    ];

    #[test]
    fn status_codes_are_stable() {
        let expected = [0, -1, -2, -3, -4, -5, -6, -7, -8];
        for (status, code) in ALL.iter().zip(expected) {
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn status_code_round_trip() {
        for status in ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(1), None);
        assert_eq!(Status::from_code(-9), None);
        assert_eq!(Status::from_code(i32::MIN), None);
    }

    #[test]
    fn error_preserves_status() {
        for status in ALL.into_iter().filter(|s| !s.is_success()) {
            assert_eq!(Error::from_status(status).status(), status);
        }
    }

    #[test]
    fn timeout_is_io() {
        let err = Error::timed_out();
        assert_eq!(err.status(), Status::Io);
        match err {
            Error::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected error: {other}"),
        }
    }
}
