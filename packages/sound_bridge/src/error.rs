use std::fmt;

use thiserror::Error;

use crate::ContextState;

/// Error codes reported by the native sound server client.
///
/// The native library keeps the code of the most recent failure on each connection. The bridge
/// reads it whenever an operation fails so that the caller learns why, not just that it failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorCode {
    /// No error.
    Ok,
    /// Access failure.
    Access,
    /// Unknown command.
    Command,
    /// Invalid argument.
    Invalid,
    /// Entity exists.
    Exist,
    /// No such entity.
    NoEntity,
    /// Connection refused.
    ConnectionRefused,
    /// Protocol error.
    Protocol,
    /// Timeout.
    Timeout,
    /// No authentication key.
    AuthKey,
    /// Internal error.
    Internal,
    /// Connection terminated.
    ConnectionTerminated,
    /// Entity killed.
    Killed,
    /// Invalid server.
    InvalidServer,
    /// Module initialization failed.
    ModInitFailed,
    /// Bad state.
    BadState,
    /// No data.
    NoData,
    /// Incompatible protocol version.
    Version,
    /// Data too large.
    TooLarge,
    /// Operation not supported.
    NotSupported,
    /// The error code was unknown to the client.
    Unknown,
    /// Extension does not exist.
    NoExtension,
    /// Obsolete functionality.
    Obsolete,
    /// Missing implementation.
    NotImplemented,
    /// The caller forked without calling execve() and tried to reuse the context.
    Forked,
    /// An IO error happened.
    Io,
    /// Device or resource busy.
    Busy,
}

impl ErrorCode {
    /// Maps a raw native error number to an [`ErrorCode`].
    ///
    /// Negative numbers are accepted because some native entry points report errors as negated
    /// codes. Numbers outside the known table map to [`ErrorCode::Unknown`].
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        match raw.unsigned_abs() {
            0 => Self::Ok,
            1 => Self::Access,
            2 => Self::Command,
            3 => Self::Invalid,
            4 => Self::Exist,
            5 => Self::NoEntity,
            6 => Self::ConnectionRefused,
            7 => Self::Protocol,
            8 => Self::Timeout,
            9 => Self::AuthKey,
            10 => Self::Internal,
            11 => Self::ConnectionTerminated,
            12 => Self::Killed,
            13 => Self::InvalidServer,
            14 => Self::ModInitFailed,
            15 => Self::BadState,
            16 => Self::NoData,
            17 => Self::Version,
            18 => Self::TooLarge,
            19 => Self::NotSupported,
            21 => Self::NoExtension,
            22 => Self::Obsolete,
            23 => Self::NotImplemented,
            24 => Self::Forked,
            25 => Self::Io,
            26 => Self::Busy,
            _ => Self::Unknown,
        }
    }

    /// Human-readable description of the error, matching the native library's wording.
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Access => "Access denied",
            Self::Command => "Unknown command",
            Self::Invalid => "Invalid argument",
            Self::Exist => "Entity exists",
            Self::NoEntity => "No such entity",
            Self::ConnectionRefused => "Connection refused",
            Self::Protocol => "Protocol error",
            Self::Timeout => "Timeout",
            Self::AuthKey => "No authentication key",
            Self::Internal => "Internal error",
            Self::ConnectionTerminated => "Connection terminated",
            Self::Killed => "Entity killed",
            Self::InvalidServer => "Invalid server",
            Self::ModInitFailed => "Module initialization failed",
            Self::BadState => "Bad state",
            Self::NoData => "No data",
            Self::Version => "Incompatible protocol version",
            Self::TooLarge => "Too large",
            Self::NotSupported => "Not supported",
            Self::Unknown => "Unknown error code",
            Self::NoExtension => "No such extension",
            Self::Obsolete => "Obsolete functionality",
            Self::NotImplemented => "Missing implementation",
            Self::Forked => "Client forked",
            Self::Io => "Input/Output error",
            Self::Busy => "Device or resource busy",
        }
    }
}

impl fmt::Display for ErrorCode {
    #[cfg_attr(test, mutants::skip)] // No API contract for error message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Errors that can occur when operating on a sound server connection.
///
/// A lookup that finds nothing is not an error: lookups return `Ok(None)` in that case.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The connection attempt ended in a failure state instead of becoming ready.
    #[error("connection failed in state {state:?}: {code}")]
    ConnectionFailed {
        /// The state the connection ended in.
        state: ContextState,

        /// The native error recorded for the connection.
        code: ErrorCode,
    },

    /// The operation requires a ready connection but the context is not connected.
    #[error("context is not connected (state {state:?})")]
    NotConnected {
        /// The state the connection is currently in.
        state: ContextState,
    },

    /// A connection was requested on a context that is already connected.
    #[error("context is already connected")]
    AlreadyConnected,

    /// The native library refused to start the operation, so no result will ever arrive.
    #[error("operation was rejected: {code}")]
    OperationRejected {
        /// The native error recorded for the connection.
        code: ErrorCode,
    },

    /// The server completed the operation but reported failure.
    #[error("operation failed: {code}")]
    OperationFailed {
        /// The native error recorded for the connection.
        code: ErrorCode,
    },

    /// The operation was cancelled before producing its result, typically because the
    /// connection was lost while it was in flight.
    #[error("operation was cancelled before it completed")]
    OperationCancelled,

    /// The operation finished without ever delivering a result or an end marker.
    ///
    /// This indicates a broken callback protocol and is never retried.
    #[error("operation '{operation}' completed without delivering a result")]
    ProtocolViolation {
        /// The name of the operation that misbehaved.
        operation: &'static str,
    },

    /// The operation did not complete within the configured timeout.
    ///
    /// The context is abandoned afterwards and refuses further operations.
    #[error("operation timed out")]
    TimedOut,

    /// An earlier operation on this context timed out and the context was abandoned.
    #[error("context was abandoned after an operation timed out")]
    Abandoned,

    /// The context has been closed.
    #[error("context has been closed")]
    Closed,

    /// The event loop that drives the connection has been stopped.
    #[error("event loop has been stopped")]
    LoopStopped,
}

/// A specialized `Result` type for sound server operations, returning the crate's [`Error`]
/// type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);
    assert_impl_all!(ErrorCode: Send, Sync, Copy);

    #[test]
    fn raw_codes_map_to_known_variants() {
        assert_eq!(ErrorCode::from_raw(0), ErrorCode::Ok);
        assert_eq!(ErrorCode::from_raw(5), ErrorCode::NoEntity);
        assert_eq!(ErrorCode::from_raw(-5), ErrorCode::NoEntity);
        assert_eq!(ErrorCode::from_raw(26), ErrorCode::Busy);
    }

    #[test]
    fn unknown_raw_codes_map_to_unknown() {
        assert_eq!(ErrorCode::from_raw(20), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_raw(9999), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_raw(i32::MIN), ErrorCode::Unknown);
    }

    #[test]
    fn failed_operation_carries_code() {
        let error = Error::OperationFailed {
            code: ErrorCode::Access,
        };

        assert!(matches!(
            error,
            Error::OperationFailed {
                code: ErrorCode::Access
            }
        ));
    }
}
