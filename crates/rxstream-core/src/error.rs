//! Unified error handling for rxstream
//!
//! Every stream operation reports failure through this type. Parse-time
//! problems (`InvalidCall`, `AmbiguousOption`, ...) are raised before any
//! I/O happens; runtime conditions (`Eof`, `NotReady`) carry whatever data
//! the operation managed to transfer so callers can recover partial work.

use thiserror::Error;

use crate::types::strerror;

/// Unified error type for all rxstream operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Call Errors ====================

    /// Malformed option string or bad argument value
    #[error("Invalid call: {message}")]
    InvalidCall {
        message: String,
    },

    /// Position resolved to something below 1
    #[error("Invalid position: {position}")]
    InvalidPosition {
        position: i64,
    },

    /// Positioning attempted on a transient stream
    #[error("Stream {name} is transient and cannot be positioned")]
    WrongStreamType {
        name: String,
    },

    /// Abbreviation too short, or an option conflicts with an earlier one
    #[error("Ambiguous option: {token}")]
    AmbiguousOption {
        token: String,
    },

    /// Token matches nothing in the option table
    #[error("Invalid option: {token}")]
    InvalidOption {
        token: String,
    },

    // ==================== System Errors ====================

    /// OS-level failure, identified by its errno
    #[error("System I/O error {errno}: {message}")]
    SystemIo {
        errno: i32,
        message: String,
    },

    // ==================== Stream Conditions ====================

    /// End of data reached; `partial` holds anything read before it
    #[error("End of stream ({} bytes delivered)", .partial.len())]
    Eof {
        partial: Vec<u8>,
    },

    /// Operation could not complete as requested
    ///
    /// `errno` is 0 when the condition has no OS cause.
    #[error("Stream not ready: {reason}")]
    NotReady {
        reason: String,
        errno: i32,
        partial: Vec<u8>,
    },

    // ==================== General Errors ====================

    /// Internal error (should not happen)
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Error::system(errno),
            None => Error::SystemIo {
                errno: 0,
                message: err.to_string(),
            },
        }
    }
}

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid call error
    pub fn invalid_call(message: impl Into<String>) -> Self {
        Error::InvalidCall {
            message: message.into(),
        }
    }

    /// Create a system error from a raw errno
    pub fn system(errno: i32) -> Self {
        Error::SystemIo {
            errno,
            message: strerror(errno),
        }
    }

    /// Create a not-ready condition with no partial data
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Error::NotReady {
            reason: reason.into(),
            errno: 0,
            partial: Vec::new(),
        }
    }

    /// Create a not-ready condition caused by an OS error
    pub fn not_ready_errno(errno: i32) -> Self {
        Error::NotReady {
            reason: strerror(errno),
            errno,
            partial: Vec::new(),
        }
    }

    /// Create an end-of-data condition carrying what was read
    pub fn eof(partial: Vec<u8>) -> Self {
        Error::Eof { partial }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Strip any context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Eof and NotReady are conditions, not failures: the stream stays usable
    pub fn is_condition(&self) -> bool {
        matches!(self.root(), Error::Eof { .. } | Error::NotReady { .. })
    }

    /// Conditions and OS failures; these are reported through the stream state
    pub fn is_runtime(&self) -> bool {
        self.is_condition() || matches!(self.root(), Error::SystemIo { .. })
    }

    /// Check if this is end-of-data
    pub fn is_eof(&self) -> bool {
        matches!(self.root(), Error::Eof { .. })
    }

    /// Check if this came from the option grammar or argument validation
    pub fn is_call_error(&self) -> bool {
        matches!(
            self.root(),
            Error::InvalidCall { .. }
                | Error::InvalidPosition { .. }
                | Error::WrongStreamType { .. }
                | Error::AmbiguousOption { .. }
                | Error::InvalidOption { .. }
        )
    }

    /// OS errno, if the error wraps one
    pub fn errno(&self) -> Option<i32> {
        match self.root() {
            Error::SystemIo { errno, .. } | Error::NotReady { errno, .. } if *errno != 0 => {
                Some(*errno)
            }
            _ => None,
        }
    }

    /// Data transferred before the condition was raised
    pub fn partial(&self) -> Option<&[u8]> {
        match self.root() {
            Error::Eof { partial } | Error::NotReady { partial, .. } => Some(partial.as_slice()),
            _ => None,
        }
    }

    /// Take the partial data out of a condition
    pub fn into_partial(self) -> Vec<u8> {
        match self {
            Error::Eof { partial } | Error::NotReady { partial, .. } => partial,
            Error::WithContext { source, .. } => source.into_partial(),
            _ => Vec::new(),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::invalid_call("negative length");
        let contextualized = err.with_context("charin");

        assert!(contextualized.to_string().contains("charin"));
        assert!(contextualized.is_call_error());
    }

    #[test]
    fn test_condition_keeps_partial() {
        let err = Error::Eof { partial: b"ab".to_vec() };
        assert!(err.is_condition());
        assert!(err.is_eof());
        assert_eq!(err.partial(), Some(&b"ab"[..]));

        let wrapped = err.with_context("reading");
        assert_eq!(wrapped.partial(), Some(&b"ab"[..]));
        assert_eq!(wrapped.into_partial(), b"ab".to_vec());
    }

    #[test]
    fn test_io_error_maps_to_errno() {
        let io = std::io::Error::from_raw_os_error(libc::ENOENT);
        let err = Error::from(io);
        assert_eq!(err.errno(), Some(libc::ENOENT));
        assert!(!err.is_condition());
    }

    #[test]
    fn test_not_ready_errno() {
        let err = Error::not_ready_errno(libc::ENAMETOOLONG);
        assert!(err.is_condition());
        assert_eq!(err.errno(), Some(libc::ENAMETOOLONG));
        assert_eq!(Error::not_ready("append").errno(), None);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::not_ready("append stream"));
        let with_context = result.context("positioning");

        assert!(with_context.is_err());
        assert!(with_context.unwrap_err().to_string().contains("positioning"));
    }
}
