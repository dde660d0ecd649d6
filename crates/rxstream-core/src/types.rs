//! Common types used across rxstream
//!
//! Stream states, the status-string protocol understood by the host
//! runtime, and small shared enums.

use serde::{Deserialize, Serialize};

/// Legacy end-of-file marker some text files still carry (control-Z)
pub const EOF_MARKER: u8 = 0x1A;

/// Status returned by a successful OPEN/CLOSE/FLUSH
pub const READY_STATUS: &str = "READY:";

/// Stream state machine
///
/// `Unknown → Ready ⇄ {NotReady, Eof, Error}`. Only an explicit close
/// returns a stream to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamState {
    /// Never opened, or closed
    #[default]
    Unknown,
    /// Last operation succeeded
    Ready,
    /// A condition was raised but the stream is usable
    NotReady,
    /// A read found no more data
    Eof,
    /// An OS call failed
    Error,
}

impl StreamState {
    /// State word reported by a state query
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Unknown => "UNKNOWN",
            StreamState::Ready => "READY",
            StreamState::NotReady | StreamState::Eof => "NOTREADY",
            StreamState::Error => "ERROR",
        }
    }

    /// Full description string: `STATE:detail`
    ///
    /// `errno` is only consulted in the NotReady and Error states.
    pub fn describe(&self, errno: i32) -> String {
        match self {
            StreamState::Unknown => "UNKNOWN:".to_string(),
            StreamState::Ready => READY_STATUS.to_string(),
            StreamState::Eof => "NOTREADY:EOF".to_string(),
            StreamState::NotReady if errno == 0 => "NOTREADY:".to_string(),
            StreamState::NotReady => format!("NOTREADY:{} {}", errno, strerror(errno)),
            StreamState::Error => format!("ERROR:{} {}", errno, strerror(errno)),
        }
    }

    /// Check whether the stream has ever been opened successfully
    pub fn is_known(&self) -> bool {
        !matches!(self, StreamState::Unknown)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent vs. transient classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// Seekable regular file
    Persistent,
    /// Device, pipe, socket or standard stream
    Transient,
    /// Not opened yet
    Unknown,
}

impl StreamType {
    /// Name reported by QUERY STREAMTYPE
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Persistent => "PERSISTENT",
            StreamType::Transient => "TRANSIENT",
            StreamType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard stream aliases that bypass name resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    /// Recognize `STDIN`, `STDIN:`, `stdout`, ... (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_suffix(':').unwrap_or(name);
        if name.eq_ignore_ascii_case("STDIN") {
            Some(StdStream::Stdin)
        } else if name.eq_ignore_ascii_case("STDOUT") {
            Some(StdStream::Stdout)
        } else if name.eq_ignore_ascii_case("STDERR") {
            Some(StdStream::Stderr)
        } else {
            None
        }
    }

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            StdStream::Stdin => "STDIN",
            StdStream::Stdout => "STDOUT",
            StdStream::Stderr => "STDERR",
        }
    }

    /// File descriptor number
    pub fn fd(&self) -> i32 {
        match self {
            StdStream::Stdin => 0,
            StdStream::Stdout => 1,
            StdStream::Stderr => 2,
        }
    }

    /// Whether the stream can be read
    pub fn is_input(&self) -> bool {
        matches!(self, StdStream::Stdin)
    }
}

/// OS error text for an errno, without the `(os error N)` suffix
pub fn strerror(errno: i32) -> String {
    let text = std::io::Error::from_raw_os_error(errno).to_string();
    match text.rfind(" (os error") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_strings() {
        assert_eq!(StreamState::Ready.as_str(), "READY");
        assert_eq!(StreamState::Eof.as_str(), "NOTREADY");
        assert_eq!(StreamState::Unknown.describe(0), "UNKNOWN:");
        assert_eq!(StreamState::Ready.describe(5), "READY:");
        assert_eq!(StreamState::Eof.describe(0), "NOTREADY:EOF");
    }

    #[test]
    fn test_error_description_carries_errno() {
        let text = StreamState::Error.describe(libc::ENOENT);
        assert!(text.starts_with(&format!("ERROR:{} ", libc::ENOENT)));
        assert!(!text.contains("os error"));

        let text = StreamState::NotReady.describe(libc::EACCES);
        assert!(text.starts_with(&format!("NOTREADY:{} ", libc::EACCES)));
    }

    #[test]
    fn test_std_stream_aliases() {
        assert_eq!(StdStream::from_name("STDIN"), Some(StdStream::Stdin));
        assert_eq!(StdStream::from_name("stdout:"), Some(StdStream::Stdout));
        assert_eq!(StdStream::from_name("StdErr"), Some(StdStream::Stderr));
        assert_eq!(StdStream::from_name("stdin.txt"), None);
    }

    #[test]
    fn test_state_serializes() {
        let json = serde_json::to_string(&StreamState::NotReady).unwrap();
        assert_eq!(json, "\"NotReady\"");
    }
}
