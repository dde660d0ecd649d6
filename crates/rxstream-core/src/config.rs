//! Stream layer configuration

use serde::{Deserialize, Serialize};

/// Tunables shared by every descriptor in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Largest chunk read at once while counting lines (bytes)
    pub scan_chunk_limit: usize,
    /// Initial scratch buffer size for line reads (bytes)
    pub initial_buffer: usize,
    /// Longest stream name accepted before the OS is asked
    pub max_name_length: usize,
    /// Overwrite a trailing 0x1A marker when opening for output
    pub honor_eof_marker: bool,
    /// Let write operations create the stream on implicit open
    pub implicit_create: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            scan_chunk_limit: 2 * 1024 * 1024, // 2 MB
            initial_buffer: 256,
            max_name_length: libc::PATH_MAX as usize,
            honor_eof_marker: true,
            implicit_create: true,
        }
    }
}

impl StreamConfig {
    /// Clamp values that would make scanning impossible
    pub fn normalized(mut self) -> Self {
        self.scan_chunk_limit = self.scan_chunk_limit.max(2);
        self.initial_buffer = self.initial_buffer.max(1);
        self
    }
}
