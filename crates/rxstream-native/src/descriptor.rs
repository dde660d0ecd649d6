//! Stream descriptor
//!
//! One [`StreamDescriptor`] per stream. It owns the OS handle, the four
//! cursors (read/write × char/line), the memoized counts and the scratch
//! buffer, and it records the outcome of every operation in its state.
//!
//! Open/close, positioning and the read/write operations are implemented in
//! their own modules as further `impl StreamDescriptor` blocks.

use std::fs::File;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use rxstream_core::{Error, Result, StreamConfig, StreamState, StreamType};
use rxstream_parsers::ShareMode;

use crate::cache::PseudoCache;
use crate::handle::StreamHandle;
use crate::path::{NameResolver, SystemResolver};

/// Descriptor flag set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamFlags {
    pub read_only: bool,
    pub write_only: bool,
    pub read_write: bool,
    pub append: bool,
    pub nobuffer: bool,
    pub std_stream: bool,
    pub last_op_was_read: bool,
    pub handle_opened: bool,
    pub transient: bool,
    pub binary: bool,
    pub open: bool,
    pub autosync: bool,
}

impl StreamFlags {
    /// Stream can be read
    pub fn readable(&self) -> bool {
        self.read_only || self.read_write
    }

    /// Stream can be written
    pub fn writable(&self) -> bool {
        self.write_only || self.read_write
    }
}

/// Line cursor with the last known (line, char) pair
///
/// `line == 0` means stale: the char cursor moved without line tracking and
/// the line number has to be recounted from the anchor. While the line is
/// known the anchor always equals `(line, char cursor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTracker {
    line: u64,
    anchor_line: u64,
    anchor_char: u64,
}

impl Default for LineTracker {
    fn default() -> Self {
        Self { line: 1, anchor_line: 1, anchor_char: 1 }
    }
}

impl LineTracker {
    /// Current line, if not stale
    pub fn current(&self) -> Option<u64> {
        (self.line != 0).then_some(self.line)
    }

    /// Last known (line, char) pair
    pub fn anchor(&self) -> (u64, u64) {
        (self.anchor_line, self.anchor_char)
    }

    /// The char cursor is at `char_pos`, which is on line `line`
    pub fn set(&mut self, line: u64, char_pos: u64) {
        self.line = line;
        self.anchor_line = line;
        self.anchor_char = char_pos;
    }

    /// The char cursor moved without line tracking
    pub fn invalidate(&mut self) {
        self.line = 0;
    }

    /// Back to line 1, char 1
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Data changed from 1-based char `start` onward
    pub fn data_changed_at(&mut self, start: u64) {
        if start < self.anchor_char {
            self.anchor_line = 1;
            self.anchor_char = 1;
            self.line = 0;
        }
    }
}

/// Serializable snapshot of a descriptor
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub full_name: String,
    pub state: String,
    pub description: String,
    pub stream_type: String,
    pub char_read_pos: u64,
    pub char_write_pos: u64,
    pub line_read_pos: Option<u64>,
    pub line_write_pos: Option<u64>,
    pub record_length: u64,
    pub size: Option<u64>,
    pub flags: StreamFlags,
}

/// A character/line stream over one OS handle
pub struct StreamDescriptor {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) handle: Option<StreamHandle>,
    pub(crate) flags: StreamFlags,
    pub(crate) state: StreamState,
    pub(crate) errno: i32,
    pub(crate) char_read_pos: u64,
    pub(crate) char_write_pos: u64,
    pub(crate) read_line: LineTracker,
    pub(crate) write_line: LineTracker,
    pub(crate) cache: PseudoCache,
    pub(crate) record_length: u64,
    pub(crate) share: ShareMode,
    pub(crate) buffer: Vec<u8>,
    pub(crate) config: StreamConfig,
    pub(crate) resolver: Arc<dyn NameResolver>,
}

impl StreamDescriptor {
    /// Create an unopened descriptor using the system resolver
    pub fn new(name: impl Into<String>, config: StreamConfig) -> Self {
        Self::with_resolver(name, config, Arc::new(SystemResolver::new()))
    }

    /// Create an unopened descriptor with a custom name resolver
    pub fn with_resolver(
        name: impl Into<String>,
        config: StreamConfig,
        resolver: Arc<dyn NameResolver>,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: String::new(),
            handle: None,
            flags: StreamFlags::default(),
            state: StreamState::Unknown,
            errno: 0,
            char_read_pos: 1,
            char_write_pos: 1,
            read_line: LineTracker::default(),
            write_line: LineTracker::default(),
            cache: PseudoCache::default(),
            record_length: 0,
            share: ShareMode::default(),
            buffer: Vec::new(),
            config: config.normalized(),
            resolver,
        }
    }

    /// Wrap a file the caller already opened
    ///
    /// The descriptor takes the fast open path: no name resolution and no
    /// option parsing. Access is read/write; the OS rejects what the file
    /// was not opened for.
    pub fn from_file(name: impl Into<String>, file: File, config: StreamConfig) -> Self {
        let mut descriptor = Self::new(name, config);
        descriptor.handle = Some(StreamHandle::from_file(file));
        descriptor.flags.handle_opened = true;
        descriptor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved name; empty until the stream has been opened
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Last OS error code; meaningful in the NotReady and Error states
    pub fn errno(&self) -> i32 {
        self.errno
    }

    /// `READY:`, `NOTREADY:EOF`, `ERROR:2 No such file or directory`, ...
    pub fn description(&self) -> String {
        self.state.describe(self.errno)
    }

    pub fn is_open(&self) -> bool {
        self.flags.open
    }

    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Record length of a binary stream
    pub fn record_length(&self) -> Option<u64> {
        self.flags.binary.then_some(self.record_length)
    }

    pub fn share_mode(&self) -> ShareMode {
        self.share
    }

    pub fn char_read_pos(&self) -> u64 {
        self.char_read_pos
    }

    pub fn char_write_pos(&self) -> u64 {
        self.char_write_pos
    }

    pub fn stream_type(&self) -> StreamType {
        if !self.flags.open {
            StreamType::Unknown
        } else if self.flags.transient {
            StreamType::Transient
        } else {
            StreamType::Persistent
        }
    }

    /// OS handle number while open
    pub fn raw_handle(&self) -> Option<i64> {
        self.handle.as_ref().filter(|_| self.flags.open).map(StreamHandle::raw_handle)
    }

    /// Snapshot for reporting
    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            state: self.state.as_str().to_string(),
            description: self.description(),
            stream_type: self.stream_type().as_str().to_string(),
            char_read_pos: self.char_read_pos,
            char_write_pos: self.char_write_pos,
            line_read_pos: self.read_line.current(),
            line_write_pos: self.write_line.current(),
            record_length: self.record_length,
            size: self.cache.size,
            flags: self.flags,
        }
    }

    /// Fold an operation's outcome into the stream state
    ///
    /// Call errors leave the state alone; conditions and OS failures update
    /// it so a later state query can explain them.
    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                self.state = StreamState::Ready;
                self.errno = 0;
            }
            Err(err) => match err.root() {
                Error::Eof { .. } => {
                    self.state = StreamState::Eof;
                    self.errno = 0;
                }
                Error::NotReady { errno, .. } => {
                    self.state = StreamState::NotReady;
                    self.errno = *errno;
                }
                Error::SystemIo { errno, .. } => {
                    self.state = StreamState::Error;
                    self.errno = *errno;
                }
                _ => {}
            },
        }
        if let Err(err) = &result {
            trace!(stream = %self.name, state = %self.state, error = %err, "operation failed");
        }
        result
    }

    pub(crate) fn handle_mut(&mut self) -> Result<&mut StreamHandle> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::not_ready_errno(libc::EBADF))
    }

    /// Stream size in bytes, memoized
    ///
    /// A regular file reporting 0 bytes is re-checked by name in case the
    /// handle's view is stale.
    pub(crate) fn size(&mut self) -> Result<u64> {
        if let Some(size) = self.cache.size {
            return Ok(size);
        }
        let Some(meta) = self.handle_mut()?.metadata()? else {
            return Ok(0);
        };

        let mut size = meta.len();
        if size == 0 && meta.is_file() && !self.full_name.is_empty() {
            if let Ok(restat) = std::fs::metadata(&self.full_name) {
                if restat.is_file() {
                    size = restat.len();
                }
            }
        }
        if !self.flags.transient {
            self.cache.size = Some(size);
        }
        Ok(size)
    }

    /// Reset cursors and caches to a freshly opened stream
    pub(crate) fn reset_cursors(&mut self) {
        self.char_read_pos = 1;
        self.char_write_pos = 1;
        self.read_line.reset();
        self.write_line.reset();
        self.cache.invalidate();
    }
}

impl Drop for StreamDescriptor {
    fn drop(&mut self) {
        if self.flags.open {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("name", &self.name)
            .field("full_name", &self.full_name)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("char_read_pos", &self.char_read_pos)
            .field("char_write_pos", &self.char_write_pos)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_descriptor_is_unknown() {
        let descriptor = StreamDescriptor::new("data.txt", StreamConfig::default());
        assert_eq!(descriptor.state(), StreamState::Unknown);
        assert_eq!(descriptor.description(), "UNKNOWN:");
        assert_eq!(descriptor.char_read_pos(), 1);
        assert_eq!(descriptor.stream_type(), StreamType::Unknown);
        assert!(!descriptor.is_open());
    }

    #[test]
    fn test_record_maps_errors_to_states() {
        let mut descriptor = StreamDescriptor::new("x", StreamConfig::default());

        let _ = descriptor.record::<()>(Err(Error::eof(Vec::new())));
        assert_eq!(descriptor.description(), "NOTREADY:EOF");

        let _ = descriptor.record::<()>(Err(Error::system(libc::EIO)));
        assert_eq!(descriptor.state(), StreamState::Error);
        assert_eq!(descriptor.errno(), libc::EIO);

        let _ = descriptor.record::<()>(Err(Error::invalid_call("bad")));
        assert_eq!(descriptor.state(), StreamState::Error);

        let _ = descriptor.record(Ok(()));
        assert_eq!(descriptor.description(), "READY:");
    }

    #[test]
    fn test_line_tracker() {
        let mut tracker = LineTracker::default();
        assert_eq!(tracker.current(), Some(1));

        tracker.set(4, 20);
        tracker.invalidate();
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.anchor(), (4, 20));

        tracker.data_changed_at(25);
        assert_eq!(tracker.anchor(), (4, 20));
        tracker.data_changed_at(3);
        assert_eq!(tracker.anchor(), (1, 1));
    }
}
