//! OS handle wrapper
//!
//! A [`StreamHandle`] owns either a file (opened by name or supplied by the
//! caller) or one of the process's standard streams. Reads go through a
//! small lookahead buffer so line reads can over-read without losing data on
//! transient sources; writes and explicit seeks drop the lookahead.

use std::fs::{File, Metadata};
use std::io::{self, IsTerminal, Read, Seek, SeekFrom, Write};

use rxstream_core::StdStream;

enum Source {
    File(File),
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

/// Result of a single line read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRead {
    /// Bytes taken from the stream, terminator included
    pub consumed: usize,
    /// Whether a `\n` ended the line
    pub terminated: bool,
}

/// An open OS resource plus read lookahead
pub struct StreamHandle {
    source: Source,
    lookahead: Vec<u8>,
    lookahead_pos: usize,
    /// OS file offset, when known
    os_pos: Option<u64>,
    caller_supplied: bool,
}

impl StreamHandle {
    fn with_source(source: Source, caller_supplied: bool) -> Self {
        let os_pos = matches!(source, Source::File(_)).then_some(0);
        Self {
            source,
            lookahead: Vec::new(),
            lookahead_pos: 0,
            os_pos,
            caller_supplied,
        }
    }

    /// Wrap a file opened by the stream layer
    pub fn file(file: File) -> Self {
        Self::with_source(Source::File(file), false)
    }

    /// Wrap a file the caller opened
    ///
    /// The current OS offset of the file is not assumed to be 0.
    pub fn from_file(mut file: File) -> Self {
        let os_pos = file.stream_position().ok();
        let mut handle = Self::with_source(Source::File(file), true);
        handle.os_pos = os_pos;
        handle
    }

    /// Wrap a standard stream
    pub fn standard(stream: StdStream) -> Self {
        let source = match stream {
            StdStream::Stdin => Source::Stdin(io::stdin()),
            StdStream::Stdout => Source::Stdout(io::stdout()),
            StdStream::Stderr => Source::Stderr(io::stderr()),
        };
        Self::with_source(source, false)
    }

    /// Whether the handle came from the caller
    pub fn is_caller_supplied(&self) -> bool {
        self.caller_supplied
    }

    /// Whether this is a process standard stream
    pub fn is_standard(&self) -> bool {
        !matches!(self.source, Source::File(_))
    }

    fn buffered(&self) -> &[u8] {
        &self.lookahead[self.lookahead_pos..]
    }

    fn discard_lookahead(&mut self) {
        self.lookahead.clear();
        self.lookahead_pos = 0;
    }

    fn consume(&mut self, n: usize) {
        self.lookahead_pos += n;
        if self.lookahead_pos >= self.lookahead.len() {
            self.discard_lookahead();
        }
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = loop {
            let result = match &mut self.source {
                Source::File(file) => file.read(buf),
                Source::Stdin(stdin) => stdin.read(buf),
                Source::Stdout(_) | Source::Stderr(_) => {
                    return Err(io::Error::from_raw_os_error(libc::EBADF));
                }
            };
            match result {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other?,
            }
        };
        if let Some(pos) = self.os_pos.as_mut() {
            *pos += n as u64;
        }
        Ok(n)
    }

    /// Refill the lookahead with up to `chunk` bytes; returns bytes added
    fn fill(&mut self, chunk: usize) -> io::Result<usize> {
        if self.lookahead_pos > 0 {
            self.lookahead.drain(..self.lookahead_pos);
            self.lookahead_pos = 0;
        }
        let start = self.lookahead.len();
        self.lookahead.resize(start + chunk.max(1), 0);
        let result = {
            let mut tail = std::mem::take(&mut self.lookahead);
            let result = self.raw_read(&mut tail[start..]);
            self.lookahead = tail;
            result
        };
        match result {
            Ok(n) => {
                self.lookahead.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                self.lookahead.truncate(start);
                Err(e)
            }
        }
    }

    /// Logical read offset: the OS offset minus unread lookahead
    pub fn logical_position(&self) -> Option<u64> {
        self.os_pos.map(|pos| pos - self.buffered().len() as u64)
    }

    /// Position for reading at a 0-based offset, reusing lookahead when it
    /// already starts there
    pub fn seek_read(&mut self, offset: u64) -> io::Result<()> {
        if self.logical_position() == Some(offset) {
            return Ok(());
        }
        self.seek_os(offset)
    }

    /// Position for writing at a 0-based offset
    pub fn seek_write(&mut self, offset: u64) -> io::Result<()> {
        if !self.buffered().is_empty() {
            self.discard_lookahead();
        }
        if self.os_pos == Some(offset) {
            return Ok(());
        }
        self.seek_os(offset)
    }

    fn seek_os(&mut self, offset: u64) -> io::Result<()> {
        self.discard_lookahead();
        match &mut self.source {
            Source::File(file) => {
                self.os_pos = None;
                file.seek(SeekFrom::Start(offset))?;
                self.os_pos = Some(offset);
                Ok(())
            }
            _ => Err(io::Error::from_raw_os_error(libc::ESPIPE)),
        }
    }

    /// Read bytes into `buf`, serving lookahead first
    pub fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let buffered = self.buffered();
        if !buffered.is_empty() {
            let n = buffered.len().min(buf.len());
            buf[..n].copy_from_slice(&buffered[..n]);
            self.consume(n);
            return Ok(n);
        }
        self.raw_read(buf)
    }

    /// Read until `buf` is full or the source is exhausted
    pub fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.read_some(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    /// Look at the next byte without consuming it
    pub fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        if self.buffered().is_empty() && self.fill(1)? == 0 {
            return Ok(None);
        }
        Ok(self.buffered().first().copied())
    }

    /// Append one line to `out`, reading `chunk` bytes at a time
    ///
    /// The terminator is consumed but not stored; with `strip_cr` a `\r`
    /// directly before the `\n` is dropped as well. NUL bytes are ordinary
    /// data. Growth of `out` doubles its capacity.
    pub fn read_line(&mut self, out: &mut Vec<u8>, chunk: usize, strip_cr: bool) -> io::Result<LineRead> {
        let mut consumed = 0;
        loop {
            if self.buffered().is_empty() && self.fill(chunk)? == 0 {
                return Ok(LineRead { consumed, terminated: false });
            }

            let buffered = self.buffered();
            let (take, terminated) = match buffered.iter().position(|&b| b == b'\n') {
                Some(idx) => (idx + 1, true),
                None => (buffered.len(), false),
            };
            let data_len = if terminated { take - 1 } else { take };

            if out.len() + data_len > out.capacity() {
                let grow = out.capacity().max(data_len);
                out.reserve(grow);
            }
            out.extend_from_slice(&buffered[..data_len]);
            self.consume(take);
            consumed += take;

            if terminated {
                if strip_cr && out.last() == Some(&b'\r') {
                    out.pop();
                }
                return Ok(LineRead { consumed, terminated: true });
            }
        }
    }

    /// Write all of `data` at the OS position
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.buffered().is_empty() {
            let offset = self.logical_position();
            self.discard_lookahead();
            if let Some(offset) = offset {
                self.seek_os(offset)?;
            }
        }
        match &mut self.source {
            Source::File(file) => file.write_all(data)?,
            Source::Stdout(stdout) => stdout.write_all(data)?,
            Source::Stderr(stderr) => stderr.write_all(data)?,
            Source::Stdin(_) => return Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
        if let Some(pos) = self.os_pos.as_mut() {
            *pos += data.len() as u64;
        }
        Ok(())
    }

    /// Flush buffered output
    pub fn flush(&mut self) -> io::Result<()> {
        match &mut self.source {
            Source::File(file) => file.flush(),
            Source::Stdout(stdout) => stdout.flush(),
            Source::Stderr(stderr) => stderr.flush(),
            Source::Stdin(_) => Ok(()),
        }
    }

    /// Push written data to the device
    pub fn sync(&mut self) -> io::Result<()> {
        match &mut self.source {
            Source::File(file) => file.sync_data(),
            _ => self.flush(),
        }
    }

    /// Metadata of the underlying file
    pub fn metadata(&self) -> io::Result<Option<Metadata>> {
        match &self.source {
            Source::File(file) => file.metadata().map(Some),
            _ => Ok(None),
        }
    }

    /// Whether the handle refers to a terminal
    pub fn is_terminal(&self) -> bool {
        match &self.source {
            Source::File(file) => file.is_terminal(),
            Source::Stdin(stdin) => stdin.is_terminal(),
            Source::Stdout(stdout) => stdout.is_terminal(),
            Source::Stderr(stderr) => stderr.is_terminal(),
        }
    }

    /// Device, FIFO or socket; also reports character devices separately
    pub fn classify(&self) -> io::Result<DeviceKind> {
        if self.is_standard() {
            return Ok(DeviceKind::Stream);
        }
        let Some(meta) = self.metadata()? else {
            return Ok(DeviceKind::Stream);
        };
        Ok(classify_metadata(&meta, self.is_terminal()))
    }

    /// OS handle number
    #[cfg(unix)]
    pub fn raw_handle(&self) -> i64 {
        use std::os::fd::AsRawFd;
        let fd = match &self.source {
            Source::File(file) => file.as_raw_fd(),
            Source::Stdin(stdin) => stdin.as_raw_fd(),
            Source::Stdout(stdout) => stdout.as_raw_fd(),
            Source::Stderr(stderr) => stderr.as_raw_fd(),
        };
        i64::from(fd)
    }

    /// OS handle number
    #[cfg(not(unix))]
    pub fn raw_handle(&self) -> i64 {
        match &self.source {
            Source::Stdin(_) => 0,
            Source::Stdout(_) => 1,
            Source::Stderr(_) => 2,
            Source::File(_) => -1,
        }
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_some(buf)
    }
}

/// What kind of object a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Seekable regular file
    Regular,
    /// Character device (terminal, serial port, /dev/null)
    CharDevice,
    /// FIFO or socket
    Pipe,
    /// Standard stream
    Stream,
}

impl DeviceKind {
    pub fn is_transient(&self) -> bool {
        !matches!(self, DeviceKind::Regular)
    }
}

#[cfg(unix)]
fn classify_metadata(meta: &Metadata, terminal: bool) -> DeviceKind {
    use std::os::unix::fs::FileTypeExt;
    let file_type = meta.file_type();
    if file_type.is_char_device() || terminal {
        DeviceKind::CharDevice
    } else if file_type.is_fifo() || file_type.is_socket() {
        DeviceKind::Pipe
    } else {
        DeviceKind::Regular
    }
}

#[cfg(not(unix))]
fn classify_metadata(meta: &Metadata, terminal: bool) -> DeviceKind {
    if terminal {
        DeviceKind::CharDevice
    } else if meta.is_file() {
        DeviceKind::Regular
    } else {
        DeviceKind::Pipe
    }
}
