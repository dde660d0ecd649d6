//! Character and line I/O
//!
//! Every operation opens the stream implicitly when needed, consults the
//! positioning engine for an explicit position, moves its cursor by what it
//! transferred and keeps the line trackers and pseudo counts in step.

use std::io::Read;

use tracing::trace;

use rxstream_core::{Error, Result};
use rxstream_parsers::{Direction, PositionParams, Target, Unit};

use crate::descriptor::StreamDescriptor;
use crate::scan::count_delimiters;

/// Bytes pulled from the OS per fill while reading a line
const LINE_READ_CHUNK: usize = 8 * 1024;

/// Padding for short binary records
const RECORD_PAD: u8 = b' ';

impl StreamDescriptor {
    /// Read `length` chars (default 1), optionally from char `position`
    ///
    /// A short read returns `Eof` carrying the bytes that were read.
    pub fn charin(&mut self, position: Option<u64>, length: Option<i64>) -> Result<Vec<u8>> {
        let result = self.charin_inner(position, length);
        self.record(result)
    }

    fn charin_inner(&mut self, position: Option<u64>, length: Option<i64>) -> Result<Vec<u8>> {
        let length = match length {
            None => 1,
            Some(length) => u64::try_from(length)
                .map_err(|_| Error::invalid_call(format!("CHARIN length must not be negative: {length}")))?,
        };
        self.ensure_readable()?;
        if let Some(position) = position {
            self.require_persistent()?;
            self.char_seek_to(Target::Read, position)?;
        }
        if length == 0 {
            return Ok(Vec::new());
        }

        let data = self.read_raw(length)?;
        self.read_line.invalidate();
        self.cache.read_moved();
        if (data.len() as u64) < length {
            return Err(Error::eof(data));
        }
        Ok(data)
    }

    /// Read up to `length` bytes at the read cursor and advance it
    fn read_raw(&mut self, length: u64) -> Result<Vec<u8>> {
        let start = self.char_read_pos;
        let transient = self.flags.transient;
        let expected = if transient {
            length.min(LINE_READ_CHUNK as u64)
        } else {
            length.min((self.size()? + 1).saturating_sub(start))
        };

        let handle = self.handle_mut()?;
        if !transient {
            handle.seek_read(start - 1)?;
        }
        let mut data = Vec::with_capacity(expected as usize);
        (&mut *handle).take(length).read_to_end(&mut data)?;

        self.char_read_pos += data.len() as u64;
        self.flags.last_op_was_read = true;
        trace!(stream = %self.name, start, read = data.len(), "raw read");
        Ok(data)
    }

    /// Write `data` at the write cursor, or at char `position`
    ///
    /// With neither argument the stream is closed. Returns the residual
    /// count, which is 0 on success.
    pub fn charout(&mut self, data: Option<&[u8]>, position: Option<u64>) -> Result<usize> {
        if data.is_none() && position.is_none() {
            self.close()?;
            return Ok(0);
        }
        let result = self.charout_inner(data.unwrap_or_default(), position);
        self.record(result)
    }

    fn charout_inner(&mut self, data: &[u8], position: Option<u64>) -> Result<usize> {
        self.ensure_writable()?;
        if let Some(position) = position {
            self.require_persistent()?;
            self.char_seek_to(Target::Write, position)?;
        }
        if data.is_empty() {
            return Ok(0);
        }
        self.write_at_cursor(data)?;
        self.cache.invalidate_lines();
        Ok(0)
    }

    /// Read one line, optionally after moving to line `position`
    ///
    /// `count` is 0 (position only) or 1. Binary streams return the rest of
    /// the current record.
    pub fn linein(&mut self, position: Option<u64>, count: Option<u64>) -> Result<Vec<u8>> {
        let result = self.linein_inner(position, count);
        self.record(result)
    }

    fn linein_inner(&mut self, position: Option<u64>, count: Option<u64>) -> Result<Vec<u8>> {
        let count = count.unwrap_or(1);
        if count > 1 {
            return Err(Error::invalid_call(format!("LINEIN count must be 0 or 1, got {count}")));
        }
        self.ensure_readable()?;
        if let Some(line) = position {
            self.require_persistent()?;
            self.line_seek_to(Target::Read, line)?;
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        if self.flags.binary {
            self.read_record()
        } else {
            self.read_text_line()
        }
    }

    fn read_record(&mut self) -> Result<Vec<u8>> {
        let stride = self.record_length.max(1);
        let start = self.char_read_pos;
        let record = (start - 1) / stride + 1;
        let rest = stride - (start - 1) % stride;

        let data = self.read_raw(rest)?;
        if data.is_empty() {
            return Err(Error::eof(data));
        }
        if data.len() as u64 == rest {
            self.read_line.set(record + 1, self.char_read_pos);
        } else {
            self.read_line.invalidate();
        }
        self.cache.line_consumed();
        Ok(data)
    }

    fn read_text_line(&mut self) -> Result<Vec<u8>> {
        let start = self.char_read_pos;
        let transient = self.flags.transient;
        let mut line = Vec::with_capacity(self.config.initial_buffer);

        let handle = self.handle_mut()?;
        if !transient {
            handle.seek_read(start - 1)?;
        }
        let read = handle.read_line(&mut line, LINE_READ_CHUNK, !transient)?;
        self.flags.last_op_was_read = true;
        if read.consumed == 0 {
            return Err(Error::eof(Vec::new()));
        }

        self.char_read_pos += read.consumed as u64;
        if let Some(current) = self.read_line.current() {
            let next = if read.terminated { current + 1 } else { current };
            self.read_line.set(next, self.char_read_pos);
        }
        self.cache.line_consumed();
        Ok(line)
    }

    /// Write one line, optionally after moving to line `position`
    ///
    /// With neither argument the stream is closed. Text streams get `data`
    /// plus `\n`; binary streams get `data` blank-padded to the end of the
    /// current record. Returns the residual count, which is 0 on success.
    pub fn lineout(&mut self, data: Option<&[u8]>, position: Option<u64>) -> Result<usize> {
        if data.is_none() && position.is_none() {
            self.close()?;
            return Ok(0);
        }
        let result = self.lineout_inner(data, position);
        self.record(result)
    }

    fn lineout_inner(&mut self, data: Option<&[u8]>, position: Option<u64>) -> Result<usize> {
        self.ensure_writable()?;
        if let Some(line) = position {
            self.require_persistent()?;
            self.line_seek_to(Target::Write, line)?;
        }
        let Some(data) = data else {
            return Ok(0);
        };

        if self.flags.binary {
            self.write_record(data)
        } else {
            self.write_text_line(data)
        }
    }

    fn write_record(&mut self, data: &[u8]) -> Result<usize> {
        let stride = self.record_length.max(1);
        let room = stride - (self.char_write_pos - 1) % stride;
        if data.len() as u64 > room {
            return Err(Error::invalid_call(format!(
                "LINEOUT data of {} bytes exceeds the {room} bytes left in the record",
                data.len()
            )));
        }

        let mut record = Vec::with_capacity(room as usize);
        record.extend_from_slice(data);
        record.resize(room as usize, RECORD_PAD);
        self.write_at_cursor(&record)?;
        self.cache.invalidate_lines();
        Ok(0)
    }

    fn write_text_line(&mut self, data: &[u8]) -> Result<usize> {
        let appends_line = !self.flags.transient && self.cache.has_lines() && self.ends_with_complete_line()?;

        let mut line = Vec::with_capacity(data.len() + 1);
        line.extend_from_slice(data);
        line.push(b'\n');
        self.write_at_cursor(&line)?;

        if appends_line {
            self.cache.line_appended();
        } else {
            self.cache.invalidate_lines();
        }
        Ok(0)
    }

    /// Write cursor is at end of stream and the stream is empty or ends
    /// with `\n`, so a new line extends the line count by exactly one
    fn ends_with_complete_line(&mut self) -> Result<bool> {
        let size = self.size()?;
        if self.char_write_pos != size + 1 {
            return Ok(false);
        }
        if size == 0 {
            return Ok(true);
        }
        if !self.flags.readable() {
            return Ok(false);
        }
        let handle = self.handle_mut()?;
        handle.seek_read(size - 1)?;
        Ok(handle.peek_byte()? == Some(b'\n'))
    }

    /// Put `data` at the write cursor and advance it
    fn write_at_cursor(&mut self, data: &[u8]) -> Result<()> {
        let start = self.char_write_pos;
        let transient = self.flags.transient;
        let (nobuffer, autosync) = (self.flags.nobuffer, self.flags.autosync);

        let handle = self.handle_mut()?;
        if !transient {
            handle.seek_write(start - 1)?;
        }
        handle.write_all(data)?;
        if nobuffer {
            handle.flush()?;
        }
        if autosync {
            handle.sync()?;
        }

        let end = start + data.len() as u64;
        self.char_write_pos = end;
        self.flags.last_op_was_read = false;
        if !transient {
            self.cache.extend_size(end - 1);
            self.read_line.data_changed_at(start);
            self.write_line.data_changed_at(start);
        }
        match self.write_line.current() {
            Some(line) if !self.flags.binary => self.write_line.set(line + count_delimiters(data), end),
            _ => self.write_line.invalidate(),
        }
        trace!(stream = %self.name, start, written = data.len(), "write");
        Ok(())
    }

    /// Lines left to read
    ///
    /// Quick mode only tells whether any data is left (0 or 1). Transient
    /// streams always answer in quick mode.
    pub fn lines(&mut self, quick: bool) -> Result<u64> {
        let result = self.lines_inner(quick);
        self.record(result)
    }

    fn lines_inner(&mut self, quick: bool) -> Result<u64> {
        self.ensure_readable()?;
        if self.flags.transient {
            return self.transient_has_data();
        }

        let remaining = self.size()?.saturating_sub(self.char_read_pos - 1);
        if quick {
            return Ok(u64::from(remaining > 0));
        }
        if self.flags.binary {
            return Ok(remaining.div_ceil(self.record_length.max(1)));
        }

        if let Some(lines) = self.cache.lines {
            return Ok(lines);
        }
        let lines = self.count_lines_from(self.char_read_pos - 1)?;
        self.cache.lines = Some(lines);
        Ok(lines)
    }

    /// Chars left to read; transient streams answer 0 or 1
    pub fn chars(&mut self) -> Result<u64> {
        let result = self.chars_inner();
        self.record(result)
    }

    fn chars_inner(&mut self) -> Result<u64> {
        self.ensure_readable()?;
        if self.flags.transient {
            return self.transient_has_data();
        }
        Ok(self.size()?.saturating_sub(self.char_read_pos - 1))
    }

    fn transient_has_data(&mut self) -> Result<u64> {
        let next = self.handle_mut()?.peek_byte()?;
        Ok(u64::from(next.is_some()))
    }

    fn require_persistent(&self) -> Result<()> {
        if self.flags.transient {
            return Err(Error::WrongStreamType { name: self.name.clone() });
        }
        Ok(())
    }

    fn char_seek_to(&mut self, target: Target, position: u64) -> Result<u64> {
        let params = PositionParams::new(Direction::Absolute, position, Some(target), Unit::Char);
        self.move_cursor(target, &params)
    }

    fn line_seek_to(&mut self, target: Target, line: u64) -> Result<u64> {
        let params = PositionParams::new(Direction::Absolute, line, Some(target), Unit::Line);
        self.move_cursor(target, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxstream_core::{StreamConfig, StreamState};

    fn stream_with(data: &[u8]) -> (tempfile::TempDir, StreamDescriptor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.txt");
        std::fs::write(&path, data).unwrap();
        let stream = StreamDescriptor::new(path.to_string_lossy(), StreamConfig::default());
        (dir, stream)
    }

    #[test]
    fn test_charin_defaults_and_short_read() {
        let (_dir, mut stream) = stream_with(b"abc");
        assert_eq!(stream.charin(None, None).unwrap(), b"a");
        assert_eq!(stream.charin(None, Some(5)).unwrap_err().partial(), Some(&b"bc"[..]));
        assert_eq!(stream.state(), StreamState::Eof);
        assert_eq!(stream.charin(Some(2), Some(1)).unwrap(), b"b");
        assert_eq!(stream.state(), StreamState::Ready);
    }

    #[test]
    fn test_transient_lines_split_on_lf_only() {
        use std::os::fd::OwnedFd;
        use std::process::{Command, Stdio};

        let mut child = Command::new("printf")
            .arg(r"a\r\nb\n")
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let pipe = std::fs::File::from(OwnedFd::from(child.stdout.take().unwrap()));
        let mut stream = StreamDescriptor::from_file("pipe", pipe, StreamConfig::default());

        assert_eq!(stream.lines(false).unwrap(), 1);
        assert_eq!(stream.linein(None, None).unwrap(), b"a\r");
        assert_eq!(stream.lines(false).unwrap(), 1);
        assert_eq!(stream.linein(None, None).unwrap(), b"b");
        assert_eq!(stream.lines(false).unwrap(), 0);
        assert!(stream.linein(None, None).unwrap_err().is_eof());
        assert!(matches!(stream.seek("= 1"), Err(Error::WrongStreamType { .. })));

        child.wait().unwrap();
    }

    #[test]
    fn test_charin_negative_length() {
        let (_dir, mut stream) = stream_with(b"abc");
        assert!(matches!(stream.charin(None, Some(-1)), Err(Error::InvalidCall { .. })));
    }

    #[test]
    fn test_charout_overwrites_at_position() {
        let (dir, mut stream) = stream_with(b"hello");
        assert_eq!(stream.charout(Some(b"J"), Some(1)).unwrap(), 0);
        assert_eq!(stream.charout(Some(b"!"), Some(6)).unwrap(), 0);
        stream.close().unwrap();
        assert_eq!(std::fs::read(dir.path().join("ops.txt")).unwrap(), b"Jello!");
    }

    #[test]
    fn test_charout_without_arguments_closes() {
        let (_dir, mut stream) = stream_with(b"x");
        stream.charout(Some(b"y"), None).unwrap();
        assert!(stream.is_open());
        stream.charout(None, None).unwrap();
        assert!(!stream.is_open());
    }

    #[test]
    fn test_linein_sequence_and_crlf() {
        let (_dir, mut stream) = stream_with(b"one\r\ntwo\nthree");
        assert_eq!(stream.linein(None, None).unwrap(), b"one");
        assert_eq!(stream.linein(None, None).unwrap(), b"two");
        assert_eq!(stream.linein(None, None).unwrap(), b"three");
        assert!(stream.linein(None, None).unwrap_err().is_eof());
        assert_eq!(stream.description(), "NOTREADY:EOF");
    }

    #[test]
    fn test_linein_count_limits() {
        let (_dir, mut stream) = stream_with(b"a\nb\n");
        assert!(matches!(stream.linein(None, Some(2)), Err(Error::InvalidCall { .. })));
        assert_eq!(stream.linein(Some(2), Some(0)).unwrap(), b"");
        assert_eq!(stream.linein(None, None).unwrap(), b"b");
    }

    #[test]
    fn test_lines_tracks_consumption() {
        let (_dir, mut stream) = stream_with(b"1\n2\n3\n4");
        assert_eq!(stream.lines(false).unwrap(), 4);
        stream.linein(None, None).unwrap();
        assert_eq!(stream.lines(false).unwrap(), 3);
        assert_eq!(stream.lines(true).unwrap(), 1);
        stream.linein(Some(4), None).unwrap();
        assert_eq!(stream.lines(false).unwrap(), 0);
        assert_eq!(stream.lines(true).unwrap(), 0);
    }

    #[test]
    fn test_lineout_appends_and_counts() {
        let (dir, mut stream) = stream_with(b"first\n");
        assert_eq!(stream.lines(false).unwrap(), 1);
        stream.lineout(Some(b"second"), None).unwrap();
        assert_eq!(stream.lines(false).unwrap(), 2);
        assert_eq!(stream.chars().unwrap(), 13);
        stream.close().unwrap();
        assert_eq!(std::fs::read(dir.path().join("ops.txt")).unwrap(), b"first\nsecond\n");
    }

    #[test]
    fn test_lineout_at_line_position() {
        let (dir, mut stream) = stream_with(b"aa\nbb\ncc\n");
        stream.lineout(Some(b"XX"), Some(2)).unwrap();
        stream.close().unwrap();
        assert_eq!(std::fs::read(dir.path().join("ops.txt")).unwrap(), b"aa\nXX\ncc\n");
    }

    #[test]
    fn test_binary_record_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.bin");
        let mut stream = StreamDescriptor::new(path.to_string_lossy(), StreamConfig::default());
        stream.open("BINARY RECLENGTH 6").unwrap();

        stream.lineout(Some(b"ab"), None).unwrap();
        stream.lineout(Some(b"cdefgh"), None).unwrap();
        assert!(matches!(stream.lineout(Some(b"too long"), None), Err(Error::InvalidCall { .. })));

        assert_eq!(stream.linein(Some(1), None).unwrap(), b"ab    ");
        assert_eq!(stream.linein(None, None).unwrap(), b"cdefgh");
        assert_eq!(stream.lines(false).unwrap(), 0);
    }

    #[test]
    fn test_chars_counts_remaining() {
        let (_dir, mut stream) = stream_with(b"0123456789");
        assert_eq!(stream.chars().unwrap(), 10);
        stream.charin(None, Some(4)).unwrap();
        assert_eq!(stream.chars().unwrap(), 6);
    }

    #[test]
    fn test_write_only_stream_cannot_read() {
        let (_dir, mut stream) = stream_with(b"data");
        stream.open("WRITE").unwrap();
        let err = stream.charin(None, None).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EBADF));
        assert_eq!(stream.state(), StreamState::NotReady);
    }
}
