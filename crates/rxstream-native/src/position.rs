//! Positioning engine
//!
//! Char positioning is arithmetic against the cached size. Line positioning
//! is arithmetic for binary streams (record length is the stride) and a scan
//! for text streams: forward from the nearest known (line, char) pair,
//! backward from the cursor, or from the end after counting every line.

use std::ops::ControlFlow;

use tracing::{debug, trace};

use rxstream_core::{Error, Result};
use rxstream_parsers::{Direction, PositionParams, QueryPositionParams, Target, Unit};

use crate::descriptor::StreamDescriptor;
use crate::scan::{count_delimiters, scan_backward_lines, scan_forward_lines, LineCounter, Scan};
use crate::stream::ChunkedReader;

/// Where a line scan ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineTarget {
    line: u64,
    char_pos: u64,
    /// The requested line does not exist; the cursor was clamped
    underrun: bool,
}

impl LineTarget {
    const START: LineTarget = LineTarget { line: 1, char_pos: 1, underrun: false };
}

impl StreamDescriptor {
    /// SEEK/POSITION with an operand string such as `"+5 LINE WRITE"`
    pub fn seek(&mut self, operand: &str) -> Result<u64> {
        let params = PositionParams::parse(operand)?;
        self.position(&params)
    }

    /// Move one or both cursors; returns the new position of the first
    /// target in the requested unit
    pub fn position(&mut self, params: &PositionParams) -> Result<u64> {
        let result = self.position_inner(params);
        self.record(result)
    }

    fn position_inner(&mut self, params: &PositionParams) -> Result<u64> {
        match params.target() {
            Some(Target::Write) => self.ensure_writable()?,
            _ if !self.flags.open => self.ensure_readable()?,
            _ => {}
        }
        if self.flags.transient {
            return Err(Error::WrongStreamType { name: self.name.clone() });
        }

        let targets = self.position_targets(params.target())?;
        let mut first = None;
        for target in targets {
            let position = self.move_cursor(target, params)?;
            first.get_or_insert(position);
        }
        debug!(
            stream = %self.name,
            direction = params.direction().symbol(),
            offset = params.offset(),
            unit = ?params.unit(),
            position = ?first,
            "repositioned"
        );
        first.ok_or_else(|| Error::internal("no position target"))
    }

    /// Cursors addressed when no READ/WRITE keyword is given
    fn position_targets(&self, explicit: Option<Target>) -> Result<Vec<Target>> {
        if let Some(target) = explicit {
            let allowed = match target {
                Target::Read => self.flags.readable(),
                Target::Write => self.flags.writable(),
            };
            if !allowed {
                return Err(Error::not_ready_errno(libc::EBADF));
            }
            return Ok(vec![target]);
        }

        let mut targets = Vec::with_capacity(2);
        if self.flags.readable() {
            targets.push(Target::Read);
        }
        if self.flags.writable() && !(self.flags.append && self.flags.readable()) {
            targets.push(Target::Write);
        }
        Ok(targets)
    }

    pub(crate) fn move_cursor(&mut self, target: Target, params: &PositionParams) -> Result<u64> {
        if target == Target::Write && self.flags.append {
            return Err(Error::not_ready("write cursor of an APPEND stream cannot be moved"));
        }
        match (params.unit(), self.flags.binary) {
            (Unit::Char, _) => self.char_seek(target, params.direction(), params.offset()),
            (Unit::Line, true) => self.record_seek(target, params.direction(), params.offset()),
            (Unit::Line, false) => self.line_seek(target, params.direction(), params.offset()),
        }
    }

    pub(crate) fn cursor(&self, target: Target) -> u64 {
        match target {
            Target::Read => self.char_read_pos,
            Target::Write => self.char_write_pos,
        }
    }

    /// Place a cursor; `line` is the line it lands on, if known
    pub(crate) fn set_cursor(&mut self, target: Target, char_pos: u64, line: Option<u64>) {
        let line = line.or((char_pos == 1).then_some(1));
        let tracker = match target {
            Target::Read => {
                self.char_read_pos = char_pos;
                self.cache.read_moved();
                &mut self.read_line
            }
            Target::Write => {
                self.char_write_pos = char_pos;
                &mut self.write_line
            }
        };
        match line {
            Some(line) => tracker.set(line, char_pos),
            None => tracker.invalidate(),
        }
    }

    /// Reject positions outside `1..=size + 1`
    fn check_bounds(&mut self, target: Target, position: i128) -> Result<u64> {
        if position < 1 {
            return Err(Error::InvalidPosition {
                position: i64::try_from(position).unwrap_or(i64::MIN),
            });
        }
        let size = self.size()?;
        if position > i128::from(size) + 1 {
            return Err(match target {
                Target::Read => Error::eof(Vec::new()),
                Target::Write => Error::not_ready("position beyond end of stream"),
            });
        }
        Ok(position as u64)
    }

    fn char_seek(&mut self, target: Target, direction: Direction, offset: u64) -> Result<u64> {
        let size = i128::from(self.size()?);
        let current = i128::from(self.cursor(target));
        let offset = i128::from(offset);

        let position = match direction {
            Direction::Absolute => offset,
            Direction::FromEnd => size + 1 - offset,
            Direction::Forward => current + offset,
            Direction::Backward => current - offset,
        };
        let position = self.check_bounds(target, position)?;
        self.set_cursor(target, position, None);
        Ok(position)
    }

    /// Binary streams: line N starts at `(N - 1) * reclength + 1`
    fn record_seek(&mut self, target: Target, direction: Direction, offset: u64) -> Result<u64> {
        let stride = i128::from(self.record_length.max(1));
        let size = i128::from(self.size()?);
        let current = (i128::from(self.cursor(target)) - 1) / stride + 1;
        let records = (size + stride - 1) / stride;
        let offset = i128::from(offset);

        let record = match direction {
            Direction::Absolute => offset,
            Direction::FromEnd => records + 1 - offset,
            Direction::Forward => current + offset,
            Direction::Backward => current - offset,
        };
        if record < 1 {
            return Err(Error::InvalidPosition { position: i64::try_from(record).unwrap_or(i64::MIN) });
        }
        let position = self.check_bounds(target, (record - 1) * stride + 1)?;
        let record = record as u64;
        self.set_cursor(target, position, Some(record));
        Ok(record)
    }

    fn line_seek(&mut self, target: Target, direction: Direction, offset: u64) -> Result<u64> {
        let found = match direction {
            Direction::Absolute => {
                if offset == 0 {
                    return Err(Error::InvalidPosition { position: 0 });
                }
                let (anchor_line, anchor_char) = match target {
                    Target::Read => self.read_line.anchor(),
                    Target::Write => self.write_line.anchor(),
                };
                if offset >= anchor_line {
                    self.scan_forward(anchor_char, anchor_line, offset - anchor_line)?
                } else {
                    self.scan_forward(1, 1, offset - 1)?
                }
            }
            Direction::Forward => {
                let line = self.current_line(target)?;
                self.scan_forward(self.cursor(target), line, offset)?
            }
            Direction::Backward => {
                let line = self.current_line(target)?;
                self.scan_backward(self.cursor(target), line, offset)?
            }
            Direction::FromEnd => {
                let total = self.total_lines()?;
                if offset > total {
                    LineTarget { underrun: true, ..LineTarget::START }
                } else if offset == 0 {
                    let end = self.size()? + 1;
                    LineTarget { line: total + 1, char_pos: end, underrun: false }
                } else {
                    self.scan_forward(1, 1, total - offset)?
                }
            }
        };

        self.set_cursor(target, found.char_pos, Some(found.line));
        if found.underrun {
            debug!(stream = %self.name, line = found.line, "line position under-run");
            return Err(Error::not_ready("line position beyond stream"));
        }
        Ok(found.line)
    }

    /// Move forward `count` lines from `from_char`, which is on `from_line`
    fn scan_forward(&mut self, from_char: u64, from_line: u64, count: u64) -> Result<LineTarget> {
        if count == 0 {
            return Ok(LineTarget { line: from_line, char_pos: from_char, underrun: false });
        }
        let size = self.size()?;
        let chunk_size = self.config.scan_chunk_limit;
        let limit = (size + 1).saturating_sub(from_char);

        let handle = self.handle_mut()?;
        handle.seek_read(from_char - 1)?;
        let mut remaining = count;
        let found = ChunkedReader::new(&mut *handle, chunk_size)
            .with_limit(limit)
            .process_chunks(|chunk, base| match scan_forward_lines(chunk, remaining) {
                Scan::Found(idx) => ControlFlow::Break(base + idx as u64),
                Scan::Short(left) => {
                    remaining = left;
                    ControlFlow::Continue(())
                }
            })?;

        trace!(from_char, from_line, count, ?found, "forward line scan");
        Ok(match found {
            Some(advance) => LineTarget { line: from_line + count, char_pos: from_char + advance, underrun: false },
            None => LineTarget { line: from_line + (count - remaining), char_pos: size + 1, underrun: true },
        })
    }

    /// Move back `count` lines from `from_char`, which is on `from_line`
    fn scan_backward(&mut self, from_char: u64, from_line: u64, count: u64) -> Result<LineTarget> {
        let chunk_size = self.config.scan_chunk_limit as u64;
        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::not_ready_errno(libc::EBADF));
        };
        if count >= from_line {
            trace!(from_char, from_line, count, "backward line scan past line 1");
            return Ok(LineTarget { underrun: true, ..LineTarget::START });
        }
        let buffer = &mut self.buffer;

        let mut remaining = count.saturating_add(1);
        let mut end = from_char - 1;
        while end > 0 {
            let start = end.saturating_sub(chunk_size);
            let len = (end - start) as usize;
            if buffer.len() < len {
                buffer.resize(len, 0);
            }
            handle.seek_read(start)?;
            let read = handle.read_full(&mut buffer[..len])?;

            match scan_backward_lines(&buffer[..read], remaining) {
                Scan::Found(idx) => {
                    return Ok(LineTarget {
                        line: from_line.saturating_sub(count).max(1),
                        char_pos: start + idx as u64 + 1,
                        underrun: false,
                    });
                }
                Scan::Short(left) => remaining = left,
            }
            end = start;
        }

        trace!(from_char, from_line, count, remaining, "backward line scan reached start");
        Ok(LineTarget { underrun: remaining > 1, ..LineTarget::START })
    }

    /// Line number of a cursor, recounting from the anchor when stale
    pub(crate) fn current_line(&mut self, target: Target) -> Result<u64> {
        let char_pos = self.cursor(target);
        let tracker = match target {
            Target::Read => self.read_line,
            Target::Write => self.write_line,
        };
        if let Some(line) = tracker.current() {
            return Ok(line);
        }
        if self.flags.binary {
            return Ok((char_pos - 1) / self.record_length.max(1) + 1);
        }
        let (anchor_line, anchor_char) = tracker.anchor();
        if self.flags.transient || !self.flags.open {
            return Ok(anchor_line);
        }

        let (base_line, from) = if char_pos >= anchor_char { (anchor_line, anchor_char) } else { (1, 1) };
        let line = base_line + self.count_delimiters_between(from, char_pos)?;
        match target {
            Target::Read => self.read_line.set(line, char_pos),
            Target::Write => self.write_line.set(line, char_pos),
        }
        Ok(line)
    }

    /// `\n` bytes in chars `from..to` (1-based, `to` exclusive)
    fn count_delimiters_between(&mut self, from: u64, to: u64) -> Result<u64> {
        if to <= from {
            return Ok(0);
        }
        let chunk_size = self.config.scan_chunk_limit;
        let handle = self.handle_mut()?;
        handle.seek_read(from - 1)?;
        let mut reader = ChunkedReader::new(&mut *handle, chunk_size).with_limit(to - from);
        let mut count = 0;
        while let Some(chunk) = reader.read_chunk()? {
            count += count_delimiters(chunk);
        }
        Ok(count)
    }

    /// Lines from 0-based `offset` to end of stream, unterminated tail included
    pub(crate) fn count_lines_from(&mut self, offset: u64) -> Result<u64> {
        let size = self.size()?;
        if offset >= size {
            return Ok(0);
        }
        let chunk_size = self.config.scan_chunk_limit;
        let handle = self.handle_mut()?;
        handle.seek_read(offset)?;
        let mut reader = ChunkedReader::new(&mut *handle, chunk_size).with_limit(size - offset);
        let mut counter = LineCounter::new();
        while let Some(chunk) = reader.read_chunk()? {
            counter.feed(chunk);
        }
        Ok(counter.finish())
    }

    /// Lines in the whole stream, memoized
    pub(crate) fn total_lines(&mut self) -> Result<u64> {
        if let Some(total) = self.cache.max_lines {
            return Ok(total);
        }
        let total = self.count_lines_from(0)?;
        self.cache.max_lines = Some(total);
        Ok(total)
    }

    /// QUERY POSITION: 1-based char or line position, or the 0-based OS
    /// offset with SYS
    pub fn query_position(&mut self, params: &QueryPositionParams) -> Result<u64> {
        let target = params.target().unwrap_or(if self.flags.open && !self.flags.readable() {
            Target::Write
        } else {
            Target::Read
        });
        let result = match params.unit() {
            Unit::Char if params.sys() => Ok(self.cursor(target) - 1),
            Unit::Char => Ok(self.cursor(target)),
            Unit::Line => self.current_line(target),
        };
        match result {
            Ok(position) => Ok(position),
            Err(err) => self.record(Err(err)),
        }
    }
}
