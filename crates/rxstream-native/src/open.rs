//! Open/close manager
//!
//! Explicit opens parse an OPEN option string; implicit opens happen on the
//! first read or write of an unopened stream. Both resolve the name, try the
//! OS open with progressively reduced access, classify the result as
//! persistent or transient, and place the write cursor at end of stream.

use std::fs::OpenOptions;

use tracing::{debug, warn};

use rxstream_core::{Error, READY_STATUS, Result, StdStream, StreamState, EOF_MARKER};
use rxstream_parsers::{OpenMode, OpenParams};

use crate::descriptor::{StreamDescriptor, StreamFlags};
use crate::handle::{DeviceKind, StreamHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy)]
struct Attempt {
    access: Access,
    create: bool,
    truncate: bool,
}

impl Attempt {
    const fn new(access: Access, create: bool, truncate: bool) -> Self {
        Self { access, create, truncate }
    }

    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self.access {
            Access::ReadOnly => options.read(true),
            Access::WriteOnly => options.write(true),
            Access::ReadWrite => options.read(true).write(true),
        };
        if self.access != Access::ReadOnly {
            options.create(self.create).truncate(self.truncate);
        }
        options
    }
}

/// Why a stream is being opened
#[derive(Debug, Clone, Copy)]
enum OpenRequest<'a> {
    Explicit(&'a OpenParams),
    ImplicitRead,
    ImplicitWrite,
}

impl OpenRequest<'_> {
    fn attempts(&self, implicit_create: bool) -> Vec<Attempt> {
        match self {
            OpenRequest::Explicit(params) => {
                let truncate = params.replace();
                match params.mode() {
                    OpenMode::Read => vec![Attempt::new(Access::ReadOnly, false, false)],
                    OpenMode::Write => vec![Attempt::new(Access::WriteOnly, true, truncate)],
                    OpenMode::Both => vec![
                        Attempt::new(Access::ReadWrite, true, truncate),
                        Attempt::new(Access::ReadOnly, false, false),
                        Attempt::new(Access::WriteOnly, false, truncate),
                    ],
                }
            }
            OpenRequest::ImplicitRead => vec![
                Attempt::new(Access::ReadWrite, false, false),
                Attempt::new(Access::ReadOnly, false, false),
            ],
            OpenRequest::ImplicitWrite => vec![
                Attempt::new(Access::ReadWrite, implicit_create, false),
                Attempt::new(Access::WriteOnly, implicit_create, false),
            ],
        }
    }

    fn params(&self) -> Option<&OpenParams> {
        match self {
            OpenRequest::Explicit(params) => Some(*params),
            _ => None,
        }
    }
}

impl StreamDescriptor {
    /// Open with an OPEN option string, e.g. `"WRITE APPEND"`
    ///
    /// Returns `"READY:"`. Option errors are returned without touching the
    /// stream; OS failures leave the stream NotReady with the errno.
    pub fn open(&mut self, options: &str) -> Result<String> {
        let params = OpenParams::parse(options)?;
        self.open_with(&params)?;
        Ok(READY_STATUS.to_string())
    }

    /// Open with already parsed options
    pub fn open_with(&mut self, params: &OpenParams) -> Result<()> {
        if self.flags.open {
            if self.flags.handle_opened {
                return self.record(Ok(()));
            }
            self.close()?;
        }
        let result = self.open_stream(OpenRequest::Explicit(params));
        self.record(result)
    }

    /// Open on first read if needed, then require read access
    pub(crate) fn ensure_readable(&mut self) -> Result<()> {
        if !self.flags.open {
            self.open_stream(OpenRequest::ImplicitRead)?;
        }
        if !self.flags.readable() {
            return Err(Error::not_ready_errno(libc::EBADF));
        }
        Ok(())
    }

    /// Open on first write if needed, then require write access
    pub(crate) fn ensure_writable(&mut self) -> Result<()> {
        if !self.flags.open {
            self.open_stream(OpenRequest::ImplicitWrite)?;
        }
        if !self.flags.writable() {
            return Err(Error::not_ready_errno(libc::EBADF));
        }
        Ok(())
    }

    fn open_stream(&mut self, request: OpenRequest<'_>) -> Result<()> {
        if let Some(stream) = StdStream::from_name(&self.name) {
            self.open_standard(stream);
            return Ok(());
        }
        if self.flags.handle_opened {
            return self.open_supplied_handle();
        }

        if self.name.len() > self.config.max_name_length {
            return Err(Error::not_ready_errno(libc::ENAMETOOLONG));
        }
        let path = self
            .resolver
            .qualify(&self.name)
            .ok_or_else(|| Error::not_ready_errno(libc::ENOENT))?;
        let full_name = path.to_string_lossy().into_owned();
        if full_name.len() > self.config.max_name_length {
            return Err(Error::not_ready_errno(libc::ENAMETOOLONG));
        }

        let mut last_error = None;
        let mut opened = None;
        for attempt in request.attempts(self.config.implicit_create) {
            match attempt.options().open(&path) {
                Ok(file) => {
                    opened = Some((file, attempt.access));
                    break;
                }
                Err(err) => {
                    debug!(stream = %full_name, access = ?attempt.access, error = %err, "open attempt failed");
                    last_error = Some(err);
                }
            }
        }
        let Some((file, access)) = opened else {
            let errno = last_error
                .and_then(|err| err.raw_os_error())
                .unwrap_or(libc::ENOENT);
            return Err(Error::not_ready_errno(errno));
        };
        if last_error.is_some() {
            warn!(stream = %full_name, access = ?access, "opened with reduced access");
        }

        self.full_name = full_name;
        self.handle = Some(StreamHandle::file(file));
        self.flags = StreamFlags {
            read_only: access == Access::ReadOnly,
            write_only: access == Access::WriteOnly,
            read_write: access == Access::ReadWrite,
            ..StreamFlags::default()
        };
        self.reset_cursors();

        let kind = self.handle_mut()?.classify()?;
        self.flags.transient = kind.is_transient();
        self.flags.nobuffer = kind == DeviceKind::CharDevice;

        if let Some(params) = request.params() {
            self.apply_params(params);
        }
        if let Err(err) = self.finish_open(request) {
            self.release();
            return Err(err);
        }

        self.flags.open = true;
        debug!(
            stream = %self.full_name,
            transient = self.flags.transient,
            binary = self.flags.binary,
            write_pos = self.char_write_pos,
            "stream opened"
        );
        Ok(())
    }

    fn apply_params(&mut self, params: &OpenParams) {
        self.flags.append = params.append();
        self.flags.binary = params.binary();
        self.flags.nobuffer |= params.nobuffer();
        self.flags.autosync = params.autosync();
        self.share = params.share();
        if !params.ignored().is_empty() {
            debug!(stream = %self.name, options = params.ignored(), "ignoring options");
        }
    }

    fn finish_open(&mut self, request: OpenRequest<'_>) -> Result<()> {
        if self.flags.writable() && !self.flags.transient {
            self.position_write_at_end()?;
        }

        if self.flags.binary {
            let explicit = request.params().and_then(OpenParams::record_length);
            self.record_length = match explicit {
                Some(length) => length,
                None if self.flags.transient => 1,
                None => match self.size()? {
                    0 => {
                        return Err(Error::invalid_call(
                            "BINARY stream needs RECLENGTH when the stream is empty",
                        ));
                    }
                    size => size,
                },
            };
        }
        Ok(())
    }

    /// Write cursor one past the end, or onto a trailing EOF marker
    fn position_write_at_end(&mut self) -> Result<()> {
        let size = self.size()?;
        self.char_write_pos = size + 1;
        if size > 0 && self.config.honor_eof_marker && self.flags.readable() {
            let handle = self.handle_mut()?;
            handle.seek_read(size - 1)?;
            if handle.peek_byte()? == Some(EOF_MARKER) {
                debug!(stream = %self.name, "overwriting EOF marker");
                self.char_write_pos = size;
            }
        }
        if self.char_write_pos > 1 {
            self.write_line.invalidate();
        }
        Ok(())
    }

    fn open_standard(&mut self, stream: StdStream) {
        self.full_name = stream.name().to_string();
        self.handle = Some(StreamHandle::standard(stream));
        self.flags = StreamFlags {
            read_only: stream.is_input(),
            write_only: !stream.is_input(),
            std_stream: true,
            transient: true,
            nobuffer: stream == StdStream::Stderr,
            open: true,
            ..StreamFlags::default()
        };
        self.reset_cursors();
        debug!(stream = %self.full_name, "standard stream opened");
    }

    fn open_supplied_handle(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::not_ready_errno(libc::EBADF));
        }
        if self.full_name.is_empty() {
            self.full_name = self.name.clone();
        }
        self.flags = StreamFlags {
            read_write: true,
            handle_opened: true,
            ..StreamFlags::default()
        };
        self.reset_cursors();

        let kind = self.handle_mut()?.classify()?;
        self.flags.transient = kind.is_transient();
        self.flags.nobuffer = kind == DeviceKind::CharDevice;
        if !self.flags.transient {
            self.char_write_pos = self.size()? + 1;
            if self.char_write_pos > 1 {
                self.write_line.invalidate();
            }
        }
        self.flags.open = true;
        Ok(())
    }

    /// Close the stream: `"READY:"`, or `""` if it was not open
    pub fn close(&mut self) -> Result<String> {
        if !self.flags.open {
            return Ok(String::new());
        }

        // Dropping a File discards close(2) errors, so persistent output is
        // synced here where a failure can still be reported
        let sync = self.flags.writable() && !self.flags.transient;
        let mut flushed = Ok(());
        if let Some(handle) = self.handle.as_mut() {
            let finish = |handle: &mut StreamHandle| if sync { handle.sync() } else { handle.flush() };
            flushed = finish(handle);
            if let Err(err) = &flushed {
                warn!(stream = %self.name, error = %err, "flush on close failed, retrying");
                flushed = finish(handle);
            }
        }
        self.release();
        debug!(stream = %self.name, "stream closed");

        match flushed {
            Ok(()) => {
                self.state = StreamState::Unknown;
                self.errno = 0;
                Ok(READY_STATUS.to_string())
            }
            Err(err) => self.record(Err(err.into())),
        }
    }

    /// Drop the OS handle and everything derived from it
    ///
    /// A caller-supplied handle cannot be reopened by name afterwards.
    fn release(&mut self) {
        self.handle = None;
        self.buffer = Vec::new();
        self.flags = StreamFlags {
            handle_opened: self.flags.handle_opened,
            ..StreamFlags::default()
        };
        self.record_length = 0;
        self.cache.invalidate();
    }

    /// Flush buffered output, syncing to disk for AUTOSYNC streams
    pub fn flush(&mut self) -> Result<()> {
        if !self.flags.open {
            return self.record(Ok(()));
        }
        let autosync = self.flags.autosync;
        let result = self.handle_mut().and_then(|handle| {
            handle.flush()?;
            if autosync {
                handle.sync()?;
            }
            Ok(())
        });
        self.record(result)
    }

    /// Whether the stream's file exists
    pub fn exists(&self) -> Option<String> {
        if let Some(stream) = StdStream::from_name(&self.name) {
            return Some(stream.name().to_string());
        }
        if self.flags.open {
            return Some(self.full_name.clone());
        }
        let path = self.resolver.qualify(&self.name)?;
        path.exists().then(|| path.to_string_lossy().into_owned())
    }
}
