//! Chunked reading for scans over large streams

use std::io::{Read, Result as IoResult};
use std::ops::ControlFlow;

/// Reads a source in fixed-size chunks, optionally stopping after `limit`
/// bytes, so scans never hold more than one chunk in memory
pub struct ChunkedReader<R: Read> {
    reader: R,
    chunk: Vec<u8>,
    remaining: Option<u64>,
    consumed: u64,
}

impl<R: Read> ChunkedReader<R> {
    /// Create a new chunked reader
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk: vec![0; chunk_size.max(1)],
            remaining: None,
            consumed: 0,
        }
    }

    /// Stop after `limit` bytes
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.remaining = Some(limit);
        self
    }

    /// Bytes handed out so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Read next chunk
    /// Returns None if end of stream reached
    pub fn read_chunk(&mut self) -> IoResult<Option<&[u8]>> {
        let want = match self.remaining {
            Some(0) => return Ok(None),
            Some(left) => self.chunk.len().min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => self.chunk.len(),
        };

        let mut total_read = 0;
        while total_read < want {
            match self.reader.read(&mut self.chunk[total_read..want]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if total_read == 0 {
            return Ok(None);
        }
        if let Some(left) = self.remaining.as_mut() {
            *left -= total_read as u64;
        }
        self.consumed += total_read as u64;
        Ok(Some(&self.chunk[..total_read]))
    }

    /// Process the source in chunks until the callback breaks or data ends
    ///
    /// The callback receives each chunk and the offset of its first byte
    /// relative to where reading started.
    pub fn process_chunks<F, T>(&mut self, mut callback: F) -> IoResult<Option<T>>
    where
        F: FnMut(&[u8], u64) -> ControlFlow<T>,
    {
        loop {
            let base = self.consumed;
            let Some(chunk) = self.read_chunk()? else {
                return Ok(None);
            };
            if let ControlFlow::Break(value) = callback(chunk, base) {
                return Ok(Some(value));
            }
        }
    }
}
