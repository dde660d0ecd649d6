//! Newline scanning
//!
//! Only `\n` delimits a line. `\r\n` is a `\n` with a `\r` in front, so a
//! chunk boundary between the two cannot split a delimiter; a lone `\r`
//! never ends a line. An unterminated final line still counts.

/// Outcome of a bounded scan over one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Target found; index just past the delimiter that ends the search
    Found(usize),
    /// Buffer exhausted; delimiters still wanted
    Short(u64),
}

/// Find the position just past the `count`-th `\n` in `buf`
///
/// `count == 0` is satisfied at index 0.
pub fn scan_forward_lines(buf: &[u8], count: u64) -> Scan {
    if count == 0 {
        return Scan::Found(0);
    }
    let mut remaining = count;
    for (idx, &byte) in buf.iter().enumerate() {
        if byte == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return Scan::Found(idx + 1);
            }
        }
    }
    Scan::Short(remaining)
}

/// Walk backward from the end of `buf` over `wanted` delimiters
///
/// `buf` holds the bytes before a cursor. To move back N lines a caller asks
/// for N + 1 delimiters: the last one found ends the line before the target,
/// so the target starts just past it. `Short(1)` at the start of the stream
/// means the target is line 1.
pub fn scan_backward_lines(buf: &[u8], wanted: u64) -> Scan {
    if wanted == 0 {
        return Scan::Found(buf.len());
    }
    let mut remaining = wanted;
    for (idx, &byte) in buf.iter().enumerate().rev() {
        if byte == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return Scan::Found(idx + 1);
            }
        }
    }
    Scan::Short(remaining)
}

/// Count `\n` bytes
pub fn count_delimiters(buf: &[u8]) -> u64 {
    buf.iter().filter(|&&b| b == b'\n').count() as u64
}

/// Incremental line counter fed one chunk at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCounter {
    delimiters: u64,
    last: Option<u8>,
}

impl LineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for the next chunk
    pub fn feed(&mut self, chunk: &[u8]) {
        self.delimiters += count_delimiters(chunk);
        if let Some(&byte) = chunk.last() {
            self.last = Some(byte);
        }
    }

    /// Lines seen, counting an unterminated tail as one line
    pub fn finish(&self) -> u64 {
        match self.last {
            Some(b'\n') | None => self.delimiters,
            Some(_) => self.delimiters + 1,
        }
    }
}

/// Count lines in a complete buffer
pub fn count_lines(buf: &[u8]) -> u64 {
    let mut counter = LineCounter::new();
    counter.feed(buf);
    counter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"a\nbb\nccc\n";

    #[test]
    fn test_forward_scan() {
        assert_eq!(scan_forward_lines(TEXT, 0), Scan::Found(0));
        assert_eq!(scan_forward_lines(TEXT, 1), Scan::Found(2));
        assert_eq!(scan_forward_lines(TEXT, 3), Scan::Found(9));
        assert_eq!(scan_forward_lines(TEXT, 5), Scan::Short(2));
    }

    #[test]
    fn test_backward_scan() {
        // Cursor at the start of "ccc" (index 5): one line back is "bb"
        assert_eq!(scan_backward_lines(&TEXT[..5], 2), Scan::Found(2));
        // Two lines back reaches the start with one delimiter missing
        assert_eq!(scan_backward_lines(&TEXT[..5], 3), Scan::Short(1));
        assert_eq!(scan_backward_lines(&TEXT[..5], 5), Scan::Short(3));
    }

    #[test]
    fn test_backward_scan_mid_line() {
        // Cursor inside "ccc": moving back zero lines goes to its start
        assert_eq!(scan_backward_lines(&TEXT[..7], 1), Scan::Found(5));
    }

    #[test]
    fn test_lone_cr_not_a_delimiter() {
        assert_eq!(count_lines(b"a\rb\r"), 1);
        assert_eq!(count_lines(b"a\r\nb\r\n"), 2);
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(TEXT), 3);
        assert_eq!(count_lines(b"a\nb"), 2);
        assert_eq!(count_lines(b"\n\n"), 2);
    }

    #[test]
    fn test_counter_across_chunks() {
        let mut counter = LineCounter::new();
        counter.feed(b"a\r");
        counter.feed(b"\nb");
        counter.feed(b"");
        assert_eq!(counter.finish(), 2);
    }
}
