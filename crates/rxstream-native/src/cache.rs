//! Memoized stream counts
//!
//! Size and line counts are expensive to recompute (a stat or a full scan),
//! so a descriptor keeps them here. Every operation that moves a cursor
//! discontinuously or rewrites existing data calls [`PseudoCache::invalidate`]
//! or one of the narrower helpers.

/// Cached size and line counts; `None` means not yet computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PseudoCache {
    /// Stream size in bytes
    pub size: Option<u64>,
    /// Lines remaining after the read cursor
    pub lines: Option<u64>,
    /// Total lines in the stream
    pub max_lines: Option<u64>,
}

impl PseudoCache {
    /// Drop everything
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Drop the line counts, keep the size
    pub fn invalidate_lines(&mut self) {
        self.lines = None;
        self.max_lines = None;
    }

    /// The read cursor moved somewhere unrelated
    pub fn read_moved(&mut self) {
        self.lines = None;
    }

    /// One line was consumed by a sequential read
    pub fn line_consumed(&mut self) {
        if let Some(lines) = self.lines.as_mut() {
            *lines = lines.saturating_sub(1);
        }
    }

    /// A complete line was appended at end of stream
    pub fn line_appended(&mut self) {
        if let Some(lines) = self.lines.as_mut() {
            *lines += 1;
        }
        if let Some(max) = self.max_lines.as_mut() {
            *max += 1;
        }
    }

    /// Bytes were written ending at 0-based offset `end`
    pub fn extend_size(&mut self, end: u64) {
        if let Some(size) = self.size.as_mut() {
            *size = (*size).max(end);
        }
    }

    /// Whether any line count is cached
    pub fn has_lines(&self) -> bool {
        self.lines.is_some() || self.max_lines.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_clears_everything() {
        let mut cache = PseudoCache { size: Some(10), lines: Some(3), max_lines: Some(4) };
        cache.invalidate();
        assert_eq!(cache, PseudoCache::default());
    }

    #[test]
    fn test_line_bookkeeping() {
        let mut cache = PseudoCache { size: Some(10), lines: Some(1), max_lines: None };
        cache.line_consumed();
        cache.line_consumed();
        assert_eq!(cache.lines, Some(0));

        cache.line_appended();
        assert_eq!(cache.lines, Some(1));
        assert_eq!(cache.max_lines, None);

        cache.invalidate_lines();
        assert!(!cache.has_lines());
        assert_eq!(cache.size, Some(10));
    }

    #[test]
    fn test_extend_size_only_when_known() {
        let mut cache = PseudoCache::default();
        cache.extend_size(5);
        assert_eq!(cache.size, None);

        cache.size = Some(3);
        cache.extend_size(5);
        cache.extend_size(4);
        assert_eq!(cache.size, Some(5));
    }
}
