//! Option-string tokenizer
//!
//! Tokens are separated by whitespace. The characters `=`, `+`, `-` and `<`
//! always form a token of their own, so `"+5"` yields `"+"` then `"5"`.

/// Characters that are always a token by themselves
pub const SPECIAL_CHARS: &[u8] = b"=+-<";

/// Cursor over the tokens of an option string
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    /// Create a cursor at the start of `input`
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the next unread token
    fn token_bounds(&self) -> Option<(usize, usize)> {
        let bytes = self.input.as_bytes();
        let mut start = self.pos;

        while start < bytes.len() && bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        if start >= bytes.len() {
            return None;
        }

        if SPECIAL_CHARS.contains(&bytes[start]) {
            return Some((start, start + 1));
        }

        let mut end = start;
        while end < bytes.len()
            && !bytes[end].is_ascii_whitespace()
            && !SPECIAL_CHARS.contains(&bytes[end])
        {
            end += 1;
        }
        Some((start, end))
    }

    /// Look at the next token without consuming it
    pub fn peek(&self) -> Option<&'a str> {
        self.token_bounds().map(|(start, end)| &self.input[start..end])
    }

    /// Consume and return the next token
    pub fn next_token(&mut self) -> Option<&'a str> {
        let (start, end) = self.token_bounds()?;
        self.pos = end;
        Some(&self.input[start..end])
    }

    /// Unconsumed remainder of the input, trimmed
    pub fn rest(&self) -> &'a str {
        self.input[self.pos..].trim()
    }

    /// Check whether any tokens remain
    pub fn is_empty(&self) -> bool {
        self.token_bounds().is_none()
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
