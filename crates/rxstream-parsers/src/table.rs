//! Declarative option tables.
//!
//! A [`TokenTable`] is an ordered list of keywords, each with the minimum
//! abbreviation it accepts and the [`Action`]s to run against a parameter
//! block when it matches. Tokens that match no keyword go to the table's
//! unknown-token handler (used for numeric operands such as offsets).

use tracing::trace;

use crate::tokenizer::Tokens;
use crate::traits::{OptionBlock, ParseError, ParseResult, Slot};

/// Callback run by [`Action::Call`]; may consume further tokens
pub type Callback<P> = fn(&mut P, &mut Tokens<'_>) -> ParseResult<()>;

/// Handler for tokens no keyword matched
pub type UnknownHandler<P> = fn(&mut P, &str, &mut Tokens<'_>) -> ParseResult<()>;

/// Literal copied into a field by [`Action::Copy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Number(u32),
    Text(&'static str),
}

/// One step of a keyword's action list
pub enum Action<P: OptionBlock> {
    /// `field |= mask`
    BitOr(Slot<P::Field>, u32),
    /// `field &= mask`
    BitAnd(Slot<P::Field>, u32),
    /// Fail if the field is already non-zero
    MustBeZero(Slot<P::Field>),
    /// Fail if any bit of `mask` is already set
    MutualExclusion(Slot<P::Field>, u32),
    /// Fail unless every bit of `mask` is already set
    MutualInclusion(Slot<P::Field>, u32),
    /// Replace the field with a literal
    Copy(Slot<P::Field>, Literal),
    /// Append text to a text field
    Concat(Slot<P::Field>, &'static str),
    /// Hand control to a callback
    Call(Callback<P>),
}

impl<P: OptionBlock> Action<P> {
    fn apply(&self, block: &mut P, token: &str, tokens: &mut Tokens<'_>) -> ParseResult<()> {
        match self {
            Action::BitOr(slot, mask) => {
                let value = block.value(slot.field) | mask;
                store(block, *slot, value);
            }
            Action::BitAnd(slot, mask) => {
                let value = block.value(slot.field) & mask;
                store(block, *slot, value);
            }
            Action::MustBeZero(slot) => {
                if block.value(slot.field) & slot.width.mask() != 0 {
                    return Err(ParseError::AmbiguousOption { token: token.to_string() });
                }
            }
            Action::MutualExclusion(slot, mask) => {
                if block.value(slot.field) & mask & slot.width.mask() != 0 {
                    return Err(ParseError::AmbiguousOption { token: token.to_string() });
                }
            }
            Action::MutualInclusion(slot, mask) => {
                let required = mask & slot.width.mask();
                if block.value(slot.field) & required != required {
                    return Err(ParseError::MissingPrerequisite { token: token.to_string() });
                }
            }
            Action::Copy(slot, Literal::Number(value)) => store(block, *slot, *value),
            Action::Copy(slot, Literal::Text(text)) => {
                let field = block.text_mut(slot.field).ok_or_else(|| ParseError::Conflict {
                    message: format!("{:?} is not a text field", slot.field),
                })?;
                field.clear();
                field.push_str(text);
            }
            Action::Concat(slot, text) => {
                let field = block.text_mut(slot.field).ok_or_else(|| ParseError::Conflict {
                    message: format!("{:?} is not a text field", slot.field),
                })?;
                field.push_str(text);
            }
            Action::Call(callback) => callback(block, tokens)?,
        }
        Ok(())
    }
}

fn store<P: OptionBlock>(block: &mut P, slot: Slot<P::Field>, value: u32) {
    block.set_value(slot.field, value & slot.width.mask());
}

/// A keyword and what it does
pub struct Entry<P: OptionBlock + 'static> {
    /// Full keyword, upper case
    pub keyword: &'static str,
    /// Shortest accepted abbreviation
    pub min_abbrev: usize,
    /// Actions run in order on a match
    pub actions: &'static [Action<P>],
}

/// Ordered keyword table plus the unknown-token handler
pub struct TokenTable<P: OptionBlock + 'static> {
    pub entries: &'static [Entry<P>],
    pub unknown: Option<UnknownHandler<P>>,
}

/// Outcome of comparing a token with a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMatch {
    /// Token is an accepted abbreviation
    Match,
    /// Token is a prefix, but shorter than the minimum abbreviation
    TooShort,
    /// Not a prefix at all
    NoMatch,
}

/// Case-insensitive prefix match bounded by `min_abbrev`
pub fn keyword_match(token: &str, keyword: &str, min_abbrev: usize) -> KeywordMatch {
    let token = token.as_bytes();
    let keyword = keyword.as_bytes();

    if token.is_empty() || token.len() > keyword.len() {
        return KeywordMatch::NoMatch;
    }
    if !keyword[..token.len()].eq_ignore_ascii_case(token) {
        return KeywordMatch::NoMatch;
    }
    if token.len() < min_abbrev {
        KeywordMatch::TooShort
    } else {
        KeywordMatch::Match
    }
}

impl<P: OptionBlock + 'static> TokenTable<P> {
    /// Parse a complete option string into `block`
    ///
    /// Running out of tokens ends parsing successfully with whatever state
    /// has accumulated.
    pub fn parse(&self, input: &str, block: &mut P) -> ParseResult<()> {
        let mut tokens = Tokens::new(input);
        self.parse_tokens(&mut tokens, block)
    }

    /// Parse the remaining tokens of an existing cursor
    pub fn parse_tokens(&self, tokens: &mut Tokens<'_>, block: &mut P) -> ParseResult<()> {
        while let Some(token) = tokens.next_token() {
            self.apply_token(token, tokens, block)?;
        }
        Ok(())
    }

    /// Find the entry a token selects
    pub fn lookup(&self, token: &str) -> ParseResult<Option<&'static Entry<P>>> {
        let mut too_short = false;

        for entry in self.entries {
            match keyword_match(token, entry.keyword, entry.min_abbrev) {
                KeywordMatch::Match => return Ok(Some(entry)),
                KeywordMatch::TooShort => too_short = true,
                KeywordMatch::NoMatch => {}
            }
        }

        if too_short {
            Err(ParseError::AmbiguousOption { token: token.to_string() })
        } else {
            Ok(None)
        }
    }

    fn apply_token(&self, token: &str, tokens: &mut Tokens<'_>, block: &mut P) -> ParseResult<()> {
        if let Some(entry) = self.lookup(token)? {
            trace!(token, keyword = entry.keyword, "option matched");
            for action in entry.actions {
                action.apply(block, token, tokens)?;
            }
            return Ok(());
        }

        let invalid = || ParseError::InvalidOption { token: token.to_string() };
        match self.unknown {
            Some(handler) => handler(block, token, tokens).map_err(|_| invalid()),
            None => Err(invalid()),
        }
    }
}

/// Parse a token as an unsigned decimal number
pub fn parse_number(token: &str) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum F {
        Flags,
        Small,
        Label,
    }

    #[derive(Debug, Default)]
    struct Block {
        flags: u32,
        small: u32,
        label: String,
        count: Option<u64>,
    }

    impl OptionBlock for Block {
        type Field = F;

        fn value(&self, field: F) -> u32 {
            match field {
                F::Flags => self.flags,
                F::Small => self.small,
                F::Label => 0,
            }
        }

        fn set_value(&mut self, field: F, value: u32) {
            match field {
                F::Flags => self.flags = value,
                F::Small => self.small = value,
                F::Label => {}
            }
        }

        fn text_mut(&mut self, field: F) -> Option<&mut String> {
            match field {
                F::Label => Some(&mut self.label),
                _ => None,
            }
        }
    }

    const FLAGS: Slot<F> = Slot::half(F::Flags);
    const SMALL: Slot<F> = Slot::byte(F::Small);
    const LABEL: Slot<F> = Slot::word(F::Label);

    fn take_count(block: &mut Block, tokens: &mut Tokens<'_>) -> ParseResult<()> {
        let token = tokens.next_token().ok_or(ParseError::Missing { what: "count".into() })?;
        block.count = Some(parse_number(token).ok_or_else(|| ParseError::InvalidValue {
            option: "COUNT".into(),
            value: token.into(),
        })?);
        Ok(())
    }

    fn unknown_number(block: &mut Block, token: &str, _tokens: &mut Tokens<'_>) -> ParseResult<()> {
        block.small = parse_number(token).ok_or(ParseError::Missing { what: "number".into() })? as u32;
        Ok(())
    }

    static TABLE: TokenTable<Block> = TokenTable {
        entries: &[
            Entry { keyword: "ALPHA", min_abbrev: 1, actions: &[Action::MustBeZero(FLAGS), Action::BitOr(FLAGS, 0x01)] },
            Entry { keyword: "BETA", min_abbrev: 3, actions: &[Action::MutualExclusion(FLAGS, 0x01), Action::BitOr(FLAGS, 0x02)] },
            Entry { keyword: "GAMMA", min_abbrev: 1, actions: &[Action::MutualInclusion(FLAGS, 0x01), Action::BitOr(FLAGS, 0x104)] },
            Entry { keyword: "CLEAR", min_abbrev: 2, actions: &[Action::BitAnd(FLAGS, 0xFF00)] },
            Entry { keyword: "COUNT", min_abbrev: 2, actions: &[Action::Call(take_count)] },
            Entry { keyword: "WIDE", min_abbrev: 1, actions: &[Action::Copy(SMALL, Literal::Number(0x1FF))] },
            Entry { keyword: "NAME", min_abbrev: 1, actions: &[Action::Copy(LABEL, Literal::Text("x")), Action::Concat(LABEL, "yz")] },
        ],
        unknown: Some(unknown_number),
    };

    #[test]
    fn test_keyword_match() {
        assert_eq!(keyword_match("rec", "RECLENGTH", 3), KeywordMatch::Match);
        assert_eq!(keyword_match("RE", "RECLENGTH", 3), KeywordMatch::TooShort);
        assert_eq!(keyword_match("RECLENGTHS", "RECLENGTH", 3), KeywordMatch::NoMatch);
        assert_eq!(keyword_match("RX", "RECLENGTH", 1), KeywordMatch::NoMatch);
    }

    #[test]
    fn test_bit_or_and_must_be_zero() {
        let mut block = Block::default();
        TABLE.parse("alpha", &mut block).unwrap();
        assert_eq!(block.flags, 0x01);

        let mut block = Block::default();
        let err = TABLE.parse("A A", &mut block).unwrap_err();
        assert_eq!(err, ParseError::AmbiguousOption { token: "A".into() });
    }

    #[test]
    fn test_mutual_exclusion() {
        let mut block = Block::default();
        let err = TABLE.parse("A BETA", &mut block).unwrap_err();
        assert_eq!(err, ParseError::AmbiguousOption { token: "BETA".into() });

        let mut block = Block::default();
        TABLE.parse("BET", &mut block).unwrap();
        assert_eq!(block.flags, 0x02);
    }

    #[test]
    fn test_mutual_inclusion() {
        let mut block = Block::default();
        let err = TABLE.parse("GAMMA", &mut block).unwrap_err();
        assert_eq!(err, ParseError::MissingPrerequisite { token: "GAMMA".into() });

        let mut block = Block::default();
        TABLE.parse("A G", &mut block).unwrap();
        assert_eq!(block.flags, 0x105);
    }

    #[test]
    fn test_bit_and() {
        let mut block = Block::default();
        TABLE.parse("A G CL", &mut block).unwrap();
        assert_eq!(block.flags, 0x100);
    }

    #[test]
    fn test_copy_truncates_to_width() {
        let mut block = Block::default();
        TABLE.parse("WIDE", &mut block).unwrap();
        assert_eq!(block.small, 0xFF);
    }

    #[test]
    fn test_copy_and_concat_text() {
        let mut block = Block::default();
        TABLE.parse("NAME NAME", &mut block).unwrap();
        assert_eq!(block.label, "xyz");
    }

    #[test]
    fn test_callback_consumes_tokens() {
        let mut block = Block::default();
        TABLE.parse("COUNT 12 A", &mut block).unwrap();
        assert_eq!(block.count, Some(12));
        assert_eq!(block.flags, 0x01);

        let mut block = Block::default();
        let err = TABLE.parse("COUNT x", &mut block).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn test_too_short_abbreviation() {
        let mut block = Block::default();
        let err = TABLE.parse("BE", &mut block).unwrap_err();
        assert_eq!(err, ParseError::AmbiguousOption { token: "BE".into() });
    }

    #[test]
    fn test_unknown_handler() {
        let mut block = Block::default();
        TABLE.parse("42", &mut block).unwrap();
        assert_eq!(block.small, 42);

        let mut block = Block::default();
        let err = TABLE.parse("zzz", &mut block).unwrap_err();
        assert_eq!(err, ParseError::InvalidOption { token: "zzz".into() });
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("007"), Some(7));
        assert_eq!(parse_number("-1"), None);
        assert_eq!(parse_number("1e3"), None);
        assert_eq!(parse_number(""), None);
    }
}
