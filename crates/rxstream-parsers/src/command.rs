//! STREAM command dispatcher
//!
//! Decodes the command word (OPEN, CLOSE, FLUSH, SEEK/POSITION, QUERY) and
//! hands the operand to the matching option table.

use crate::open::OpenParams;
use crate::position::{PositionParams, QueryPositionParams};
use crate::table::{keyword_match, KeywordMatch};
use crate::tokenizer::Tokens;
use crate::traits::{ParseError, ParseResult};

/// A decoded STREAM command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    Open(OpenParams),
    Close,
    Flush,
    /// SEEK and POSITION are synonyms
    Seek(PositionParams),
    Query(Query),
}

/// Operand of QUERY
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Exists,
    Size,
    DateTime,
    Timestamp,
    Handle,
    StreamType,
    /// QUERY SEEK and QUERY POSITION
    Position(QueryPositionParams),
}

#[derive(Clone, Copy)]
enum Word {
    Open,
    Close,
    Flush,
    Seek,
    Query,
    Exists,
    Size,
    DateTime,
    Timestamp,
    Handle,
    StreamType,
}

const COMMAND_WORDS: &[(&str, usize, Word)] = &[
    ("OPEN", 1, Word::Open),
    ("CLOSE", 1, Word::Close),
    ("FLUSH", 1, Word::Flush),
    ("SEEK", 2, Word::Seek),
    ("POSITION", 1, Word::Seek),
    ("QUERY", 1, Word::Query),
];

const QUERY_WORDS: &[(&str, usize, Word)] = &[
    ("EXISTS", 1, Word::Exists),
    ("SIZE", 2, Word::Size),
    ("DATETIME", 1, Word::DateTime),
    ("TIMESTAMP", 1, Word::Timestamp),
    ("HANDLE", 1, Word::Handle),
    ("STREAMTYPE", 2, Word::StreamType),
    ("SEEK", 2, Word::Seek),
    ("POSITION", 1, Word::Seek),
];

fn select(token: &str, words: &[(&str, usize, Word)]) -> ParseResult<Word> {
    let mut too_short = false;
    for &(keyword, min_abbrev, word) in words {
        match keyword_match(token, keyword, min_abbrev) {
            KeywordMatch::Match => return Ok(word),
            KeywordMatch::TooShort => too_short = true,
            KeywordMatch::NoMatch => {}
        }
    }
    if too_short {
        Err(ParseError::AmbiguousOption { token: token.to_string() })
    } else {
        Err(ParseError::InvalidOption { token: token.to_string() })
    }
}

fn expect_end(tokens: &Tokens<'_>) -> ParseResult<()> {
    match tokens.peek() {
        Some(extra) => Err(ParseError::InvalidOption { token: extra.to_string() }),
        None => Ok(()),
    }
}

impl StreamCommand {
    /// Decode a full command string such as `"OPEN READ BINARY RECLENGTH 8"`
    pub fn parse(input: &str) -> ParseResult<Self> {
        let mut tokens = Tokens::new(input);
        let first = tokens
            .next_token()
            .ok_or_else(|| ParseError::Missing { what: "stream command".to_string() })?;

        let command = match select(first, COMMAND_WORDS)? {
            Word::Open => StreamCommand::Open(
                OpenParams::parse(tokens.rest()).map_err(|e| e.with_context("OPEN"))?,
            ),
            Word::Close => {
                expect_end(&tokens)?;
                StreamCommand::Close
            }
            Word::Flush => {
                expect_end(&tokens)?;
                StreamCommand::Flush
            }
            Word::Seek => StreamCommand::Seek(
                PositionParams::parse(tokens.rest()).map_err(|e| e.with_context("SEEK"))?,
            ),
            Word::Query => StreamCommand::Query(Self::parse_query(&mut tokens)?),
            _ => return Err(ParseError::InvalidOption { token: first.to_string() }),
        };
        Ok(command)
    }

    fn parse_query(tokens: &mut Tokens<'_>) -> ParseResult<Query> {
        let word = tokens
            .next_token()
            .ok_or_else(|| ParseError::Missing { what: "QUERY operand".to_string() })?;

        let query = match select(word, QUERY_WORDS)? {
            Word::Seek => {
                return QueryPositionParams::parse(tokens.rest())
                    .map(Query::Position)
                    .map_err(|e| e.with_context("QUERY POSITION"));
            }
            Word::Exists => Query::Exists,
            Word::Size => Query::Size,
            Word::DateTime => Query::DateTime,
            Word::Timestamp => Query::Timestamp,
            Word::Handle => Query::Handle,
            Word::StreamType => Query::StreamType,
            _ => return Err(ParseError::InvalidOption { token: word.to_string() }),
        };
        expect_end(tokens)?;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open::OpenMode;
    use crate::position::{Direction, Unit};

    #[test]
    fn test_open_with_options() {
        match StreamCommand::parse("open read binary reclength 8").unwrap() {
            StreamCommand::Open(params) => {
                assert_eq!(params.mode(), OpenMode::Read);
                assert_eq!(params.record_length(), Some(8));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_close_and_flush() {
        assert_eq!(StreamCommand::parse("CLOSE").unwrap(), StreamCommand::Close);
        assert_eq!(StreamCommand::parse("f").unwrap(), StreamCommand::Flush);
        assert!(matches!(StreamCommand::parse("CLOSE NOW"), Err(ParseError::InvalidOption { .. })));
    }

    #[test]
    fn test_seek_and_position_are_synonyms() {
        let seek = StreamCommand::parse("SEEK +3 LINE").unwrap();
        let position = StreamCommand::parse("POS +3 LINE").unwrap();
        assert_eq!(seek, position);
        match seek {
            StreamCommand::Seek(params) => {
                assert_eq!(params.direction(), Direction::Forward);
                assert_eq!(params.unit(), Unit::Line);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_short_seek_is_ambiguous() {
        assert!(matches!(StreamCommand::parse("S 1"), Err(ParseError::AmbiguousOption { .. })));
    }

    #[test]
    fn test_queries() {
        assert_eq!(StreamCommand::parse("QUERY EXISTS").unwrap(), StreamCommand::Query(Query::Exists));
        assert_eq!(StreamCommand::parse("q si").unwrap(), StreamCommand::Query(Query::Size));
        assert_eq!(StreamCommand::parse("Q D").unwrap(), StreamCommand::Query(Query::DateTime));
        assert_eq!(StreamCommand::parse("Q T").unwrap(), StreamCommand::Query(Query::Timestamp));
        assert_eq!(StreamCommand::parse("Q H").unwrap(), StreamCommand::Query(Query::Handle));
        assert_eq!(StreamCommand::parse("Q ST").unwrap(), StreamCommand::Query(Query::StreamType));
        assert!(matches!(StreamCommand::parse("Q S"), Err(ParseError::AmbiguousOption { .. })));
    }

    #[test]
    fn test_query_position() {
        match StreamCommand::parse("QUERY POSITION WRITE SYS").unwrap() {
            StreamCommand::Query(Query::Position(params)) => assert!(params.sys()),
            other => panic!("unexpected {other:?}"),
        }
        match StreamCommand::parse("QUERY SEEK LINE").unwrap() {
            StreamCommand::Query(Query::Position(params)) => assert_eq!(params.unit(), Unit::Line),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_errors_keep_root_cause() {
        let err = StreamCommand::parse("OPEN RECLENGTH 4 BINARY").unwrap_err();
        assert_eq!(err.root(), &ParseError::MissingPrerequisite { token: "RECLENGTH".into() });
        assert!(matches!(StreamCommand::parse(""), Err(ParseError::Missing { .. })));
        assert!(matches!(StreamCommand::parse("DELETE"), Err(ParseError::InvalidOption { .. })));
    }
}
