//! Integration tests for the option-string grammar
//!
//! These tests cover:
//! - Abbreviation matching across whole keyword tables
//! - OPEN option combinations and their conflicts
//! - Position strings in any token order
//! - Error mapping into the unified stream error

use rxstream_parsers::{
    Direction, OpenMode, OpenParams, ParseError, PositionParams, Query, ShareMode, StreamCommand,
    Target, Unit,
};

/// Every accepted abbreviation of a keyword, shortest first
fn abbreviations(keyword: &str, min: usize) -> Vec<String> {
    (min..=keyword.len()).map(|n| keyword[..n].to_string()).collect()
}

// ==================== OPEN ====================

#[test]
fn test_every_mode_abbreviation() {
    for token in abbreviations("READ", 1) {
        assert_eq!(OpenParams::parse(&token).unwrap().mode(), OpenMode::Read, "{token}");
    }
    for token in abbreviations("WRITE", 1) {
        assert_eq!(OpenParams::parse(&token).unwrap().mode(), OpenMode::Write, "{token}");
    }
    for token in abbreviations("BOTH", 2) {
        assert_eq!(OpenParams::parse(&token).unwrap().mode(), OpenMode::Both, "{token}");
    }
}

#[test]
fn test_share_keywords() {
    let cases = [
        ("SHARED", ShareMode::Shared),
        ("SHAREREAD", ShareMode::ShareRead),
        ("sharewrite", ShareMode::ShareWrite),
        ("NOS", ShareMode::NoShare),
    ];
    for (token, expected) in cases {
        assert_eq!(OpenParams::parse(token).unwrap().share(), expected, "{token}");
    }
    assert!(matches!(
        OpenParams::parse("SHARED NOSHARE"),
        Err(ParseError::AmbiguousOption { .. })
    ));
}

#[test]
fn test_append_write_keeps_mode() {
    let params = OpenParams::parse("WRITE APPEND").unwrap();
    assert_eq!(params.mode(), OpenMode::Write);
    assert!(params.append());

    let params = OpenParams::parse("APPEND").unwrap();
    assert_eq!(params.mode(), OpenMode::Both);
}

#[test]
fn test_reclength_then_binary_is_invalid_call() {
    let err = StreamCommand::parse("OPEN RECLENGTH 4 BINARY").unwrap_err();
    let err: rxstream_core::Error = err.into();
    assert!(matches!(err, rxstream_core::Error::InvalidCall { .. }));
}

#[test]
fn test_unknown_option_keeps_token() {
    let err: rxstream_core::Error = StreamCommand::parse("OPEN READ TURBO").unwrap_err().into();
    match err {
        rxstream_core::Error::InvalidOption { token } => assert_eq!(token, "TURBO"),
        other => panic!("unexpected {other:?}"),
    }
}

// ==================== POSITION ====================

#[test]
fn test_position_token_order_is_free() {
    let a = PositionParams::parse("+5 LINE WRITE").unwrap();
    let b = PositionParams::parse("WRITE LINE + 5").unwrap();
    let c = PositionParams::parse("l w 5 +").unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(a.target(), Some(Target::Write));
}

#[test]
fn test_query_dispatch() {
    match StreamCommand::parse("QUERY POSITION READ LINE").unwrap() {
        StreamCommand::Query(Query::Position(params)) => {
            assert_eq!(params.target(), Some(Target::Read));
            assert_eq!(params.unit(), Unit::Line);
            assert!(!params.sys());
        }
        other => panic!("unexpected {other:?}"),
    }
}

// Property-based tests using proptest
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn direction_strategy() -> impl Strategy<Value = (&'static str, Direction)> {
        prop_oneof![
            Just(("=", Direction::Absolute)),
            Just(("<", Direction::FromEnd)),
            Just(("+", Direction::Forward)),
            Just(("-", Direction::Backward)),
        ]
    }

    proptest! {
        #[test]
        fn test_position_offset_round_trips(offset in 0u64..u64::MAX, (symbol, direction) in direction_strategy()) {
            let params = PositionParams::parse(&format!("{symbol}{offset}")).unwrap();
            prop_assert_eq!(params.offset(), offset);
            prop_assert_eq!(params.direction(), direction);
        }

        #[test]
        fn test_reclength_value_kept(length in 1u32..=u32::MAX) {
            let params = OpenParams::parse(&format!("BINARY RECLENGTH {length}")).unwrap();
            prop_assert_eq!(params.record_length(), Some(u64::from(length)));
        }

        #[test]
        fn test_case_never_matters(mask in proptest::collection::vec(any::<bool>(), 9)) {
            let word: String = "RECLENGTH"
                .chars()
                .zip(mask)
                .map(|(c, lower)| if lower { c.to_ascii_lowercase() } else { c })
                .collect();
            let params = OpenParams::parse(&format!("BINARY {word} 12")).unwrap();
            prop_assert_eq!(params.record_length(), Some(12));
        }

        #[test]
        fn test_garbage_never_panics(input in "[ -~]{0,40}") {
            let _ = StreamCommand::parse(&input);
        }
    }
}
