// rxstream-parsers/src/traits.rs
//! Core traits and errors for the option-string grammar.
//!
//! An option table writes into a *parameter block*: any type that exposes
//! numbered fields through [`OptionBlock`]. Table actions address those
//! fields through a [`Slot`], which also fixes the width (1, 2 or 4 bytes)
//! that values are truncated to.

use thiserror::Error;

/// Errors that can occur while parsing option strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid option: {token}")]
    InvalidOption { token: String },

    #[error("Ambiguous option: {token}")]
    AmbiguousOption { token: String },

    #[error("Option {token} requires an earlier option")]
    MissingPrerequisite { token: String },

    #[error("Invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },

    #[error("Missing required {what}")]
    Missing { what: String },

    #[error("Conflicting options: {message}")]
    Conflict { message: String },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::Nested { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ParseError> for rxstream_core::Error {
    fn from(err: ParseError) -> Self {
        match err.root() {
            ParseError::InvalidOption { token } => rxstream_core::Error::InvalidOption {
                token: token.clone(),
            },
            ParseError::AmbiguousOption { token } => rxstream_core::Error::AmbiguousOption {
                token: token.clone(),
            },
            _ => rxstream_core::Error::invalid_call(err.to_string()),
        }
    }
}

/// Result type alias for option parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Storage width of a parameter-block field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// One byte
    Byte,
    /// Two bytes
    Half,
    /// Four bytes
    Word,
}

impl Width {
    /// Mask of the bits a field of this width can hold
    pub const fn mask(self) -> u32 {
        match self {
            Width::Byte => 0xFF,
            Width::Half => 0xFFFF,
            Width::Word => 0xFFFF_FFFF,
        }
    }
}

/// A field reference plus its width, as named by a table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<F> {
    pub field: F,
    pub width: Width,
}

impl<F> Slot<F> {
    pub const fn byte(field: F) -> Self {
        Self { field, width: Width::Byte }
    }

    pub const fn half(field: F) -> Self {
        Self { field, width: Width::Half }
    }

    pub const fn word(field: F) -> Self {
        Self { field, width: Width::Word }
    }
}

/// Output parameter block filled in by an option table
///
/// Numeric fields are read and written as `u32`; the table's [`Slot`]
/// truncates values to the declared width before they are stored. Blocks
/// with text fields override [`OptionBlock::text_mut`].
pub trait OptionBlock {
    /// Field identifier
    type Field: Copy + std::fmt::Debug;

    /// Current numeric value of a field
    fn value(&self, field: Self::Field) -> u32;

    /// Store a numeric value
    fn set_value(&mut self, field: Self::Field, value: u32);

    /// Mutable access to a text field, `None` for numeric fields
    fn text_mut(&mut self, _field: Self::Field) -> Option<&mut String> {
        None
    }
}
