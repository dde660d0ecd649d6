//! rxstream-parsers
//!
//! Option-string grammar for the stream layer.
//!
//! | Table | Used by | Example |
//! |-------|---------|---------|
//! | OPEN | `StreamCommand::Open` | `READ SHARED BINARY RECLENGTH 80` |
//! | POSITION | `StreamCommand::Seek`, `charin`/`linein` positioning | `+5 LINE WRITE` |
//! | QUERY POSITION | `Query::Position` | `READ SYS` |
//!
//! # Example
//!
//! ```rust
//! use rxstream_parsers::{StreamCommand, OpenMode};
//!
//! let command = StreamCommand::parse("OPEN READ BINARY RECLENGTH 80").unwrap();
//! if let StreamCommand::Open(params) = command {
//!     assert_eq!(params.mode(), OpenMode::Read);
//!     assert_eq!(params.record_length(), Some(80));
//! }
//! ```

pub mod command;
pub mod logging;
pub mod open;
pub mod position;
pub mod table;
pub mod tokenizer;
pub mod traits;

// Re-export main types
pub use command::{Query, StreamCommand};
pub use open::{OpenMode, OpenParams, ShareMode};
pub use position::{Direction, PositionParams, QueryPositionParams, Target, Unit};
pub use table::{keyword_match, parse_number, Action, Entry, KeywordMatch, Literal, TokenTable};
pub use tokenizer::Tokens;
pub use traits::{OptionBlock, ParseError, ParseResult, Slot, Width};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
