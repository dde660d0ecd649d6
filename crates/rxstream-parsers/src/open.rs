//! OPEN option table
//!
//! ```text
//! OPEN [READ|WRITE|BOTH] [APPEND|REPLACE] [NOBUFFER] [BINARY [RECLENGTH n]]
//!      [SHARED|SHAREREAD|SHAREWRITE|NOSHARE] [AUTOSYNC] [DELAY]
//! ```

use crate::table::{parse_number, Action, Entry, Literal, TokenTable};
use crate::tokenizer::Tokens;
use crate::traits::{OptionBlock, ParseError, ParseResult, Slot};

/// Fields of the OPEN parameter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenField {
    Mode,
    Disposition,
    Options,
    Share,
    RecordLength,
    Ignored,
}

/// Access mode requested by OPEN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Both,
}

/// Sharing requested by OPEN
///
/// Recorded on the descriptor; POSIX has no mandatory share locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareMode {
    #[default]
    Shared,
    ShareRead,
    ShareWrite,
    NoShare,
}

/// Parsed OPEN options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenParams {
    mode: u32,
    disposition: u32,
    options: u32,
    share: u32,
    record_length: u32,
    ignored: String,
}

impl OpenParams {
    pub const MODE_READ: u32 = 0x01;
    pub const MODE_WRITE: u32 = 0x02;
    pub const MODE_BOTH: u32 = 0x04;

    pub const APPEND: u32 = 0x01;
    pub const REPLACE: u32 = 0x02;

    pub const NOBUFFER: u32 = 0x01;
    pub const BINARY: u32 = 0x02;
    pub const RECLENGTH_SET: u32 = 0x04;
    pub const AUTOSYNC: u32 = 0x08;

    const SHARE_SHARED: u32 = 1;
    const SHARE_READ: u32 = 2;
    const SHARE_WRITE: u32 = 3;
    const SHARE_NONE: u32 = 4;

    /// Parse an OPEN option string
    pub fn parse(input: &str) -> ParseResult<Self> {
        let mut params = Self::default();
        OPEN_TABLE.parse(input, &mut params)?;
        params.validate()?;
        Ok(params)
    }

    /// Options for a read-only open
    pub fn read() -> Self {
        Self { mode: Self::MODE_READ, ..Default::default() }
    }

    /// Options for a write-only open
    pub fn write() -> Self {
        Self { mode: Self::MODE_WRITE, ..Default::default() }
    }

    fn validate(&self) -> ParseResult<()> {
        if self.binary() && self.replace() && self.record_length().is_none() {
            return Err(ParseError::Conflict {
                message: "BINARY REPLACE requires RECLENGTH".to_string(),
            });
        }
        Ok(())
    }

    /// Requested access; no mode token means BOTH
    pub fn mode(&self) -> OpenMode {
        match self.mode {
            Self::MODE_READ => OpenMode::Read,
            Self::MODE_WRITE => OpenMode::Write,
            _ => OpenMode::Both,
        }
    }

    pub fn append(&self) -> bool {
        self.disposition & Self::APPEND != 0
    }

    pub fn replace(&self) -> bool {
        self.disposition & Self::REPLACE != 0
    }

    pub fn nobuffer(&self) -> bool {
        self.options & Self::NOBUFFER != 0
    }

    pub fn binary(&self) -> bool {
        self.options & Self::BINARY != 0
    }

    pub fn autosync(&self) -> bool {
        self.options & Self::AUTOSYNC != 0
    }

    /// Explicit RECLENGTH, if one was given
    pub fn record_length(&self) -> Option<u64> {
        (self.options & Self::RECLENGTH_SET != 0).then_some(u64::from(self.record_length))
    }

    pub fn share(&self) -> ShareMode {
        match self.share {
            Self::SHARE_READ => ShareMode::ShareRead,
            Self::SHARE_WRITE => ShareMode::ShareWrite,
            Self::SHARE_NONE => ShareMode::NoShare,
            _ => ShareMode::Shared,
        }
    }

    /// Accepted options that have no effect on this platform
    pub fn ignored(&self) -> &str {
        self.ignored.trim_end()
    }
}

impl OptionBlock for OpenParams {
    type Field = OpenField;

    fn value(&self, field: OpenField) -> u32 {
        match field {
            OpenField::Mode => self.mode,
            OpenField::Disposition => self.disposition,
            OpenField::Options => self.options,
            OpenField::Share => self.share,
            OpenField::RecordLength => self.record_length,
            OpenField::Ignored => 0,
        }
    }

    fn set_value(&mut self, field: OpenField, value: u32) {
        match field {
            OpenField::Mode => self.mode = value,
            OpenField::Disposition => self.disposition = value,
            OpenField::Options => self.options = value,
            OpenField::Share => self.share = value,
            OpenField::RecordLength => self.record_length = value,
            OpenField::Ignored => {}
        }
    }

    fn text_mut(&mut self, field: OpenField) -> Option<&mut String> {
        match field {
            OpenField::Ignored => Some(&mut self.ignored),
            _ => None,
        }
    }
}

/// RECLENGTH consumes the next token only when it is numeric
fn take_record_length(params: &mut OpenParams, tokens: &mut Tokens<'_>) -> ParseResult<()> {
    let Some(length) = tokens.peek().and_then(parse_number) else {
        return Ok(());
    };
    tokens.next_token();

    if length == 0 || length > u64::from(u32::MAX) {
        return Err(ParseError::InvalidValue {
            option: "RECLENGTH".to_string(),
            value: length.to_string(),
        });
    }
    params.record_length = length as u32;
    params.options |= OpenParams::RECLENGTH_SET;
    Ok(())
}

const MODE: Slot<OpenField> = Slot::byte(OpenField::Mode);
const DISPOSITION: Slot<OpenField> = Slot::byte(OpenField::Disposition);
const OPTIONS: Slot<OpenField> = Slot::half(OpenField::Options);
const SHARE: Slot<OpenField> = Slot::byte(OpenField::Share);
const IGNORED: Slot<OpenField> = Slot::word(OpenField::Ignored);

static OPEN_TABLE: TokenTable<OpenParams> = TokenTable {
    entries: &[
        Entry {
            keyword: "READ",
            min_abbrev: 1,
            actions: &[
                Action::MustBeZero(MODE),
                Action::MutualExclusion(DISPOSITION, OpenParams::APPEND | OpenParams::REPLACE),
                Action::BitOr(MODE, OpenParams::MODE_READ),
            ],
        },
        Entry {
            keyword: "WRITE",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(MODE), Action::BitOr(MODE, OpenParams::MODE_WRITE)],
        },
        Entry {
            keyword: "BOTH",
            min_abbrev: 2,
            actions: &[Action::MustBeZero(MODE), Action::BitOr(MODE, OpenParams::MODE_BOTH)],
        },
        Entry {
            keyword: "APPEND",
            min_abbrev: 1,
            actions: &[
                Action::MutualExclusion(MODE, OpenParams::MODE_READ),
                Action::MustBeZero(DISPOSITION),
                Action::BitOr(DISPOSITION, OpenParams::APPEND),
            ],
        },
        Entry {
            keyword: "REPLACE",
            min_abbrev: 3,
            actions: &[
                Action::MutualExclusion(MODE, OpenParams::MODE_READ),
                Action::MustBeZero(DISPOSITION),
                Action::BitOr(DISPOSITION, OpenParams::REPLACE),
            ],
        },
        Entry {
            keyword: "NOBUFFER",
            min_abbrev: 1,
            actions: &[Action::BitOr(OPTIONS, OpenParams::NOBUFFER)],
        },
        Entry {
            keyword: "BINARY",
            min_abbrev: 2,
            actions: &[Action::BitOr(OPTIONS, OpenParams::BINARY)],
        },
        Entry {
            keyword: "RECLENGTH",
            min_abbrev: 3,
            actions: &[
                Action::MutualInclusion(OPTIONS, OpenParams::BINARY),
                Action::Call(take_record_length),
            ],
        },
        Entry {
            keyword: "SHARED",
            min_abbrev: 6,
            actions: &[
                Action::MustBeZero(SHARE),
                Action::Copy(SHARE, Literal::Number(OpenParams::SHARE_SHARED)),
            ],
        },
        Entry {
            keyword: "SHAREREAD",
            min_abbrev: 6,
            actions: &[
                Action::MustBeZero(SHARE),
                Action::Copy(SHARE, Literal::Number(OpenParams::SHARE_READ)),
            ],
        },
        Entry {
            keyword: "SHAREWRITE",
            min_abbrev: 6,
            actions: &[
                Action::MustBeZero(SHARE),
                Action::Copy(SHARE, Literal::Number(OpenParams::SHARE_WRITE)),
            ],
        },
        Entry {
            keyword: "NOSHARE",
            min_abbrev: 3,
            actions: &[
                Action::MustBeZero(SHARE),
                Action::Copy(SHARE, Literal::Number(OpenParams::SHARE_NONE)),
            ],
        },
        Entry {
            keyword: "AUTOSYNC",
            min_abbrev: 2,
            actions: &[Action::BitOr(OPTIONS, OpenParams::AUTOSYNC)],
        },
        Entry {
            keyword: "DELAY",
            min_abbrev: 2,
            actions: &[Action::Concat(IGNORED, "DELAY ")],
        },
    ],
    unknown: None,
};
