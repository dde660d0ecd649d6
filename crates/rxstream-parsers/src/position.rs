//! POSITION / SEEK and QUERY POSITION option tables

use crate::table::{parse_number, Action, Entry, Literal, TokenTable};
use crate::tokenizer::Tokens;
use crate::traits::{OptionBlock, ParseError, ParseResult, Slot};

/// Where an offset is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// `=` from the start
    #[default]
    Absolute,
    /// `<` from the end
    FromEnd,
    /// `+` forward from the current cursor
    Forward,
    /// `-` backward from the current cursor
    Backward,
}

impl Direction {
    /// Command-string symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Direction::Absolute => "=",
            Direction::FromEnd => "<",
            Direction::Forward => "+",
            Direction::Backward => "-",
        }
    }
}

/// Which cursor a position command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Read,
    Write,
}

/// Unit of a position command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Char,
    Line,
}

/// Fields shared by the position blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionField {
    Direction,
    Target,
    Unit,
    Sys,
}

const DIR_ABSOLUTE: u32 = 1;
const DIR_FROM_END: u32 = 2;
const DIR_FORWARD: u32 = 3;
const DIR_BACKWARD: u32 = 4;

const TARGET_READ: u32 = 1;
const TARGET_WRITE: u32 = 2;

const UNIT_CHAR: u32 = 1;
const UNIT_LINE: u32 = 2;

fn target_of(value: u32) -> Option<Target> {
    match value {
        TARGET_READ => Some(Target::Read),
        TARGET_WRITE => Some(Target::Write),
        _ => None,
    }
}

fn unit_of(value: u32) -> Unit {
    if value == UNIT_LINE { Unit::Line } else { Unit::Char }
}

/// Parsed `POSITION`/`SEEK` operand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionParams {
    direction: u32,
    target: u32,
    unit: u32,
    offset: Option<u64>,
}

impl PositionParams {
    /// Parse `[=|<|+|-] offset [READ|WRITE] [CHAR|LINE]` in any order
    pub fn parse(input: &str) -> ParseResult<Self> {
        let mut params = Self::default();
        POSITION_TABLE.parse(input, &mut params)?;
        if params.offset.is_none() {
            return Err(ParseError::Missing { what: "position offset".to_string() });
        }
        Ok(params)
    }

    /// Build a position request directly
    pub fn new(direction: Direction, offset: u64, target: Option<Target>, unit: Unit) -> Self {
        let direction = match direction {
            Direction::Absolute => DIR_ABSOLUTE,
            Direction::FromEnd => DIR_FROM_END,
            Direction::Forward => DIR_FORWARD,
            Direction::Backward => DIR_BACKWARD,
        };
        let target = match target {
            Some(Target::Read) => TARGET_READ,
            Some(Target::Write) => TARGET_WRITE,
            None => 0,
        };
        let unit = match unit {
            Unit::Char => UNIT_CHAR,
            Unit::Line => UNIT_LINE,
        };
        Self { direction, target, unit, offset: Some(offset) }
    }

    pub fn direction(&self) -> Direction {
        match self.direction {
            DIR_FROM_END => Direction::FromEnd,
            DIR_FORWARD => Direction::Forward,
            DIR_BACKWARD => Direction::Backward,
            _ => Direction::Absolute,
        }
    }

    /// Explicit target; `None` means whatever the stream is open for
    pub fn target(&self) -> Option<Target> {
        target_of(self.target)
    }

    pub fn unit(&self) -> Unit {
        unit_of(self.unit)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

impl OptionBlock for PositionParams {
    type Field = PositionField;

    fn value(&self, field: PositionField) -> u32 {
        match field {
            PositionField::Direction => self.direction,
            PositionField::Target => self.target,
            PositionField::Unit => self.unit,
            PositionField::Sys => 0,
        }
    }

    fn set_value(&mut self, field: PositionField, value: u32) {
        match field {
            PositionField::Direction => self.direction = value,
            PositionField::Target => self.target = value,
            PositionField::Unit => self.unit = value,
            PositionField::Sys => {}
        }
    }
}

fn take_offset(params: &mut PositionParams, token: &str, _tokens: &mut Tokens<'_>) -> ParseResult<()> {
    let offset = parse_number(token).ok_or_else(|| ParseError::InvalidValue {
        option: "position".to_string(),
        value: token.to_string(),
    })?;
    if params.offset.is_some() {
        return Err(ParseError::Conflict { message: format!("second offset {token}") });
    }
    params.offset = Some(offset);
    Ok(())
}

const DIRECTION: Slot<PositionField> = Slot::byte(PositionField::Direction);
const TARGET: Slot<PositionField> = Slot::byte(PositionField::Target);
const UNIT: Slot<PositionField> = Slot::byte(PositionField::Unit);
const SYS: Slot<PositionField> = Slot::byte(PositionField::Sys);

static POSITION_TABLE: TokenTable<PositionParams> = TokenTable {
    entries: &[
        Entry {
            keyword: "=",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(DIRECTION), Action::Copy(DIRECTION, Literal::Number(DIR_ABSOLUTE))],
        },
        Entry {
            keyword: "<",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(DIRECTION), Action::Copy(DIRECTION, Literal::Number(DIR_FROM_END))],
        },
        Entry {
            keyword: "+",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(DIRECTION), Action::Copy(DIRECTION, Literal::Number(DIR_FORWARD))],
        },
        Entry {
            keyword: "-",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(DIRECTION), Action::Copy(DIRECTION, Literal::Number(DIR_BACKWARD))],
        },
        Entry {
            keyword: "READ",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(TARGET), Action::Copy(TARGET, Literal::Number(TARGET_READ))],
        },
        Entry {
            keyword: "WRITE",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(TARGET), Action::Copy(TARGET, Literal::Number(TARGET_WRITE))],
        },
        Entry {
            keyword: "CHAR",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(UNIT), Action::Copy(UNIT, Literal::Number(UNIT_CHAR))],
        },
        Entry {
            keyword: "LINE",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(UNIT), Action::Copy(UNIT, Literal::Number(UNIT_LINE))],
        },
    ],
    unknown: Some(take_offset),
};

/// Parsed `QUERY POSITION` operand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPositionParams {
    target: u32,
    unit: u32,
    sys: u32,
}

impl QueryPositionParams {
    /// Parse `[READ|WRITE] [CHAR|LINE] [SYS]`
    pub fn parse(input: &str) -> ParseResult<Self> {
        let mut params = Self::default();
        QUERY_POSITION_TABLE.parse(input, &mut params)?;
        Ok(params)
    }

    pub fn target(&self) -> Option<Target> {
        target_of(self.target)
    }

    pub fn unit(&self) -> Unit {
        unit_of(self.unit)
    }

    /// Report the OS-level, 0-based offset
    pub fn sys(&self) -> bool {
        self.sys != 0
    }
}

impl OptionBlock for QueryPositionParams {
    type Field = PositionField;

    fn value(&self, field: PositionField) -> u32 {
        match field {
            PositionField::Target => self.target,
            PositionField::Unit => self.unit,
            PositionField::Sys => self.sys,
            PositionField::Direction => 0,
        }
    }

    fn set_value(&mut self, field: PositionField, value: u32) {
        match field {
            PositionField::Target => self.target = value,
            PositionField::Unit => self.unit = value,
            PositionField::Sys => self.sys = value,
            PositionField::Direction => {}
        }
    }
}

static QUERY_POSITION_TABLE: TokenTable<QueryPositionParams> = TokenTable {
    entries: &[
        Entry {
            keyword: "READ",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(TARGET), Action::Copy(TARGET, Literal::Number(TARGET_READ))],
        },
        Entry {
            keyword: "WRITE",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(TARGET), Action::Copy(TARGET, Literal::Number(TARGET_WRITE))],
        },
        Entry {
            keyword: "CHAR",
            min_abbrev: 1,
            actions: &[Action::MustBeZero(UNIT), Action::Copy(UNIT, Literal::Number(UNIT_CHAR))],
        },
        Entry {
            keyword: "LINE",
            min_abbrev: 1,
            actions: &[
                Action::MustBeZero(UNIT),
                Action::MutualExclusion(SYS, 1),
                Action::Copy(UNIT, Literal::Number(UNIT_LINE)),
            ],
        },
        Entry {
            keyword: "SYS",
            min_abbrev: 1,
            actions: &[
                Action::MutualExclusion(UNIT, UNIT_LINE),
                Action::MustBeZero(SYS),
                Action::BitOr(SYS, 1),
            ],
        },
    ],
    unknown: None,
};
