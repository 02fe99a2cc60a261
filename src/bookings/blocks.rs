//! Global Blocks
//!
//! Administrative blackouts covering a single calendar date or a whole month.

use std::{fmt, str::FromStr};

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{bookings::models::Slot, uuids::TypedUuid};

/// Global Block UUID
pub type GlobalBlockUuid = TypedUuid<GlobalBlock>;

/// Errors raised while reading a block scope or value.
#[derive(Debug, Error)]
pub enum BlockParseError {
    /// Scope was neither `DATE` nor `MONTH`.
    #[error("unknown block scope: {0}")]
    UnknownScope(String),

    /// Value did not match the scope's format.
    #[error("invalid block value {value:?} for scope {scope}")]
    InvalidValue { scope: BlockScope, value: String },
}

/// Block Scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockScope {
    Date,
    Month,
}

impl fmt::Display for BlockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => f.write_str("DATE"),
            Self::Month => f.write_str("MONTH"),
        }
    }
}

impl FromStr for BlockScope {
    type Err = BlockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DATE" => Ok(Self::Date),
            "MONTH" => Ok(Self::Month),
            _ => Err(BlockParseError::UnknownScope(s.to_string())),
        }
    }
}

/// The period a block covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockedPeriod {
    /// A single calendar day (`YYYY-MM-DD`).
    Date(Date),

    /// Every day of a calendar month (`YYYY-MM`).
    Month { year: i16, month: i8 },
}

impl BlockedPeriod {
    /// The month containing `date`.
    #[must_use]
    pub fn month_of(date: Date) -> Self {
        Self::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a scope and its string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope is unknown or the value does not match it.
    pub fn parse(scope: &str, value: &str) -> Result<Self, BlockParseError> {
        let scope = scope.parse::<BlockScope>()?;
        let value = value.trim();

        let invalid = || BlockParseError::InvalidValue {
            scope,
            value: value.to_string(),
        };

        match scope {
            BlockScope::Date => {
                // Only accept the bare date form; jiff also parses datetimes.
                if value.len() != 10 {
                    return Err(invalid());
                }

                value.parse::<Date>().map(Self::Date).map_err(|_err| invalid())
            }
            BlockScope::Month => {
                let (year, month) = value.split_once('-').ok_or_else(invalid)?;

                let year = year.parse::<i16>().map_err(|_err| invalid())?;
                let month = month.parse::<i8>().map_err(|_err| invalid())?;

                Date::new(year, month, 1).map_err(|_err| invalid())?;

                Ok(Self::Month { year, month })
            }
        }
    }

    /// The scope of this period.
    #[must_use]
    pub const fn scope(&self) -> BlockScope {
        match self {
            Self::Date(_) => BlockScope::Date,
            Self::Month { .. } => BlockScope::Month,
        }
    }

    /// Whether `date` falls inside this period.
    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        match *self {
            Self::Date(blocked) => blocked == date,
            Self::Month { year, month } => date.year() == year && date.month() == month,
        }
    }
}

impl fmt::Display for BlockedPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{date}"),
            Self::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

/// Global Block Model
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalBlock {
    pub uuid: GlobalBlockUuid,
    pub period: BlockedPeriod,
    pub reason: Option<String>,
}

/// Why a slot is excluded from booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMatch {
    /// The slot's own blocked flag is set.
    Slot,

    /// A date block covers the slot's day.
    Date(GlobalBlockUuid),

    /// A month block covers the slot's month.
    Month(GlobalBlockUuid),
}

/// Lookup of active global blocks by date and month.
#[derive(Debug, Clone, Default)]
pub struct GlobalBlockFilter {
    dates: FxHashMap<Date, GlobalBlockUuid>,
    months: FxHashMap<(i16, i8), GlobalBlockUuid>,
}

impl GlobalBlockFilter {
    /// Index the given blocks. Duplicate periods collapse to the first block.
    pub fn new<'a>(blocks: impl IntoIterator<Item = &'a GlobalBlock>) -> Self {
        let mut filter = Self::default();

        for block in blocks {
            match block.period {
                BlockedPeriod::Date(date) => {
                    filter.dates.entry(date).or_insert(block.uuid);
                }
                BlockedPeriod::Month { year, month } => {
                    filter.months.entry((year, month)).or_insert(block.uuid);
                }
            }
        }

        filter
    }

    /// The block covering `date`, checking date blocks before month blocks.
    #[must_use]
    pub fn check_date(&self, date: Date) -> Option<BlockMatch> {
        if let Some(uuid) = self.dates.get(&date) {
            return Some(BlockMatch::Date(*uuid));
        }

        self.months
            .get(&(date.year(), date.month()))
            .map(|uuid| BlockMatch::Month(*uuid))
    }

    /// The reason `slot` cannot be booked, if any.
    #[must_use]
    pub fn check_slot(&self, slot: &Slot) -> Option<BlockMatch> {
        if slot.is_blocked {
            return Some(BlockMatch::Slot);
        }

        self.check_date(slot.starts_at.date())
    }

    /// Whether `date` is covered by any block.
    #[must_use]
    pub fn is_blocked(&self, date: Date) -> bool {
        self.check_date(date).is_some()
    }
}
