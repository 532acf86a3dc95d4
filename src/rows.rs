//! Typed views over uploaded sheet rows.
//!
//! Rows arrive as loosely typed key/value maps. Everything the aggregation
//! core reads goes through this module: a row without a usable `Station` is
//! dropped, any numeric field that does not parse becomes `None` and
//! contributes nothing.

use crate::models::RawRow;
use serde_json::Value;
use std::fmt;

pub const COL_STATION: &str = "Station";
pub const COL_PFLEGETAGE: &str = "Pflegetage";
pub const COL_VERWEILDAUER: &str = "VD.inkl.";

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticRow {
    pub station: String,
    pub pflegetage: Option<f64>,
    pub verweildauer: Option<f64>,
}

impl StatisticRow {
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        let station = text_field(row, COL_STATION)?;
        Some(Self {
            station,
            pflegetage: numeric_field(row, COL_PFLEGETAGE),
            verweildauer: numeric_field(row, COL_VERWEILDAUER),
        })
    }
}

/// Trimmed, non-empty text of a column. Numbers are accepted as their
/// decimal text since station codes are sometimes exported as numbers.
pub fn text_field(row: &RawRow, column: &str) -> Option<String> {
    let text = match row.get(column)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

pub fn numeric_field(row: &RawRow, column: &str) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parses `1234.5`, `1234,5`, `1.234,5` and `1,234.5`. When both separators
/// occur, the one that comes last is the decimal separator. A lone `.` is
/// always a decimal point.
pub fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = match (trimmed.rfind(','), trimmed.rfind('.')) {
        (Some(comma), Some(dot)) if dot > comma => trimmed.replace(',', ""),
        (Some(_), _) => trimmed.replace('.', "").replace(',', "."),
        (None, _) => trimmed.to_string(),
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Month tags
// ---------------------------------------------------------------------------

/// Month/year tag of an upload batch, `"MM"` or `"MM-YYYY"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthTag {
    pub month: u32,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthTagError {
    Empty,
    InvalidMonth(String),
    InvalidYear(String),
}

impl fmt::Display for MonthTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthTagError::Empty => write!(f, "month tag is empty"),
            MonthTagError::InvalidMonth(raw) => write!(f, "invalid month in tag: {raw}"),
            MonthTagError::InvalidYear(raw) => write!(f, "invalid year in tag: {raw}"),
        }
    }
}

impl std::error::Error for MonthTagError {}

impl MonthTag {
    pub fn parse(tag: &str) -> Result<Self, MonthTagError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(MonthTagError::Empty);
        }

        let (month_part, year_part) = match tag.split_once('-') {
            Some((month, year)) => (month.trim(), Some(year.trim())),
            None => (tag, None),
        };

        let month = month_part
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| MonthTagError::InvalidMonth(tag.to_string()))?;

        let year = match year_part {
            Some(raw) => Some(
                raw.parse::<i32>()
                    .ok()
                    .filter(|y| *y > 0)
                    .ok_or_else(|| MonthTagError::InvalidYear(tag.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { month, year })
    }

    /// Tags without a year belong to `current_year`; a January upload made
    /// in the following year cannot be told apart.
    pub fn year_or(&self, current_year: i32) -> i32 {
        self.year.unwrap_or(current_year)
    }
}
