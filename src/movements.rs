//! Admissions and discharges.
//!
//! These sheets are pivoted: one row per site and movement type, one column
//! per German month name.

use crate::models::RawRow;
use crate::rows::{numeric_field, text_field};

/// Month columns, January first. Each entry lists accepted spellings.
const MONTH_COLUMNS: [&[&str]; 12] = [
    &["Januar"],
    &["Februar"],
    &["März", "Maerz", "Marz"],
    &["April"],
    &["Mai"],
    &["Juni"],
    &["Juli"],
    &["August"],
    &["September"],
    &["Oktober"],
    &["November"],
    &["Dezember"],
];

#[derive(Debug, Clone, PartialEq)]
pub struct MovementRow {
    pub site: String,
    pub typ: String,
    pub period: Option<String>,
    pub months: [Option<f64>; 12],
}

impl MovementRow {
    /// `None` unless the row names a site (`Standort`, else `Haus`) and a `Typ`.
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        let site = text_field(row, "Standort").or_else(|| text_field(row, "Haus"))?;
        let typ = text_field(row, "Typ")?;

        let mut months = [None; 12];
        for (slot, spellings) in months.iter_mut().zip(MONTH_COLUMNS) {
            *slot = spellings.iter().find_map(|column| numeric_field(row, column));
        }

        Some(Self {
            site,
            typ,
            period: text_field(row, "Zeitraum"),
            months,
        })
    }
}

/// Jan..Dec sums over the rows of `site` and `typ` (both compared ignoring
/// case). A month is `None` only if no matching row has a value for it.
pub fn movement_series(rows: &[MovementRow], site: &str, typ: &str) -> [Option<f64>; 12] {
    let site = site.trim().to_lowercase();
    let typ = typ.trim().to_lowercase();

    let mut series = [None; 12];
    for row in rows
        .iter()
        .filter(|r| r.site.to_lowercase() == site && r.typ.to_lowercase() == typ)
    {
        for (total, value) in series.iter_mut().zip(row.months) {
            if let Some(value) = value {
                *total = Some(total.unwrap_or(0.0) + value);
            }
        }
    }
    series
}
