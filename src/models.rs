use crate::rows::parse_number;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One uploaded sheet row, keyed by column name.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// Metric values for one month, keyed by metric name. `None` means "no data",
/// which is distinct from a measured zero.
pub type MonthMetrics = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRef {
    #[serde(rename = "stationName")]
    pub station_name: String,
    #[serde(rename = "standortName", default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationGroup {
    pub name: String,
    #[serde(rename = "mitglieder", alias = "members", default)]
    pub members: Vec<StationRef>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Installed ("aufgestellte") bed count of a station for one site and year.
///
/// Provider exports write `Jahr` and `Bettenanzahl` as integers, floats
/// (`16.0`) or text (`"2025"`, `"16"`); all of these are accepted as long as
/// the value is a whole number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedRecord {
    #[serde(rename = "IK", default, skip_serializing_if = "Option::is_none")]
    pub ik: Option<String>,
    #[serde(rename = "Standort")]
    pub site: String,
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Jahr", deserialize_with = "whole_i32")]
    pub year: i32,
    #[serde(rename = "Bettenanzahl", deserialize_with = "whole_u32")]
    pub bed_count: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Number(f64),
    Text(String),
}

fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Number(n) => Some(n),
        LooseNumber::Text(text) => parse_number(&text),
    };
    value
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .ok_or_else(|| serde::de::Error::custom("expected a whole number"))
}

fn whole_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = whole_number(deserializer)?;
    if value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(serde::de::Error::custom("year out of range"));
    }
    Ok(value as i32)
}

fn whole_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = whole_number(deserializer)?;
    if value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom("bed count out of range"));
    }
    Ok(value as u32)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetFile {
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(alias = "rows", default)]
    pub data: Vec<RawRow>,
}

/// One monthly upload: a month tag plus the sheets uploaded per site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadBatch {
    pub month: String,
    #[serde(rename = "locationsData", default)]
    pub locations_data: BTreeMap<String, Vec<SheetFile>>,
}

impl UploadBatch {
    /// Rows of every sheet uploaded for `site`. Site keys match after trimming,
    /// ignoring case.
    pub fn rows_for_site<'a>(&'a self, site: &'a str) -> impl Iterator<Item = &'a RawRow> + 'a {
        let wanted = site.trim().to_lowercase();
        self.locations_data
            .iter()
            .filter(move |(key, _)| key.trim().to_lowercase() == wanted)
            .flat_map(|(_, files)| files.iter())
            .flat_map(|file| file.data.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySiteAggregate {
    pub month: u32,
    pub pflegetage: f64,
    pub betten: u32,
    pub stationsauslastung: f64,
    pub verweildauer: f64,
    pub station_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StationMonthPoint {
    pub month: u32,
    pub pflegetage: f64,
    pub betten: u32,
    pub verweildauer: f64,
    pub stationsauslastung: f64,
    pub rows: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationMonthlySeries {
    pub station_name: String,
    pub monthly_data: Vec<StationMonthPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyReport {
    pub site: String,
    pub year: i32,
    pub months: Vec<MonthlySiteAggregate>,
    pub stations: Vec<StationMonthlySeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMonth {
    pub month: u32,
    pub metrics: MonthMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSeries {
    pub id: String,
    pub label: String,
    pub monthly_data: Vec<ComparisonMonth>,
}

#[derive(Debug, Serialize)]
pub struct SitesResponse {
    pub sites: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StationOptionsResponse {
    pub site: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub site: String,
    pub typ: String,
    pub months: Vec<Option<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadAccepted {
    pub month: u32,
    pub year: i32,
    pub batches: usize,
}
