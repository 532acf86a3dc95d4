//! Installed bed counts.
//!
//! Resolution runs a fixed cascade against the bed records of one site and
//! year: group-aware match, exact match, prefix match, numeric site code.
//! The first step that finds a record wins. No match means "unknown", which
//! callers count as zero beds; planned bed figures are never a substitute.

use crate::groups::normalize;
use crate::models::{BedRecord, StationGroup};
use serde::{Deserialize, Serialize};

/// Matching patterns for the heuristic steps of the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BedMatchRules {
    /// Group-aware step: a record whose label contains the group name matches.
    pub match_group_name: bool,
    /// Group-aware step: a record whose label contains the station's
    /// alphabetic prefix and one of these tokens matches.
    pub multi_unit_suffixes: Vec<String>,
    /// Sites whose stations are plain numeric codes.
    pub numeric_prefix_sites: Vec<String>,
}

impl Default for BedMatchRules {
    fn default() -> Self {
        Self {
            match_group_name: true,
            multi_unit_suffixes: vec!["S3".into(), "S4".into(), "S3/S4".into()],
            numeric_prefix_sites: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStep {
    Group,
    Exact,
    Prefix,
    NumericSite,
}

#[derive(Debug, Clone, Default)]
pub struct BedCountResolver {
    records: Vec<BedRecord>,
    rules: BedMatchRules,
}

impl BedCountResolver {
    pub fn new(records: Vec<BedRecord>, rules: BedMatchRules) -> Self {
        Self { records, rules }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rules(&self) -> &BedMatchRules {
        &self.rules
    }

    /// Bed count for `station` at `site` in `year`, `None` when nothing
    /// matches. `group` is the station's group, if it has one.
    pub fn resolve(
        &self,
        station: &str,
        site: &str,
        year: i32,
        group: Option<&StationGroup>,
    ) -> Option<u32> {
        self.resolve_record(station, site, year, group)
            .map(|(record, _)| record.bed_count)
    }

    /// Like [`resolve`](Self::resolve) but also reports the record and the
    /// step that matched.
    pub fn resolve_record(
        &self,
        station: &str,
        site: &str,
        year: i32,
        group: Option<&StationGroup>,
    ) -> Option<(&BedRecord, MatchStep)> {
        // Every step compares case-insensitively, so two spellings of one
        // station always resolve to the same record.
        let station = normalize(station).to_lowercase();
        if station.is_empty() {
            return None;
        }

        let site_key = normalize(site).to_lowercase();
        let candidates: Vec<&BedRecord> = self
            .records
            .iter()
            .filter(|r| r.year == year && normalize(&r.site).to_lowercase() == site_key)
            .filter(|r| !normalize(&r.station).is_empty())
            .collect();

        if let Some(group) = group {
            if let Some(record) = self.group_match(&candidates, &station, group) {
                return Some((record, MatchStep::Group));
            }
        }

        if let Some(record) = candidates
            .iter()
            .find(|r| normalize(&r.station).to_lowercase() == station)
            .copied()
        {
            return Some((record, MatchStep::Exact));
        }

        if let Some(record) = candidates.iter().find(|r| {
            let label = normalize(&r.station).to_lowercase();
            let first_token = label.split_whitespace().next().unwrap_or_default();
            label.starts_with(&station) || station.starts_with(first_token)
        }).copied() {
            return Some((record, MatchStep::Prefix));
        }

        if self.is_numeric_site(&site_key) {
            if let Some(record) = numeric_code_match(&candidates, &station) {
                return Some((record, MatchStep::NumericSite));
            }
        }

        None
    }

    fn group_match<'a>(
        &self,
        candidates: &[&'a BedRecord],
        station: &str,
        group: &StationGroup,
    ) -> Option<&'a BedRecord> {
        let group_name = normalize(&group.name).to_lowercase();
        let prefix = station
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .to_lowercase();
        let suffixes: Vec<String> = self
            .rules
            .multi_unit_suffixes
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        candidates
            .iter()
            .find(|r| {
                let label = r.station.to_lowercase();
                let by_name =
                    self.rules.match_group_name && !group_name.is_empty() && label.contains(&group_name);
                let by_suffix = !prefix.is_empty()
                    && label.contains(&prefix)
                    && suffixes.iter().any(|s| label.contains(s.as_str()));
                by_name || by_suffix
            })
            .copied()
    }

    fn is_numeric_site(&self, site_key: &str) -> bool {
        self.rules
            .numeric_prefix_sites
            .iter()
            .any(|s| normalize(s).to_lowercase() == site_key)
    }
}

/// Record whose label starts with the station's leading digits followed by a
/// space. Labels shaped like that are usually caught by the prefix step
/// already; this one stays last in the cascade as the site-specific rule.
fn numeric_code_match<'a>(candidates: &[&'a BedRecord], station: &str) -> Option<&'a BedRecord> {
    let digits: String = station.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let pattern = format!("{digits} ");
    candidates
        .iter()
        .find(|r| normalize(&r.station).starts_with(&pattern))
        .copied()
}
