//! Station group registry.
//!
//! Several physical station codes can be merged administratively into one
//! group that shares a bed-accounting record. The resolver answers which
//! group a station belongs to and reshapes station lists for selection UIs.
//! It is built once from the loaded group definitions and never mutated.

use crate::models::StationGroup;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Canonical form used for lookups. Idempotent.
pub fn normalize(name: &str) -> String {
    name.trim().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct StationGroupResolver {
    groups: Vec<StationGroup>,
    /// Raw and normalized member name -> index into `groups`.
    station_to_group: BTreeMap<String, usize>,
    /// Group name -> index into `groups`.
    by_name: HashMap<String, usize>,
}

impl StationGroupResolver {
    /// A resolver that knows no groups; every station is ungrouped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Indexes the active groups. When a station is listed in several
    /// groups, the group loaded last wins.
    pub fn from_groups(groups: Vec<StationGroup>) -> Self {
        let mut resolver = Self::default();
        for group in groups.into_iter().filter(|g| g.active) {
            let index = resolver.groups.len();
            for member in &group.members {
                resolver
                    .station_to_group
                    .insert(member.station_name.clone(), index);
                resolver
                    .station_to_group
                    .insert(normalize(&member.station_name), index);
            }
            resolver.by_name.insert(group.name.clone(), index);
            resolver.groups.push(group);
        }
        resolver
    }

    pub fn groups(&self) -> &[StationGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Exact raw name, then exact normalized name, then a case-insensitive
    /// scan over every known member key.
    pub fn group_for_station(&self, name: &str) -> Option<&StationGroup> {
        if let Some(&index) = self.station_to_group.get(name) {
            return self.groups.get(index);
        }

        let normalized = normalize(name);
        if let Some(&index) = self.station_to_group.get(&normalized) {
            return self.groups.get(index);
        }

        let folded = normalized.to_lowercase();
        self.station_to_group
            .iter()
            .find(|(key, _)| normalize(key).to_lowercase() == folded)
            .and_then(|(_, &index)| self.groups.get(index))
    }

    /// Original member names recorded for `group_name`.
    pub fn stations_in_group(&self, group_name: &str) -> Vec<String> {
        self.by_name
            .get(group_name)
            .and_then(|&index| self.groups.get(index))
            .map(|group| {
                group
                    .members
                    .iter()
                    .map(|m| m.station_name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_group_name(&self, token: &str) -> bool {
        self.by_name.contains_key(token)
    }

    /// Sorted, deduplicated selection options: grouped stations collapse into
    /// their group name, ungrouped stations are listed as they are.
    pub fn station_options<S: AsRef<str>>(&self, all_stations: &[S]) -> Vec<String> {
        let mut options = BTreeSet::new();
        let mut accounted = BTreeSet::new();

        for station in all_stations {
            if let Some(group) = self.group_for_station(station.as_ref()) {
                options.insert(group.name.clone());
                for member in &group.members {
                    accounted.insert(member.station_name.clone());
                    accounted.insert(normalize(&member.station_name));
                }
            }
        }

        for station in all_stations {
            let station = station.as_ref();
            if accounted.contains(station) || accounted.contains(&normalize(station)) {
                continue;
            }
            if self.group_for_station(station).is_none() {
                options.insert(station.to_string());
            }
        }

        options.into_iter().collect()
    }

    /// Expands a selection token into the station names it stands for.
    pub fn station_names_for_selection(&self, token: &str) -> Vec<String> {
        if self.is_group_name(token) {
            return self.stations_in_group(token);
        }

        match self.group_for_station(token) {
            Some(group) => {
                let folded = normalize(token).to_lowercase();
                let canonical = group
                    .members
                    .iter()
                    .find(|m| normalize(&m.station_name).to_lowercase() == folded)
                    .map(|m| m.station_name.clone())
                    .unwrap_or_else(|| token.to_string());
                vec![canonical]
            }
            None => vec![token.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StationRef;

    fn group(name: &str, members: &[&str]) -> StationGroup {
        StationGroup {
            name: name.to_string(),
            members: members
                .iter()
                .map(|m| StationRef {
                    station_name: m.to_string(),
                    site_name: None,
                })
                .collect(),
            active: true,
        }
    }

    fn resolver() -> StationGroupResolver {
        StationGroupResolver::from_groups(vec![
            group("PRNGHZ Station S3/S4 GHZ", &["PRNGHZS3", "PRNGHZS4"]),
            group("Intensiv", &["ITS1 ", "ITS2"]),
        ])
    }

    #[test]
    fn normalize_is_idempotent_and_trims() {
        for input in ["  X ", "X", "\tA B\n", ""] {
            assert_eq!(normalize(&normalize(input)), normalize(input));
        }
        assert_eq!(normalize(" X "), normalize("X"));
    }

    #[test]
    fn lookup_tiers() {
        let resolver = resolver();
        let name = |s: &str| resolver.group_for_station(s).map(|g| g.name.clone());

        assert_eq!(name("PRNGHZS3").as_deref(), Some("PRNGHZ Station S3/S4 GHZ"));
        assert_eq!(name("  PRNGHZS4 ").as_deref(), Some("PRNGHZ Station S3/S4 GHZ"));
        assert_eq!(name("prnghzs4").as_deref(), Some("PRNGHZ Station S3/S4 GHZ"));
        assert_eq!(name("ITS1").as_deref(), Some("Intensiv"));
        assert_eq!(name("its1 ").as_deref(), Some("Intensiv"));
        assert_eq!(name("2IM"), None);
    }

    #[test]
    fn inactive_groups_are_ignored() {
        let mut inactive = group("Alt", &["OLD1"]);
        inactive.active = false;
        let resolver = StationGroupResolver::from_groups(vec![inactive]);
        assert!(resolver.is_empty());
        assert!(resolver.group_for_station("OLD1").is_none());
        assert!(!resolver.is_group_name("Alt"));
    }

    #[test]
    fn last_loaded_group_wins() {
        let resolver = StationGroupResolver::from_groups(vec![
            group("First", &["S1"]),
            group("Second", &["S1"]),
        ]);
        assert_eq!(resolver.group_for_station("S1").unwrap().name, "Second");
    }

    #[test]
    fn empty_resolver_never_fails() {
        let resolver = StationGroupResolver::empty();
        assert!(resolver.group_for_station("ANY").is_none());
        assert!(resolver.stations_in_group("ANY").is_empty());
        assert_eq!(resolver.station_options(&["B", "A", "B"]), vec!["A", "B"]);
        assert_eq!(resolver.station_names_for_selection("A"), vec!["A"]);
    }

    #[test]
    fn stations_in_group_keeps_original_names() {
        let resolver = resolver();
        assert_eq!(resolver.stations_in_group("Intensiv"), vec!["ITS1 ", "ITS2"]);
        assert!(resolver.stations_in_group("Unknown").is_empty());
    }

    #[test]
    fn options_collapse_groups_once() {
        let resolver = resolver();
        let all = ["PRNGHZS3", "2IM", "PRNGHZS4", "ITS1", "1CH", "2IM"];
        let options = resolver.station_options(&all);

        assert_eq!(
            options,
            vec!["1CH", "2IM", "Intensiv", "PRNGHZ Station S3/S4 GHZ"]
        );
        for member in ["PRNGHZS3", "PRNGHZS4", "ITS1"] {
            assert!(!options.iter().any(|o| o == member));
        }
    }

    #[test]
    fn selection_expands_groups_and_canonicalizes_members() {
        let resolver = resolver();
        assert_eq!(
            resolver.station_names_for_selection("PRNGHZ Station S3/S4 GHZ"),
            vec!["PRNGHZS3", "PRNGHZS4"]
        );
        assert_eq!(resolver.station_names_for_selection("prnghzs3"), vec!["PRNGHZS3"]);
        assert_eq!(resolver.station_names_for_selection("ITS1"), vec!["ITS1 "]);
        assert_eq!(resolver.station_names_for_selection("2IM"), vec!["2IM"]);
    }
}
