use crate::beds::BedMatchRules;
use crate::models::{BedRecord, StationGroup, UploadBatch};
use crate::session::Session;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::{error, warn};

pub const GROUPS_FILE: &str = "groups.json";
pub const BEDS_FILE: &str = "beds.json";
pub const UPLOADS_FILE: &str = "uploads.json";
pub const BED_RULES_FILE: &str = "bed_rules.json";

/// Everything read from the data directory at startup.
#[derive(Debug, Default)]
pub struct LoadedData {
    pub groups: Vec<StationGroup>,
    pub beds: Vec<BedRecord>,
    pub rules: BedMatchRules,
    pub uploads: Vec<UploadBatch>,
}

impl LoadedData {
    pub fn into_parts(self) -> (Session, Vec<UploadBatch>) {
        (Session::new(self.groups, self.beds, self.rules), self.uploads)
    }
}

pub async fn load_data(dir: &Path) -> LoadedData {
    LoadedData {
        groups: load_json(&dir.join(GROUPS_FILE)).await,
        beds: load_bed_records(&dir.join(BEDS_FILE)).await,
        rules: load_json(&dir.join(BED_RULES_FILE)).await,
        uploads: load_json(&dir.join(UPLOADS_FILE)).await,
    }
}

/// Bed records are read row by row: a row with a missing or non-numeric
/// field is skipped and the rest of the file is kept.
pub async fn load_bed_records(path: &Path) -> Vec<BedRecord> {
    let rows: Vec<serde_json::Value> = load_json(path).await;
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(path = %path.display(), index, "skipping bed record: {err}");
                None
            }
        })
        .collect()
}

/// Missing files give the default silently; unreadable or malformed files
/// are logged and also give the default.
pub async fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!(path = %path.display(), "failed to parse data file: {err}");
                T::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(err) => {
            error!(path = %path.display(), "failed to read data file: {err}");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("occupancy_storage_{tag}_{}_{nanos}", std::process::id()));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_directory_degrades_to_empty() {
        let data = load_data(Path::new("/nonexistent/occupancy/data")).await;
        assert!(data.groups.is_empty());
        assert!(data.beds.is_empty());
        assert!(data.uploads.is_empty());
        assert_eq!(data.rules, BedMatchRules::default());
    }

    #[tokio::test]
    async fn malformed_file_degrades_to_empty() {
        let dir = scratch_dir("malformed");
        std::fs::write(dir.join(GROUPS_FILE), b"{ not json").unwrap();
        std::fs::write(
            dir.join(BEDS_FILE),
            br#"[{ "Standort": "PRI", "Station": "2IM", "Jahr": 2025, "Bettenanzahl": 20 }]"#,
        )
        .unwrap();

        let data = load_data(&dir).await;
        assert!(data.groups.is_empty());
        assert_eq!(data.beds.len(), 1);

        let (session, uploads) = data.into_parts();
        assert!(session.groups.is_empty());
        assert_eq!(session.beds.len(), 1);
        assert!(uploads.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn bad_bed_row_does_not_drop_the_file() {
        let dir = scratch_dir("bed_rows");
        std::fs::write(
            dir.join(BEDS_FILE),
            br#"[
                { "Standort": "PRI", "Station": "2IM", "Jahr": 2025, "Bettenanzahl": 20 },
                { "Standort": "PRI", "Station": "3CH", "Jahr": 2025, "Bettenanzahl": null },
                "not a record",
                { "Standort": "PRI", "Station": "GHZ", "Jahr": "2025", "Bettenanzahl": 16.0 }
            ]"#,
        )
        .unwrap();

        let beds = load_bed_records(&dir.join(BEDS_FILE)).await;
        let stations: Vec<&str> = beds.iter().map(|r| r.station.as_str()).collect();
        assert_eq!(stations, vec!["2IM", "GHZ"]);
        assert_eq!(beds[1].bed_count, 16);

        std::fs::remove_dir_all(dir).ok();
    }
}
