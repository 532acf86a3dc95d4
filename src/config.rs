use crate::comparison::DEFAULT_SELECTION_LIMIT;
use std::{env, path::PathBuf};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub selection_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            selection_limit: DEFAULT_SELECTION_LIMIT,
        }
    }
}

impl Config {
    /// Reads `PORT`, `DASHBOARD_DATA_DIR` and `DASHBOARD_SELECTION_LIMIT`.
    /// Unset or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let data_dir = lookup("DASHBOARD_DATA_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let selection_limit = lookup("DASHBOARD_SELECTION_LIMIT")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|limit| *limit >= 1)
            .unwrap_or(defaults.selection_limit);

        Self {
            port,
            data_dir,
            selection_limit,
        }
    }
}
