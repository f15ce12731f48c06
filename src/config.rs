// Optional settings file (`idso.toml`).
//
// ```toml
// source = "idso.csv"
// output_dir = "out"
//
// [goals.SBJU]
// "F.O.D" = 7
// RELPREV = 15
// ```
//
// A missing `[goals]` section falls back to [`GoalTable::builtin`].

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::goals::GoalTable;

pub const DEFAULT_SETTINGS_FILE: &str = "idso.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub goals: Option<GoalTable>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: None,
            output_dir: PathBuf::from("."),
            goals: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.into(), e))?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(path.into(), e))?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load `explicit` if given, else `idso.toml` in the working directory
    /// when present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_SETTINGS_FILE);
        if fallback.is_file() {
            return Self::load(fallback);
        }
        Ok(Self::default())
    }

    pub fn goal_table(&self) -> &GoalTable {
        match &self.goals {
            Some(table) if !table.is_empty() => table,
            _ => GoalTable::builtin(),
        }
    }
}

pub fn parse_reference_date(s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(s.to_string()))
}
