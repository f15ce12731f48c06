use std::path::PathBuf;

use thiserror::Error;

/// A (year, month) pair that cannot be encoded as a period.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid period {year}-{month}: month must be within 1..=12")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("year {year} is outside the encodable period range")]
    YearOutOfRange { year: i32 },
}

/// Failure to read the raw event source.
///
/// Malformed rows are not errors; they are counted and dropped during
/// normalization. Only an unreadable file or a broken CSV stream ends here.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read source {}: {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),

    #[error("malformed CSV in {}: {}", .0.display(), .1)]
    Csv(PathBuf, #[source] csv::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings {}: {}", .0.display(), .1)]
    ReadFailed(PathBuf, #[source] std::io::Error),

    #[error("failed to parse settings {}: {}", .0.display(), .1)]
    ParseFailed(PathBuf, #[source] toml::de::Error),

    #[error("invalid reference date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("io error writing {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("csv error writing {}: {}", .0.display(), .1)]
    Csv(PathBuf, #[source] csv::Error),

    #[error("json error writing {}: {}", .0.display(), .1)]
    Json(PathBuf, #[source] serde_json::Error),
}
