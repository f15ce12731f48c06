use std::path::Path;

use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::aggregate::{normalize_rows, EventRecord, NormalizeReport};
use crate::error::LoadError;
use crate::types::RawRow;

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    /// Rows the CSV reader could not deserialize at all.
    pub parse_errors: usize,
    pub normalize: NormalizeReport,
}

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub name: String,
    /// Lowercase hex SHA-256 of the raw file bytes.
    pub hash: String,
    pub records: Vec<EventRecord>,
    pub report: LoadReport,
}

pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn load_source(path: &Path) -> Result<LoadedSource, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Read(path.to_path_buf(), e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let source = load_bytes(&name, &bytes).map_err(|e| LoadError::Csv(path.to_path_buf(), e))?;
    info!(
        source = %source.name,
        rows = source.report.total_rows,
        kept = source.records.len(),
        hash = %&source.hash[..12],
        "loaded source"
    );
    Ok(source)
}

/// Parse CSV content already in memory. Semicolon-separated exports are
/// detected from the header line.
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<LoadedSource, csv::Error> {
    let hash = content_hash(bytes);
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .delimiter(detect_delimiter(bytes))
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    // Fail early if the header row itself is unreadable.
    rdr.headers()?;

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut rows: Vec<RawRow> = Vec::new();
    for result in rdr.deserialize::<RawRow>() {
        total_rows += 1;
        match result {
            Ok(r) => rows.push(r),
            Err(e) => {
                parse_errors += 1;
                warn!(row = total_rows, error = %e, "skipping unreadable row");
            }
        }
    }

    let (records, normalize) = normalize_rows(rows);
    Ok(LoadedSource {
        name: name.to_string(),
        hash,
        records,
        report: LoadReport {
            total_rows,
            parse_errors,
            normalize,
        },
    })
}

fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let semicolons = header.iter().filter(|b| **b == b';').count();
    let commas = header.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}
