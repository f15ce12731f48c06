use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::error::ExportError;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut wtr =
        csv::Writer::from_path(path).map_err(|e| ExportError::Csv(path.to_path_buf(), e))?;
    for r in rows {
        wtr.serialize(r)
            .map_err(|e| ExportError::Csv(path.to_path_buf(), e))?;
    }
    wtr.flush()
        .map_err(|e| ExportError::Io(path.to_path_buf(), e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let s = serde_json::to_string_pretty(value)
        .map_err(|e| ExportError::Json(path.to_path_buf(), e))?;
    std::fs::write(path, s).map_err(|e| ExportError::Io(path.to_path_buf(), e))?;
    Ok(())
}

/// Render the first `max_rows` rows as a markdown table.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    Some(Table::new(slice).with(Style::markdown()).to_string())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    match render_table(rows, max_rows) {
        Some(table_str) => println!("{}\n", table_str),
        None => println!("(no rows)\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GoalRow;

    fn row(entity: &str) -> GoalRow {
        GoalRow {
            entity: entity.to_string(),
            indicator: "F.O.D".into(),
            year: 2025,
            actual: 5,
            target: 7,
            pct_of_target: "71.4%".into(),
            band: "under 80%".into(),
            achieved: "YES".into(),
        }
    }

    #[test]
    fn csv_and_json_round_out_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("goals.csv");
        write_csv(&csv_path, &[row("SBJU")]).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("Entity,Indicator,Year,Actual,Target,PctOfTarget,Band,Achieved"));
        assert!(text.contains("SBJU,F.O.D,2025,5,7,71.4%,under 80%,YES"));

        let json_path = dir.path().join("row.json");
        write_json(&json_path, &serde_json::json!({"due_day": 10})).unwrap();
        assert!(std::fs::read_to_string(&json_path).unwrap().contains("\"due_day\": 10"));
    }

    #[test]
    fn render_limits_rows() {
        let rows = vec![row("SBJU"), row("SBCG"), row("SBSP")];
        let table = render_table(&rows, 2).unwrap();
        assert!(table.contains("SBJU"));
        assert!(table.contains("SBCG"));
        assert!(!table.contains("SBSP"));
        assert!(render_table::<GoalRow>(&[], 2).is_none());
    }

    #[test]
    fn write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("x.csv");
        assert!(matches!(write_csv(&path, &[row("A")]), Err(ExportError::Csv(..))));
    }
}
