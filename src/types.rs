use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One spreadsheet row as exported from the IDSO submission form.
///
/// Every field is optional text; coercion happens in
/// [`crate::aggregate::normalize_rows`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "AEROPORTO", alias = "aeroporto")]
    pub entity: Option<String>,
    #[serde(rename = "Indicador", alias = "INDICADOR", alias = "indicador")]
    pub indicator: Option<String>,
    #[serde(rename = "ANO", alias = "ano")]
    pub year: Option<String>,
    #[serde(rename = "MÊS", alias = "MES", alias = "mes")]
    pub month_name: Option<String>,
    #[serde(rename = "OrdemMes", alias = "ordem_mes")]
    pub month_ordinal: Option<String>,
    #[serde(rename = "Nº DE EVENTOS", alias = "EVENTOS", alias = "eventos")]
    pub events: Option<String>,
    #[serde(rename = "MOVIMENTAÇÃO (P + D)", alias = "MOVIMENTACAO", alias = "mov")]
    pub movements: Option<String>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct FactRow {
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Events")]
    #[tabled(rename = "Events")]
    pub events: u64,
    #[serde(rename = "Movements")]
    #[tabled(rename = "Movements")]
    pub movements: u64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyRow {
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Events")]
    #[tabled(rename = "Events")]
    pub events: u64,
    #[serde(rename = "Movements")]
    #[tabled(rename = "Movements")]
    pub movements: u64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ComplianceRow {
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "RequiredPeriod")]
    #[tabled(rename = "RequiredPeriod")]
    pub required_period: String,
    #[serde(rename = "LastPeriod")]
    #[tabled(rename = "LastPeriod")]
    pub last_period: String,
    #[serde(rename = "DueDate")]
    #[tabled(rename = "DueDate")]
    pub due_date: String,
    #[serde(rename = "DaysFromDue")]
    #[tabled(rename = "DaysFromDue")]
    pub days_from_due: i64,
    #[serde(rename = "MissingPeriods")]
    #[tabled(rename = "MissingPeriods")]
    pub missing_periods: u32,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GoalRow {
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Actual")]
    #[tabled(rename = "Actual")]
    pub actual: u64,
    #[serde(rename = "Target")]
    #[tabled(rename = "Target")]
    pub target: u64,
    #[serde(rename = "PctOfTarget")]
    #[tabled(rename = "PctOfTarget")]
    pub pct_of_target: String,
    #[serde(rename = "Band")]
    #[tabled(rename = "Band")]
    pub band: String,
    #[serde(rename = "Achieved")]
    #[tabled(rename = "Achieved")]
    pub achieved: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct YearTrendRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Events")]
    #[tabled(rename = "Events")]
    pub events: String,
    #[serde(rename = "EventsChange")]
    #[tabled(rename = "EventsChange")]
    pub events_change: String,
    #[serde(rename = "Movements")]
    #[tabled(rename = "Movements")]
    pub movements: String,
    #[serde(rename = "MovementsChange")]
    #[tabled(rename = "MovementsChange")]
    pub movements_change: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct IndicatorShareRow {
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Events")]
    #[tabled(rename = "Events")]
    pub events: String,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ComparisonRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ExportMetadata {
    pub generated_at_utc: String,
    pub today_local: String,
    pub source_name: String,
    pub hash_sha256: String,
    pub filters: FilterSnapshot,
    pub rule: RuleSnapshot,
    pub counts: CountSnapshot,
}

/// Resolved filter values; every dimension lists concrete members.
#[derive(Debug, Serialize)]
pub struct FilterSnapshot {
    pub entity: Vec<String>,
    pub year: Vec<i32>,
    pub indicator: Vec<String>,
    pub month: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RuleSnapshot {
    pub due_day: u32,
    pub required_period: i32,
    pub due_date: String,
}

#[derive(Debug, Serialize)]
pub struct CountSnapshot {
    pub facts_filtered: usize,
    pub events_filtered: u64,
    pub movements_filtered: u64,
}
