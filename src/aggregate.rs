// Raw rows to deduplicated per-period facts, plus the hash-keyed cache
// that lets an unchanged source skip re-aggregation.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::error::PeriodError;
use crate::period::PeriodKey;
use crate::selection::{Selection, SelectionOptions};
use crate::types::RawRow;
use crate::util::{month_from_name, parse_count_safe, parse_i32_safe};

/// A normalized input row. Only rows whose period resolved are represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub entity: String,
    pub indicator: String,
    pub period: PeriodKey,
    pub events: u64,
    pub movements: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub unresolved_month: usize,
    pub unresolved_year: usize,
}

/// Turn raw spreadsheet rows into event records.
///
/// Rows whose month resolves neither from the ordinal column nor from the
/// month name are dropped, as are rows without a numeric year. Counts that do
/// not parse become zero. Nothing here is fatal.
pub fn normalize_rows<I>(rows: I) -> (Vec<EventRecord>, NormalizeReport)
where
    I: IntoIterator<Item = RawRow>,
{
    let mut report = NormalizeReport::default();
    let mut records = Vec::new();

    for row in rows {
        report.total_rows += 1;
        let Some(month) = resolve_month(&row) else {
            report.unresolved_month += 1;
            continue;
        };
        let Some(year) = parse_i32_safe(row.year.as_deref()) else {
            report.unresolved_year += 1;
            continue;
        };
        let period = match PeriodKey::encode(year, month) {
            Ok(period) => period,
            Err(PeriodError::YearOutOfRange { .. }) => {
                report.unresolved_year += 1;
                continue;
            }
            Err(PeriodError::InvalidPeriod { .. }) => {
                report.unresolved_month += 1;
                continue;
            }
        };

        records.push(EventRecord {
            entity: row.entity.as_deref().unwrap_or("").trim().to_uppercase(),
            indicator: row.indicator.as_deref().unwrap_or("").trim().to_string(),
            period,
            events: parse_count_safe(row.events.as_deref()),
            movements: parse_count_safe(row.movements.as_deref()),
        });
    }

    report.kept_rows = records.len();
    debug!(
        total = report.total_rows,
        kept = report.kept_rows,
        unresolved_month = report.unresolved_month,
        unresolved_year = report.unresolved_year,
        "normalized raw rows"
    );
    (records, report)
}

fn resolve_month(row: &RawRow) -> Option<u32> {
    // The ordinal column wins when it holds a usable value.
    let ordinal = parse_i32_safe(row.month_ordinal.as_deref())
        .filter(|m| (1..=12).contains(m))
        .map(|m| m as u32);
    ordinal.or_else(|| row.month_name.as_deref().and_then(month_from_name))
}

/// Events and movements for one (entity, indicator, period).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodFact {
    pub entity: String,
    pub indicator: String,
    pub period: PeriodKey,
    /// Sum of event counts.
    pub events: u64,
    /// Representative movement count (max over the contributing rows).
    pub movements: u64,
}

impl PeriodFact {
    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }
}

/// Deduplicated facts, ordered by entity, indicator, then period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodFacts {
    facts: Vec<PeriodFact>,
}

pub fn aggregate(records: &[EventRecord]) -> PeriodFacts {
    let mut groups: BTreeMap<(&str, &str, PeriodKey), (u64, u64)> = BTreeMap::new();
    for r in records {
        let e = groups
            .entry((r.entity.as_str(), r.indicator.as_str(), r.period))
            .or_insert((0, 0));
        e.0 = e.0.saturating_add(r.events);
        e.1 = e.1.max(r.movements);
    }

    let facts: Vec<PeriodFact> = groups
        .into_iter()
        .map(|((entity, indicator, period), (events, movements))| PeriodFact {
            entity: entity.to_string(),
            indicator: indicator.to_string(),
            period,
            events,
            movements,
        })
        .collect();
    debug!(records = records.len(), facts = facts.len(), "aggregated facts");
    PeriodFacts { facts }
}

impl PeriodFacts {
    pub fn iter(&self) -> std::slice::Iter<'_, PeriodFact> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// One synthetic record per fact. Aggregating these reproduces `self`.
    pub fn to_records(&self) -> Vec<EventRecord> {
        self.facts
            .iter()
            .map(|f| EventRecord {
                entity: f.entity.clone(),
                indicator: f.indicator.clone(),
                period: f.period,
                events: f.events,
                movements: f.movements,
            })
            .collect()
    }

    pub fn filter(&self, selection: &Selection) -> PeriodFacts {
        PeriodFacts {
            facts: self
                .facts
                .iter()
                .filter(|f| selection.admits(f))
                .cloned()
                .collect(),
        }
    }

    /// Everything currently present in the data, in canonical order.
    pub fn options(&self) -> SelectionOptions {
        let mut entities = BTreeSet::new();
        let mut years = BTreeSet::new();
        let mut months = BTreeSet::new();
        let mut indicators = BTreeSet::new();
        for f in &self.facts {
            entities.insert(f.entity.clone());
            years.insert(f.year());
            months.insert(f.month());
            indicators.insert(f.indicator.clone());
        }
        SelectionOptions {
            entities: entities.into_iter().collect(),
            years: years.into_iter().rev().collect(),
            months: months.into_iter().collect(),
            indicators: indicators.into_iter().collect(),
        }
    }

    pub fn total_events(&self) -> u64 {
        self.facts.iter().map(|f| f.events).fold(0, u64::saturating_add)
    }

    /// Movements per (entity, period), deduplicated across indicators.
    ///
    /// Movement is reported once per entity and month but repeated on every
    /// indicator row, so the representative value is taken before any sum.
    pub fn movements_by_period(&self) -> BTreeMap<(&str, PeriodKey), u64> {
        let mut out: BTreeMap<(&str, PeriodKey), u64> = BTreeMap::new();
        for f in &self.facts {
            let e = out.entry((f.entity.as_str(), f.period)).or_insert(0);
            *e = (*e).max(f.movements);
        }
        out
    }

    pub fn total_movements(&self) -> u64 {
        self.movements_by_period()
            .values()
            .fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

impl<'a> IntoIterator for &'a PeriodFacts {
    type Item = &'a PeriodFact;
    type IntoIter = std::slice::Iter<'a, PeriodFact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}

/// Aggregation results memoized by the content hash of their raw source, so
/// reloading an unchanged file skips normalization and grouping.
#[derive(Debug, Default)]
pub struct FactCache {
    entries: HashMap<String, PeriodFacts>,
}

impl FactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Option<&PeriodFacts> {
        self.entries.get(hash)
    }

    pub fn get_or_aggregate<F>(&mut self, hash: &str, records: F) -> &PeriodFacts
    where
        F: FnOnce() -> Vec<EventRecord>,
    {
        self.entries.entry(hash.to_string()).or_insert_with(|| {
            debug!(hash, "fact cache miss");
            aggregate(&records())
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
