// Headline figures for the filtered data: KPI counts, year-over-year
// comparison, per-indicator rankings and shares, the monthly base table and
// the side-by-side comparison of two entities.
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::PeriodFacts;
use crate::period::PeriodKey;
use crate::selection::{Selection, SelectionSet};

/// Entries shown per indicator ranking.
pub const RANKING_LIMIT: usize = 17;

/// Indicators listed in the share breakdown.
pub const SHARE_LIMIT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Kpis {
    pub entities: usize,
    pub indicators: usize,
    pub events: u64,
    pub movements: u64,
}

pub fn kpis(facts: &PeriodFacts) -> Kpis {
    let entities: BTreeSet<&str> = facts.iter().map(|f| f.entity.as_str()).collect();
    let indicators: BTreeSet<&str> = facts.iter().map(|f| f.indicator.as_str()).collect();
    Kpis {
        entities: entities.len(),
        indicators: indicators.len(),
        events: facts.total_events(),
        movements: facts.total_movements(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearValue {
    pub year: i32,
    pub value: u64,
    /// `value / previous - 1` against the preceding year present; `None` when
    /// there is no preceding year or it was zero.
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Events,
    Movements,
}

/// Yearly totals, most recent first, each compared to the year before it.
pub fn year_comparison(facts: &PeriodFacts, metric: Metric) -> Vec<YearValue> {
    let mut totals: BTreeMap<i32, u64> = BTreeMap::new();
    match metric {
        Metric::Events => {
            for f in facts {
                let t = totals.entry(f.year()).or_insert(0);
                *t = t.saturating_add(f.events);
            }
        }
        Metric::Movements => {
            for ((_, period), mov) in facts.movements_by_period() {
                let t = totals.entry(period.year()).or_insert(0);
                *t = t.saturating_add(mov);
            }
        }
    }

    let ascending: Vec<(i32, u64)> = totals.into_iter().collect();
    let mut out: Vec<YearValue> = ascending
        .iter()
        .enumerate()
        .map(|(i, &(year, value))| {
            let change = i
                .checked_sub(1)
                .map(|p| ascending[p].1)
                .filter(|prev| *prev != 0)
                .map(|prev| value as f64 / prev as f64 - 1.0);
            YearValue { year, value, change }
        })
        .collect();
    out.reverse();
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMode {
    /// Raw event count.
    Events,
    /// Events per 100 movements.
    Index,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub entity: String,
    pub events: u64,
    pub movements: u64,
    pub value: f64,
}

/// Entities ranked per indicator, highest value first, at most
/// [`RANKING_LIMIT`] each.
pub fn ranking(facts: &PeriodFacts, mode: RankMode) -> BTreeMap<String, Vec<RankEntry>> {
    // (indicator, entity) -> (events, movements summed over periods)
    let mut acc: BTreeMap<(&str, &str), (u64, u64)> = BTreeMap::new();
    for f in facts {
        let e = acc
            .entry((f.indicator.as_str(), f.entity.as_str()))
            .or_insert((0, 0));
        e.0 = e.0.saturating_add(f.events);
        e.1 = e.1.saturating_add(f.movements);
    }

    let mut out: BTreeMap<String, Vec<RankEntry>> = BTreeMap::new();
    for ((indicator, entity), (events, movements)) in acc {
        let value = match mode {
            RankMode::Events => events as f64,
            RankMode::Index if movements == 0 => 0.0,
            RankMode::Index => events as f64 * 100.0 / movements as f64,
        };
        out.entry(indicator.to_string()).or_default().push(RankEntry {
            entity: entity.to_string(),
            events,
            movements,
            value,
        });
    }
    for entries in out.values_mut() {
        entries.sort_by(|a, b| {
            b.value
                .total_cmp(&a.value)
                .then_with(|| a.entity.cmp(&b.entity))
        });
        entries.truncate(RANKING_LIMIT);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyTotal {
    pub entity: String,
    pub period: PeriodKey,
    pub events: u64,
    pub movements: u64,
}

/// Events summed and movements deduplicated per (entity, period).
pub fn monthly(facts: &PeriodFacts) -> Vec<MonthlyTotal> {
    let movements = facts.movements_by_period();
    let mut events: BTreeMap<(&str, PeriodKey), u64> = BTreeMap::new();
    for f in facts {
        let e = events.entry((f.entity.as_str(), f.period)).or_insert(0);
        *e = e.saturating_add(f.events);
    }
    events
        .into_iter()
        .map(|((entity, period), events)| MonthlyTotal {
            entity: entity.to_string(),
            period,
            events,
            movements: movements.get(&(entity, period)).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorShare {
    pub indicator: String,
    pub events: u64,
    /// Fraction of the events of the listed indicators, in `0.0..=1.0`.
    pub share: f64,
}

/// Events per indicator, largest first, limited to [`SHARE_LIMIT`] entries.
///
/// Shares are relative to the listed indicators only, so they always add up
/// to one when any event is present.
pub fn indicator_share(facts: &PeriodFacts) -> Vec<IndicatorShare> {
    let mut acc: BTreeMap<&str, u64> = BTreeMap::new();
    for f in facts {
        let e = acc.entry(f.indicator.as_str()).or_insert(0);
        *e = e.saturating_add(f.events);
    }
    let mut listed: Vec<(&str, u64)> = acc.into_iter().collect();
    listed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    listed.truncate(SHARE_LIMIT);

    let total = listed.iter().fold(0u64, |acc, (_, ev)| acc.saturating_add(*ev));
    listed
        .into_iter()
        .map(|(indicator, events)| IndicatorShare {
            indicator: indicator.to_string(),
            events,
            share: if total == 0 {
                0.0
            } else {
                events as f64 / total as f64
            },
        })
        .collect()
}

/// One calendar month of a two-entity comparison. Years in scope are pooled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthPair {
    pub month: u32,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityComparison {
    pub entity_a: String,
    pub entity_b: String,
    pub mode: RankMode,
    pub months: Vec<MonthPair>,
    pub total_a: f64,
    pub total_b: f64,
}

impl EntityComparison {
    /// `(A - B) / B`, or zero when B has nothing to compare against.
    pub fn relative_difference(&self) -> f64 {
        if self.total_b > 0.0 {
            (self.total_a - self.total_b) / self.total_b
        } else {
            0.0
        }
    }
}

/// Month-by-month comparison of two entities.
///
/// The year, month and indicator filters of `selection` apply; its entity
/// filter does not, since both entities are named explicitly. In
/// [`RankMode::Index`] each month's value is `events * 100 / movements`,
/// with movements deduplicated per (entity, period) before being pooled
/// across years. Totals are the sum of the monthly values.
pub fn compare_entities(
    facts: &PeriodFacts,
    selection: &Selection,
    entity_a: &str,
    entity_b: &str,
    mode: RankMode,
) -> EntityComparison {
    let scope = Selection {
        entities: SelectionSet::Explicit(vec![entity_a.to_string(), entity_b.to_string()]),
        ..selection.clone()
    };
    let scoped = facts.filter(&scope);

    // (entity, month) -> (events, movements) pooled over years
    let mut acc: BTreeMap<(&str, u32), (u64, u64)> = BTreeMap::new();
    for f in &scoped {
        let e = acc.entry((f.entity.as_str(), f.month())).or_insert((0, 0));
        e.0 = e.0.saturating_add(f.events);
    }
    for ((entity, period), mov) in scoped.movements_by_period() {
        let e = acc.entry((entity, period.month())).or_insert((0, 0));
        e.1 = e.1.saturating_add(mov);
    }

    let value = |entity: &str, month: u32| -> f64 {
        let Some(&(events, movements)) = acc.get(&(entity, month)) else {
            return 0.0;
        };
        match mode {
            RankMode::Events => events as f64,
            RankMode::Index if movements == 0 => 0.0,
            RankMode::Index => events as f64 * 100.0 / movements as f64,
        }
    };

    let months: BTreeSet<u32> = acc.keys().map(|(_, m)| *m).collect();
    let months: Vec<MonthPair> = months
        .into_iter()
        .map(|month| MonthPair {
            month,
            a: value(entity_a, month),
            b: value(entity_b, month),
        })
        .collect();

    EntityComparison {
        entity_a: entity_a.to_string(),
        entity_b: entity_b.to_string(),
        mode,
        total_a: months.iter().map(|m| m.a).sum(),
        total_b: months.iter().map(|m| m.b).sum(),
        months,
    }
}
