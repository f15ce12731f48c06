// Turns engine results into flat, formatted rows for CSV export and console
// preview.
use chrono::{NaiveDate, Utc};

use crate::aggregate::PeriodFacts;
use crate::compliance::{ComplianceReport, SubmissionStatus};
use crate::goals::GoalStatus;
use crate::overview::{
    monthly, year_comparison, EntityComparison, IndicatorShare, Metric, RankEntry, RankMode,
};
use crate::period::DUE_DAY;
use crate::selection::{Selection, SelectionOptions};
use crate::types::{
    ComparisonRow, ComplianceRow, CountSnapshot, ExportMetadata, FactRow, FilterSnapshot, GoalRow,
    IndicatorShareRow, MonthlyRow, RankingRow, RuleSnapshot, YearTrendRow,
};
use crate::util::{format_change, format_int, format_number, month_abbrev};
use std::collections::BTreeMap;

pub fn fact_rows(facts: &PeriodFacts) -> Vec<FactRow> {
    facts
        .iter()
        .map(|f| FactRow {
            entity: f.entity.clone(),
            indicator: f.indicator.clone(),
            year: f.year(),
            month: month_abbrev(f.month()),
            events: f.events,
            movements: f.movements,
        })
        .collect()
}

pub fn monthly_rows(facts: &PeriodFacts) -> Vec<MonthlyRow> {
    let mut totals = monthly(facts);
    // by entity, then month, then year, so the same month lines up across years
    totals.sort_by(|a, b| {
        a.entity
            .cmp(&b.entity)
            .then_with(|| a.period.month().cmp(&b.period.month()))
            .then_with(|| a.period.year().cmp(&b.period.year()))
    });
    totals
        .into_iter()
        .map(|t| MonthlyRow {
            entity: t.entity,
            year: t.period.year(),
            month: month_abbrev(t.period.month()),
            events: t.events,
            movements: t.movements,
        })
        .collect()
}

pub fn compliance_row(s: &SubmissionStatus) -> ComplianceRow {
    let status = if s.is_ok {
        "OK".to_string()
    } else if s.is_stale() {
        "STALE DATA".to_string()
    } else if s.is_overdue {
        "OVERDUE".to_string()
    } else {
        "DUE SOON".to_string()
    };
    ComplianceRow {
        entity: s.entity.clone(),
        required_period: s.required_period.label(),
        last_period: s.last_period.label(),
        due_date: s.due_date.format("%d/%m/%Y").to_string(),
        days_from_due: s.days_from_due,
        missing_periods: s.missing_periods,
        status,
    }
}

/// All statuses, pending entities first, then by name.
pub fn compliance_rows(report: &ComplianceReport) -> Vec<ComplianceRow> {
    let mut statuses: Vec<&SubmissionStatus> = report.statuses.iter().collect();
    statuses.sort_by(|a, b| a.is_ok.cmp(&b.is_ok).then_with(|| a.entity.cmp(&b.entity)));
    statuses.into_iter().map(compliance_row).collect()
}

pub fn goal_rows(statuses: &[GoalStatus]) -> Vec<GoalRow> {
    statuses
        .iter()
        .map(|s| GoalRow {
            entity: s.scope.label().to_string(),
            indicator: s.indicator.clone(),
            year: s.year,
            actual: s.actual,
            target: s.target,
            pct_of_target: format!("{}%", format_number(s.percent(), 1)),
            band: s.band().map(|b| b.label()).unwrap_or("-").to_string(),
            achieved: if s.achieved { "YES" } else { "NO" }.to_string(),
        })
        .collect()
}

pub fn year_trend_rows(facts: &PeriodFacts) -> Vec<YearTrendRow> {
    let events = year_comparison(facts, Metric::Events);
    let movements = year_comparison(facts, Metric::Movements);
    let fmt_change = |c: Option<f64>| c.map(format_change).unwrap_or_else(|| "-".to_string());
    events
        .into_iter()
        .map(|ev| {
            let mv = movements.iter().find(|m| m.year == ev.year);
            YearTrendRow {
                year: ev.year,
                events: format_int(ev.value),
                events_change: fmt_change(ev.change),
                movements: format_int(mv.map(|m| m.value).unwrap_or(0)),
                movements_change: fmt_change(mv.and_then(|m| m.change)),
            }
        })
        .collect()
}

pub fn ranking_rows(ranking: &BTreeMap<String, Vec<RankEntry>>, decimals: usize) -> Vec<RankingRow> {
    ranking
        .iter()
        .flat_map(|(indicator, entries)| {
            entries.iter().enumerate().map(move |(idx, e)| RankingRow {
                indicator: indicator.clone(),
                rank: idx + 1,
                entity: e.entity.clone(),
                value: format_number(e.value, decimals),
            })
        })
        .collect()
}

pub fn indicator_share_rows(shares: &[IndicatorShare]) -> Vec<IndicatorShareRow> {
    shares
        .iter()
        .map(|s| IndicatorShareRow {
            indicator: s.indicator.clone(),
            events: format_int(s.events),
            share: format!("{}%", format_number(s.share * 100.0, 1)),
        })
        .collect()
}

/// Long-format comparison: one row per month and entity, then one `Total`
/// row per entity.
pub fn comparison_rows(cmp: &EntityComparison) -> Vec<ComparisonRow> {
    let decimals = match cmp.mode {
        RankMode::Events => 0,
        RankMode::Index => 3,
    };
    let row = |month: String, entity: &str, value: f64| ComparisonRow {
        month,
        entity: entity.to_string(),
        value: format_number(value, decimals),
    };
    let mut rows = Vec::with_capacity(cmp.months.len() * 2 + 2);
    for m in &cmp.months {
        rows.push(row(month_abbrev(m.month), &cmp.entity_a, m.a));
        rows.push(row(month_abbrev(m.month), &cmp.entity_b, m.b));
    }
    rows.push(row("Total".to_string(), &cmp.entity_a, cmp.total_a));
    rows.push(row("Total".to_string(), &cmp.entity_b, cmp.total_b));
    rows
}

pub fn export_metadata(
    source_name: &str,
    hash: &str,
    today: NaiveDate,
    selection: &Selection,
    options: &SelectionOptions,
    compliance: &ComplianceReport,
    filtered: &PeriodFacts,
) -> ExportMetadata {
    ExportMetadata {
        generated_at_utc: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        today_local: today.to_string(),
        source_name: source_name.to_string(),
        hash_sha256: hash.to_string(),
        filters: FilterSnapshot {
            entity: selection.entities.resolve(&options.entities),
            year: selection.years.resolve(&options.years),
            indicator: selection.indicators.resolve(&options.indicators),
            month: selection
                .months
                .resolve(&options.months)
                .into_iter()
                .map(month_abbrev)
                .collect(),
        },
        rule: RuleSnapshot {
            due_day: DUE_DAY,
            required_period: compliance.required_period.value(),
            due_date: compliance.due_date.to_string(),
        },
        counts: CountSnapshot {
            facts_filtered: filtered.len(),
            events_filtered: filtered.total_events(),
            movements_filtered: filtered.total_movements(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, EventRecord};
    use crate::compliance::evaluate_compliance;
    use crate::overview::{compare_entities, indicator_share};
    use crate::period::PeriodKey;
    use crate::selection::{Choice, SelectionSet};

    fn facts() -> PeriodFacts {
        let rec = |e: &str, y, m, ev| EventRecord {
            entity: e.to_string(),
            indicator: "F.O.D".into(),
            period: PeriodKey::encode(y, m).unwrap(),
            events: ev,
            movements: 100,
        };
        aggregate(&[rec("SBJU", 2025, 2, 1), rec("SBCG", 2024, 11, 2), rec("SBCG", 2023, 1, 5)])
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn compliance_rows_put_pending_first() {
        let report = evaluate_compliance(&facts(), date(2025, 3, 15));
        let rows = compliance_rows(&report);
        assert_eq!(rows[0].entity, "SBCG");
        assert_eq!(rows[0].status, "OVERDUE");
        assert_eq!(rows[0].required_period, "Fev/2025");
        assert_eq!(rows[0].last_period, "Nov/2024");
        assert_eq!(rows[0].due_date, "10/03/2025");
        assert_eq!(rows[1].status, "OK");
    }

    #[test]
    fn year_trend_formats_changes() {
        let rows = year_trend_rows(&facts());
        assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2025, 2024, 2023]);
        assert_eq!(rows[0].events_change, "-50%");
        assert_eq!(rows[1].events_change, "-60%");
        assert_eq!(rows[2].events_change, "-");
    }

    #[test]
    fn share_rows_format_percentages() {
        let rows = indicator_share_rows(&indicator_share(&facts()));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].indicator, "F.O.D");
        assert_eq!(rows[0].events, "8");
        assert_eq!(rows[0].share, "100.0%");
    }

    #[test]
    fn comparison_rows_pair_months_then_totals() {
        let f = facts();
        let cmp = compare_entities(&f, &Selection::default(), "SBCG", "SBJU", RankMode::Index);
        let rows = comparison_rows(&cmp);
        let cells: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|r| (r.month.as_str(), r.entity.as_str(), r.value.as_str()))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("Jan", "SBCG", "5.000"),
                ("Jan", "SBJU", "0.000"),
                ("Fev", "SBCG", "0.000"),
                ("Fev", "SBJU", "1.000"),
                ("Nov", "SBCG", "2.000"),
                ("Nov", "SBJU", "0.000"),
                ("Total", "SBCG", "7.000"),
                ("Total", "SBJU", "1.000"),
            ]
        );
        assert!((cmp.relative_difference() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn metadata_resolves_filters() {
        let f = facts();
        let opts = f.options();
        let mut sel = Selection::default();
        sel.set_years(&[Choice::Value(2024)], &opts);
        let report = evaluate_compliance(&f, date(2025, 3, 15));
        let filtered = f.filter(&sel);
        let meta = export_metadata("idso.csv", "ff", date(2025, 3, 15), &sel, &opts, &report, &filtered);
        assert_eq!(meta.filters.year, vec![2024]);
        assert_eq!(meta.filters.entity, vec!["SBCG", "SBJU"]);
        assert_eq!(meta.rule.required_period, 202502);
        assert_eq!(meta.rule.due_day, 10);
        assert_eq!(meta.counts.facts_filtered, 1);
        assert_eq!(meta.counts.events_filtered, 2);
        assert!(matches!(sel.years, SelectionSet::Explicit(_)));
    }
}
