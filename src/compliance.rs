// Monthly submission compliance.
//
// Every entity must have reported the previous calendar month by the 10th
// of the current one. Evaluation always runs over the full fact history;
// filters only decide which statuses are shown.
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::aggregate::PeriodFacts;
use crate::period::{add_months, due_date, required_period, PeriodKey};
use crate::selection::SelectionSet;

/// Upper bound on the missing-period count. Hitting it means the data is
/// stale or corrupt, not that an entity is literally five years behind.
pub const MISSING_PERIOD_CAP: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionStatus {
    pub entity: String,
    pub required_period: PeriodKey,
    pub last_period: PeriodKey,
    pub due_date: NaiveDate,
    /// Negative before the deadline, zero or positive on/after it.
    pub days_from_due: i64,
    pub is_overdue: bool,
    pub is_ok: bool,
    pub missing_periods: u32,
}

impl SubmissionStatus {
    /// The missing-period count hit the cap and should not be trusted.
    pub fn is_stale(&self) -> bool {
        self.missing_periods >= MISSING_PERIOD_CAP
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    /// One status per entity that has at least one fact, by entity name.
    pub statuses: Vec<SubmissionStatus>,
    pub required_period: PeriodKey,
    pub due_date: NaiveDate,
}

impl ComplianceReport {
    /// Entities behind schedule within `entities`, most periods missing
    /// first, then by name.
    pub fn pending(&self, entities: &SelectionSet<String>) -> Vec<&SubmissionStatus> {
        let mut out: Vec<&SubmissionStatus> = self
            .statuses
            .iter()
            .filter(|s| !s.is_ok && entities.contains(&s.entity))
            .collect();
        out.sort_by(|a, b| {
            b.missing_periods
                .cmp(&a.missing_periods)
                .then_with(|| a.entity.cmp(&b.entity))
        });
        out
    }
}

/// Evaluate every entity present in `facts` against the deadline in force
/// on `today`.
///
/// Entities with no facts at all get no status: never having submitted is a
/// different condition from being behind, and the caller decides how to
/// surface it.
pub fn evaluate_compliance(facts: &PeriodFacts, today: NaiveDate) -> ComplianceReport {
    let required = required_period(today);
    let due = due_date(today);
    let days_from_due = (today - due).num_days();
    let is_overdue = today > due;

    let mut last_by_entity: BTreeMap<&str, PeriodKey> = BTreeMap::new();
    for f in facts {
        let e = last_by_entity.entry(f.entity.as_str()).or_insert(f.period);
        *e = (*e).max(f.period);
    }

    let statuses = last_by_entity
        .into_iter()
        .map(|(entity, last)| {
            let is_ok = last >= required;
            let missing_periods = if is_ok { 0 } else { count_missing(last, required) };
            if missing_periods >= MISSING_PERIOD_CAP {
                warn!(
                    entity,
                    last = %last,
                    required = %required,
                    "missing-period count capped; data is likely stale"
                );
            }
            SubmissionStatus {
                entity: entity.to_string(),
                required_period: required,
                last_period: last,
                due_date: due,
                days_from_due,
                is_overdue,
                is_ok,
                missing_periods,
            }
        })
        .collect();

    ComplianceReport {
        statuses,
        required_period: required,
        due_date: due,
    }
}

// Step month by month from `last` until `required`, never more than the cap.
fn count_missing(last: PeriodKey, required: PeriodKey) -> u32 {
    let (mut y, mut m) = last.decode();
    let mut steps = 0;
    while steps < MISSING_PERIOD_CAP {
        match PeriodKey::encode(y, m) {
            Ok(current) if current < required => {}
            _ => break,
        }
        let Some(next) = add_months(y, m, 1) else {
            break;
        };
        (y, m) = next;
        steps += 1;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, EventRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn facts(rows: &[(&str, i32, u32)]) -> PeriodFacts {
        let records: Vec<EventRecord> = rows
            .iter()
            .map(|(e, y, m)| EventRecord {
                entity: e.to_string(),
                indicator: "F.O.D".into(),
                period: PeriodKey::encode(*y, *m).unwrap(),
                events: 1,
                movements: 10,
            })
            .collect();
        aggregate(&records)
    }

    fn status<'a>(report: &'a ComplianceReport, entity: &str) -> &'a SubmissionStatus {
        report.statuses.iter().find(|s| s.entity == entity).unwrap()
    }

    #[test]
    fn behind_entity_counts_missing_months() {
        let report = evaluate_compliance(
            &facts(&[("SBJU", 2024, 10), ("SBJU", 2024, 11)]),
            date(2025, 3, 15),
        );
        assert_eq!(report.required_period.decode(), (2025, 2));
        assert_eq!(report.due_date, date(2025, 3, 10));

        let s = status(&report, "SBJU");
        assert!(!s.is_ok);
        assert_eq!(s.last_period.decode(), (2024, 11));
        assert_eq!(s.missing_periods, 3);
        assert!(s.is_overdue);
        assert_eq!(s.days_from_due, 5);
        assert!(!s.is_stale());
    }

    #[test]
    fn up_to_date_entity() {
        let report = evaluate_compliance(&facts(&[("SBCG", 2025, 2)]), date(2025, 3, 4));
        let s = status(&report, "SBCG");
        assert!(s.is_ok);
        assert_eq!(s.missing_periods, 0);
        assert!(!s.is_overdue);
        assert_eq!(s.days_from_due, -6);
    }

    #[test]
    fn due_day_itself_is_not_overdue() {
        let report = evaluate_compliance(&facts(&[("SBCG", 2025, 1)]), date(2025, 3, 10));
        let s = status(&report, "SBCG");
        assert!(!s.is_overdue);
        assert_eq!(s.days_from_due, 0);
        assert_eq!(s.missing_periods, 1);
    }

    #[test]
    fn future_dated_rows_count_as_ok() {
        let report = evaluate_compliance(&facts(&[("SBSP", 2026, 7)]), date(2025, 3, 15));
        let s = status(&report, "SBSP");
        assert!(s.is_ok);
        assert_eq!(s.missing_periods, 0);
    }

    #[test]
    fn january_requires_previous_december() {
        let report = evaluate_compliance(&facts(&[("SBRF", 2024, 11)]), date(2025, 1, 20));
        assert_eq!(report.required_period.decode(), (2024, 12));
        assert_eq!(status(&report, "SBRF").missing_periods, 1);
    }

    #[test]
    fn ancient_data_hits_the_cap() {
        let report = evaluate_compliance(&facts(&[("SBMO", 1999, 1)]), date(2025, 3, 15));
        let s = status(&report, "SBMO");
        assert_eq!(s.missing_periods, MISSING_PERIOD_CAP);
        assert!(s.is_stale());
    }

    #[test]
    fn no_facts_means_no_status() {
        let report = evaluate_compliance(&PeriodFacts::default(), date(2025, 3, 15));
        assert!(report.statuses.is_empty());
        assert_eq!(report.required_period.decode(), (2025, 2));
    }

    #[test]
    fn pending_is_filtered_and_ordered() {
        let report = evaluate_compliance(
            &facts(&[
                ("SBJU", 2024, 12),
                ("SBCG", 2024, 11),
                ("SBAR", 2024, 12),
                ("SBSP", 2025, 2),
            ]),
            date(2025, 3, 15),
        );
        let all: Vec<&str> = report
            .pending(&SelectionSet::Unrestricted)
            .iter()
            .map(|s| s.entity.as_str())
            .collect();
        assert_eq!(all, vec!["SBCG", "SBAR", "SBJU"]);

        let only = report.pending(&SelectionSet::Explicit(vec!["SBJU".to_string()]));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].entity, "SBJU");
    }
}
