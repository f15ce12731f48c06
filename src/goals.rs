// Annual goal tracking.
//
// Targets are configured per entity and indicator. For most indicators a
// goal is met when the yearly event count stays at or below the target; for
// indicators whose name contains `RELPREV` (voluntary prevention reports)
// more is better, and the count must reach the target.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::PeriodFacts;
use crate::selection::SelectionSet;

pub const HIGHER_IS_BETTER_MARKER: &str = "RELPREV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

impl Polarity {
    pub fn for_indicator(name: &str) -> Self {
        if name.to_uppercase().contains(HIGHER_IS_BETTER_MARKER) {
            Polarity::HigherIsBetter
        } else {
            Polarity::LowerIsBetter
        }
    }

    pub fn achieved(self, actual: u64, target: u64) -> bool {
        match self {
            Polarity::HigherIsBetter => actual >= target,
            Polarity::LowerIsBetter => actual <= target,
        }
    }
}

/// Percent-of-target band for lower-is-better goals. Downstream consumers
/// key colour and severity off these, so the boundaries are fixed:
/// `< 80%`, `80% ..= 100%`, `> 100%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GoalBand {
    Under80,
    From80To100,
    Over100,
}

impl GoalBand {
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio < 0.8 {
            GoalBand::Under80
        } else if ratio <= 1.0 {
            GoalBand::From80To100
        } else {
            GoalBand::Over100
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GoalBand::Under80 => "under 80%",
            GoalBand::From80To100 => "80-100%",
            GoalBand::Over100 => "over 100%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Good,
    Warning,
    Bad,
}

/// entity -> indicator -> yearly target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalTable {
    targets: BTreeMap<String, BTreeMap<String, u64>>,
}

const INDICATORS: [&str; 7] = [
    "Incursão em Pista",
    "Excursão de Pista",
    "Colisões Entre Aeronaves e Veículos, Equipamentos, Estrutura",
    "Colisão entre Veículos, Equipamentos, Estruturas",
    "F.O.D",
    "Colisão com Aves",
    "RELPREV",
];

// Targets per airport, in `INDICATORS` order.
const BUILTIN_TARGETS: [(&str, [u64; 7]); 17] = [
    ("SBJU", [3, 1, 2, 5, 7, 40, 15]),
    ("SBCG", [4, 1, 3, 5, 10, 50, 30]),
    ("SBCJ", [2, 1, 1, 3, 10, 30, 20]),
    ("SBCR", [2, 1, 1, 3, 10, 30, 20]),
    ("SBHT", [2, 1, 1, 3, 10, 25, 20]),
    ("SBJP", [5, 1, 3, 5, 10, 50, 35]),
    ("SBKG", [3, 1, 2, 5, 5, 30, 15]),
    ("SBMA", [3, 1, 3, 5, 10, 30, 20]),
    ("SBMK", [3, 1, 3, 5, 10, 30, 20]),
    ("SBMO", [5, 0, 2, 3, 8, 50, 55]),
    ("SBPP", [2, 1, 1, 3, 10, 30, 20]),
    ("SBRF", [7, 1, 5, 12, 15, 144, 150]),
    ("SBSN", [3, 1, 3, 5, 10, 30, 31]),
    ("SBSP", [4, 1, 6, 50, 67, 52, 300]),
    ("SBUL", [4, 1, 3, 5, 10, 50, 30]),
    ("SBUR", [2, 1, 1, 3, 10, 30, 20]),
    ("SBAR", [5, 1, 3, 5, 10, 40, 30]),
];

static BUILTIN: Lazy<GoalTable> = Lazy::new(|| {
    let mut table = GoalTable::default();
    for (entity, targets) in BUILTIN_TARGETS {
        for (indicator, target) in INDICATORS.iter().zip(targets) {
            table.insert(entity, indicator, target);
        }
    }
    table
});

impl GoalTable {
    /// The targets in force for the current reporting cycle.
    pub fn builtin() -> &'static GoalTable {
        &BUILTIN
    }

    pub fn insert(&mut self, entity: &str, indicator: &str, target: u64) {
        self.targets
            .entry(entity.to_string())
            .or_default()
            .insert(indicator.to_string(), target);
    }

    pub fn target(&self, entity: &str, indicator: &str) -> Option<u64> {
        self.targets.get(entity)?.get(indicator).copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn indicators_for(&self, entity: &str) -> impl Iterator<Item = (&str, u64)> {
        self.targets
            .get(entity)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Every indicator configured for at least one entity.
    pub fn indicators(&self) -> BTreeSet<&str> {
        self.targets
            .values()
            .flat_map(|m| m.keys().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GoalScope {
    Entity(String),
    AllEntities,
}

impl GoalScope {
    pub fn label(&self) -> &str {
        match self {
            GoalScope::Entity(e) => e,
            GoalScope::AllEntities => "ALL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalStatus {
    pub scope: GoalScope,
    pub indicator: String,
    pub year: i32,
    pub actual: u64,
    pub target: u64,
    pub polarity: Polarity,
    pub achieved: bool,
}

impl GoalStatus {
    fn new(scope: GoalScope, indicator: &str, year: i32, actual: u64, target: u64) -> Self {
        let polarity = Polarity::for_indicator(indicator);
        Self {
            scope,
            indicator: indicator.to_string(),
            year,
            actual,
            target,
            polarity,
            achieved: polarity.achieved(actual, target),
        }
    }

    /// `actual / target`; zero when no target is set.
    pub fn ratio(&self) -> f64 {
        if self.target == 0 {
            0.0
        } else {
            self.actual as f64 / self.target as f64
        }
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }

    /// Only lower-is-better goals are banded.
    pub fn band(&self) -> Option<GoalBand> {
        match self.polarity {
            Polarity::LowerIsBetter => Some(GoalBand::for_ratio(self.ratio())),
            Polarity::HigherIsBetter => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.band() {
            Some(GoalBand::Under80) => Severity::Good,
            Some(GoalBand::From80To100) => Severity::Warning,
            Some(GoalBand::Over100) => Severity::Bad,
            None if self.achieved => Severity::Good,
            None => Severity::Bad,
        }
    }

    /// Progress bar fill in percent, capped at 150.
    pub fn bar_width(&self) -> f64 {
        self.percent().min(150.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GoalEvaluation {
    pub per_entity: Vec<GoalStatus>,
    /// "All entities" statuses, only when the entity scope is unrestricted.
    pub aggregate: Vec<GoalStatus>,
    /// Entities meeting every in-scope goal.
    pub achieved: Vec<String>,
    /// Entities missing at least one in-scope goal.
    pub not_achieved: Vec<String>,
}

/// Goals are scored per calendar year, so exactly one year must be selected.
pub fn goal_year(years: &SelectionSet<i32>) -> Option<i32> {
    years.single().copied()
}

/// Evaluate configured goals for `year`.
///
/// Per-entity statuses cover the configured entities inside `entity_scope`;
/// indicators outside `indicator_scope` and zero targets are skipped. The
/// roll-up lists leave out entities with no facts in the year or with no
/// goal left in scope.
pub fn evaluate_goals(
    facts: &PeriodFacts,
    year: i32,
    entity_scope: &SelectionSet<String>,
    indicator_scope: &SelectionSet<String>,
    table: &GoalTable,
) -> GoalEvaluation {
    let mut actuals: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for f in facts.iter().filter(|f| f.year() == year) {
        let a = actuals
            .entry((f.entity.as_str(), f.indicator.as_str()))
            .or_insert(0);
        *a = a.saturating_add(f.events);
    }
    let actual_for = |entity: &str, indicator: &str| -> u64 {
        actuals.get(&(entity, indicator)).copied().unwrap_or(0)
    };
    let has_facts = |entity: &str| actuals.keys().any(|(e, _)| *e == entity);

    let mut eval = GoalEvaluation::default();

    for entity in table.entities() {
        if !entity_scope.contains(&entity.to_string()) {
            continue;
        }
        let statuses: Vec<GoalStatus> = table
            .indicators_for(entity)
            .filter(|(indicator, target)| {
                *target > 0 && indicator_scope.contains(&indicator.to_string())
            })
            .map(|(indicator, target)| {
                GoalStatus::new(
                    GoalScope::Entity(entity.to_string()),
                    indicator,
                    year,
                    actual_for(entity, indicator),
                    target,
                )
            })
            .collect();

        if !statuses.is_empty() && has_facts(entity) {
            if statuses.iter().all(|s| s.achieved) {
                eval.achieved.push(entity.to_string());
            } else {
                eval.not_achieved.push(entity.to_string());
            }
        }
        eval.per_entity.extend(statuses);
    }

    if entity_scope.is_unrestricted() {
        for indicator in table.indicators() {
            if !indicator_scope.contains(&indicator.to_string()) {
                continue;
            }
            let (mut actual, mut target) = (0u64, 0u64);
            for entity in table.entities() {
                if let Some(t) = table.target(entity, indicator) {
                    actual = actual.saturating_add(actual_for(entity, indicator));
                    target = target.saturating_add(t);
                }
            }
            if target == 0 {
                continue;
            }
            eval.aggregate.push(GoalStatus::new(
                GoalScope::AllEntities,
                indicator,
                year,
                actual,
                target,
            ));
        }
    }

    debug!(
        year,
        per_entity = eval.per_entity.len(),
        aggregate = eval.aggregate.len(),
        achieved = eval.achieved.len(),
        not_achieved = eval.not_achieved.len(),
        "evaluated goals"
    );
    eval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, EventRecord};
    use crate::period::PeriodKey;

    fn facts(rows: &[(&str, &str, i32, u32, u64)]) -> PeriodFacts {
        let records: Vec<EventRecord> = rows
            .iter()
            .map(|(e, i, y, m, ev)| EventRecord {
                entity: e.to_string(),
                indicator: i.to_string(),
                period: PeriodKey::encode(*y, *m).unwrap(),
                events: *ev,
                movements: 0,
            })
            .collect();
        aggregate(&records)
    }

    fn status(indicator: &str, actual: u64, target: u64) -> GoalStatus {
        GoalStatus::new(GoalScope::Entity("SBJU".into()), indicator, 2025, actual, target)
    }

    #[test]
    fn lower_is_better_bands() {
        let under = status("F.O.D", 5, 7);
        assert!(under.achieved);
        assert!((under.percent() - 71.428).abs() < 0.01);
        assert_eq!(under.band(), Some(GoalBand::Under80));
        assert_eq!(under.severity(), Severity::Good);

        let exact = status("F.O.D", 7, 7);
        assert!(exact.achieved);
        assert_eq!(exact.band(), Some(GoalBand::From80To100));
        assert_eq!(exact.severity(), Severity::Warning);

        let over = status("F.O.D", 8, 7);
        assert!(!over.achieved);
        assert_eq!(over.band(), Some(GoalBand::Over100));
        assert_eq!(over.severity(), Severity::Bad);
    }

    #[test]
    fn relprev_is_higher_is_better() {
        let short = status("RELPREV", 10, 15);
        assert_eq!(short.polarity, Polarity::HigherIsBetter);
        assert!(!short.achieved);
        assert_eq!(short.band(), None);
        assert_eq!(short.severity(), Severity::Bad);

        let met = status("RELPREV", 20, 15);
        assert!(met.achieved);
        assert_eq!(met.severity(), Severity::Good);
        assert_eq!(Polarity::for_indicator("relprev (voluntários)"), Polarity::HigherIsBetter);
    }

    #[test]
    fn zero_target_gives_zero_percent() {
        let s = status("Excursão de Pista", 3, 0);
        assert_eq!(s.percent(), 0.0);
        assert_eq!(status("F.O.D", 30, 10).bar_width(), 150.0);
    }

    #[test]
    fn builtin_table_matches_deployment() {
        let table = GoalTable::builtin();
        assert_eq!(table.entities().count(), 17);
        assert_eq!(table.target("SBJU", "F.O.D"), Some(7));
        assert_eq!(table.target("SBSP", "RELPREV"), Some(300));
        assert_eq!(table.target("SBMO", "Excursão de Pista"), Some(0));
        assert_eq!(table.indicators().len(), 7);
    }

    fn small_table() -> GoalTable {
        let mut t = GoalTable::default();
        t.insert("SBJU", "F.O.D", 7);
        t.insert("SBJU", "RELPREV", 15);
        t.insert("SBJU", "Excursão de Pista", 0);
        t.insert("SBCG", "F.O.D", 10);
        t.insert("SBMO", "RELPREV", 5);
        t
    }

    #[test]
    fn per_entity_and_rollup() {
        let f = facts(&[
            ("SBJU", "F.O.D", 2025, 1, 3),
            ("SBJU", "F.O.D", 2025, 2, 2),
            ("SBJU", "RELPREV", 2025, 1, 20),
            ("SBJU", "F.O.D", 2024, 1, 50),
            ("SBCG", "F.O.D", 2025, 1, 11),
            ("SBXX", "F.O.D", 2025, 1, 99),
        ]);
        let eval = evaluate_goals(
            &f,
            2025,
            &SelectionSet::Unrestricted,
            &SelectionSet::Unrestricted,
            &small_table(),
        );

        let sbju: Vec<&GoalStatus> = eval
            .per_entity
            .iter()
            .filter(|s| s.scope == GoalScope::Entity("SBJU".into()))
            .collect();
        // zero-target indicator skipped
        assert_eq!(sbju.len(), 2);
        assert!(sbju.iter().all(|s| s.achieved));

        assert_eq!(eval.achieved, vec!["SBJU"]);
        // SBMO has no facts in 2025 and sits in neither list
        assert_eq!(eval.not_achieved, vec!["SBCG"]);

        let fod = eval.aggregate.iter().find(|s| s.indicator == "F.O.D").unwrap();
        // SBXX is not configured and contributes nothing
        assert_eq!(fod.actual, 5 + 11);
        assert_eq!(fod.target, 17);
        assert!(fod.achieved);
        assert_eq!(fod.band(), Some(GoalBand::From80To100));

        let relprev = eval.aggregate.iter().find(|s| s.indicator == "RELPREV").unwrap();
        assert_eq!((relprev.actual, relprev.target), (20, 20));
        assert!(relprev.achieved);
    }

    #[test]
    fn indicator_scope_limits_rollup() {
        let f = facts(&[
            ("SBJU", "F.O.D", 2025, 1, 30),
            ("SBJU", "RELPREV", 2025, 1, 20),
        ]);
        let only_relprev = SelectionSet::Explicit(vec!["RELPREV".to_string()]);
        let eval = evaluate_goals(
            &f,
            2025,
            &SelectionSet::Explicit(vec!["SBJU".to_string()]),
            &only_relprev,
            &small_table(),
        );
        assert_eq!(eval.per_entity.len(), 1);
        assert_eq!(eval.achieved, vec!["SBJU"]);
        assert!(eval.aggregate.is_empty());

        let nothing_in_scope = SelectionSet::Explicit(vec!["Colisão com Aves".to_string()]);
        let eval = evaluate_goals(&f, 2025, &SelectionSet::Unrestricted, &nothing_in_scope, &small_table());
        assert!(eval.achieved.is_empty());
        assert!(eval.not_achieved.is_empty());
    }

    #[test]
    fn goal_year_needs_exactly_one_year() {
        assert_eq!(goal_year(&SelectionSet::Unrestricted), None);
        assert_eq!(goal_year(&SelectionSet::Explicit(vec![2025])), Some(2025));
        assert_eq!(goal_year(&SelectionSet::Explicit(vec![2025, 2024])), None);
    }

    #[test]
    fn goal_table_from_toml() {
        let t: GoalTable = toml::from_str(
            r#"
            [SBJU]
            "F.O.D" = 7
            RELPREV = 15
            "#,
        )
        .unwrap();
        assert_eq!(t.target("SBJU", "F.O.D"), Some(7));
        assert_eq!(t.target("SBJU", "RELPREV"), Some(15));
    }
}
