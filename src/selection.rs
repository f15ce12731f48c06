// Filter state for the four report dimensions (entity, year, month,
// indicator).
//
// Each dimension is a [`SelectionSet`]: either unrestricted, or a non-empty
// explicit subset of the options present in the data. Raw user input is
// always passed through [`repair`], which is total and idempotent, so a
// selection can never end up empty, stale, or mixing "all" with members.

use std::cmp::Ordering;

use tracing::{info, warn};

use crate::aggregate::PeriodFact;

/// One item of raw multi-select input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Choice<T> {
    All,
    Value(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSet<T> {
    Unrestricted,
    /// Non-empty, deduplicated, canonically ordered.
    Explicit(Vec<T>),
}

impl<T> Default for SelectionSet<T> {
    fn default() -> Self {
        SelectionSet::Unrestricted
    }
}

impl<T: Clone + PartialEq> SelectionSet<T> {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, SelectionSet::Unrestricted)
    }

    pub fn contains(&self, value: &T) -> bool {
        match self {
            SelectionSet::Unrestricted => true,
            SelectionSet::Explicit(values) => values.contains(value),
        }
    }

    /// Concrete members: every present option when unrestricted.
    pub fn resolve(&self, present: &[T]) -> Vec<T> {
        match self {
            SelectionSet::Unrestricted => present.to_vec(),
            SelectionSet::Explicit(values) => values.clone(),
        }
    }

    /// The only member, when exactly one is selected.
    pub fn single(&self) -> Option<&T> {
        match self {
            SelectionSet::Explicit(values) if values.len() == 1 => values.first(),
            _ => None,
        }
    }

    /// Back to raw input form; `repair` of this yields `self` again.
    pub fn to_choices(&self) -> Vec<Choice<T>> {
        match self {
            SelectionSet::Unrestricted => vec![Choice::All],
            SelectionSet::Explicit(values) => values.iter().cloned().map(Choice::Value).collect(),
        }
    }
}

/// Repair raw multi-select input against the valid option universe.
///
/// - empty input -> unrestricted
/// - any value outside `opts` -> unrestricted (stale option, e.g. after the
///   source dataset changed)
/// - `All` mixed with values -> the values alone
/// - only `All` -> unrestricted
/// - otherwise the values, deduplicated and sorted by `order`
pub fn repair<T, F>(raw: &[Choice<T>], opts: &[T], mut order: F) -> SelectionSet<T>
where
    T: Clone + PartialEq,
    F: FnMut(&T, &T) -> Ordering,
{
    let mut values: Vec<T> = Vec::with_capacity(raw.len());
    for choice in raw {
        match choice {
            Choice::All => {}
            Choice::Value(v) if opts.contains(v) => values.push(v.clone()),
            Choice::Value(_) => return SelectionSet::Unrestricted,
        }
    }
    if values.is_empty() {
        return SelectionSet::Unrestricted;
    }
    values.sort_by(&mut order);
    values.dedup();
    SelectionSet::Explicit(values)
}

pub fn repair_entities(raw: &[Choice<String>], opts: &[String]) -> SelectionSet<String> {
    repair(raw, opts, |a, b| a.cmp(b))
}

/// Years are kept most recent first.
pub fn repair_years(raw: &[Choice<i32>], opts: &[i32]) -> SelectionSet<i32> {
    repair(raw, opts, |a, b| b.cmp(a))
}

pub fn repair_months(raw: &[Choice<u32>], opts: &[u32]) -> SelectionSet<u32> {
    repair(raw, opts, |a, b| a.cmp(b))
}

pub fn repair_indicators(raw: &[Choice<String>], opts: &[String]) -> SelectionSet<String> {
    repair(raw, opts, |a, b| a.cmp(b))
}

/// Option universe for each dimension, as present in the loaded data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOptions {
    pub entities: Vec<String>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub entities: SelectionSet<String>,
    pub years: SelectionSet<i32>,
    pub months: SelectionSet<u32>,
    pub indicators: SelectionSet<String>,
}

impl Selection {
    pub fn set_entities(&mut self, raw: &[Choice<String>], opts: &SelectionOptions) {
        self.entities = repair_entities(raw, &opts.entities);
    }

    pub fn set_years(&mut self, raw: &[Choice<i32>], opts: &SelectionOptions) {
        self.years = repair_years(raw, &opts.years);
    }

    pub fn set_months(&mut self, raw: &[Choice<u32>], opts: &SelectionOptions) {
        self.months = repair_months(raw, &opts.months);
    }

    pub fn set_indicators(&mut self, raw: &[Choice<String>], opts: &SelectionOptions) {
        self.indicators = repair_indicators(raw, &opts.indicators);
    }

    /// Re-apply the repair rule to all four sets against fresh options.
    pub fn sanitize(&mut self, opts: &SelectionOptions) {
        let before = self.clone();
        self.set_entities(&before.entities.to_choices(), opts);
        self.set_years(&before.years.to_choices(), opts);
        self.set_months(&before.months.to_choices(), opts);
        self.set_indicators(&before.indicators.to_choices(), opts);
        if *self != before {
            warn!("stale filter values dropped after options changed");
        }
    }

    pub fn reset(&mut self) {
        *self = Selection::default();
    }

    pub fn admits(&self, fact: &PeriodFact) -> bool {
        self.entities.contains(&fact.entity)
            && self.years.contains(&fact.year())
            && self.months.contains(&fact.month())
            && self.indicators.contains(&fact.indicator)
    }
}

/// Filter state tied to the source it was built against.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub source_hash: Option<String>,
    pub selection: Selection,
}

impl Session {
    /// Record that a source with `hash` was loaded.
    ///
    /// A first load or a different hash resets every filter; reloading the
    /// same source keeps the filters but repairs them against `opts`.
    /// Returns `true` when the filters were reset.
    pub fn on_source_loaded(&mut self, hash: &str, opts: &SelectionOptions) -> bool {
        if self.source_hash.as_deref() == Some(hash) {
            self.selection.sanitize(opts);
            return false;
        }
        info!(hash = hash.get(..12).unwrap_or(hash), "source changed, resetting filters");
        self.source_hash = Some(hash.to_string());
        self.selection.reset();
        true
    }
}
