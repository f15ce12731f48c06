// Safety-indicator (IDSO) reporting engine.
//
// Raw monthly event rows are normalized and aggregated into per-period
// facts, which feed two evaluations: whether each site has submitted its
// monthly report by the deadline, and whether each site met its annual
// goals. Four independent filters select what is displayed.
pub mod aggregate;
pub mod compliance;
pub mod config;
pub mod error;
pub mod goals;
pub mod loader;
pub mod output;
pub mod overview;
pub mod period;
pub mod reports;
pub mod selection;
pub mod types;
pub mod util;

pub use aggregate::{aggregate, EventRecord, FactCache, PeriodFact, PeriodFacts};
pub use compliance::{evaluate_compliance, ComplianceReport, SubmissionStatus};
pub use goals::{evaluate_goals, GoalEvaluation, GoalStatus, GoalTable};
pub use period::PeriodKey;
pub use selection::{repair, Choice, Selection, SelectionSet};
