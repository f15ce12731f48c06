// Period arithmetic shared by the compliance and goal engines.
//
// A period is a (year, month) pair packed into `year * 100 + month`, so that
// plain integer comparison is chronological comparison.
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::error::PeriodError;
use crate::util::month_abbrev;

/// Day of the current month by which the previous month must be reported.
pub const DUE_DAY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PeriodKey(i32);

impl PeriodKey {
    pub fn encode(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidPeriod { year, month });
        }
        year.checked_mul(100)
            .and_then(|v| v.checked_add(month as i32))
            .map(Self)
            .ok_or(PeriodError::YearOutOfRange { year })
    }

    pub fn decode(self) -> (i32, u32) {
        (self.0.div_euclid(100), self.0.rem_euclid(100) as u32)
    }

    pub fn year(self) -> i32 {
        self.decode().0
    }

    pub fn month(self) -> u32 {
        self.decode().1
    }

    /// Raw `year * 100 + month` value.
    pub fn value(self) -> i32 {
        self.0
    }

    /// Position on a gapless month line (`year * 12 + month - 1`). Stepping a
    /// period forward by `n` months adds exactly `n` here.
    pub fn month_index(self) -> i64 {
        let (year, month) = self.decode();
        year as i64 * 12 + (month as i64 - 1)
    }

    /// `Fev/2025` style label used in report output.
    pub fn label(self) -> String {
        let (year, month) = self.decode();
        format!("{}/{}", month_abbrev(month), year)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month) = self.decode();
        write!(f, "{:04}-{:02}", year, month)
    }
}

/// Step `delta` months forward from (year, month), one month at a time.
///
/// Kept as a loop so it matches the counting loop in the compliance
/// evaluator step for step; deltas are small (bounded by the missing-period
/// cap) in practice. `None` when the year would leave the `i32` range.
pub fn add_months(year: i32, month: u32, delta: u32) -> Option<(i32, u32)> {
    let (mut y, mut m) = (year, month);
    for _ in 0..delta {
        m += 1;
        if m == 13 {
            m = 1;
            y = y.checked_add(1)?;
        }
    }
    Some((y, m))
}

/// Period that must already be reported on `today`: the previous calendar
/// month.
pub fn required_period(today: NaiveDate) -> PeriodKey {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    PeriodKey(year * 100 + month as i32)
}

/// Submission deadline for the required period: the 10th of `today`'s month,
/// whether or not it has passed.
pub fn due_date(today: NaiveDate) -> NaiveDate {
    // Every month has a 10th, so the fallback is unreachable.
    today.with_day(DUE_DAY).unwrap_or(today)
}
