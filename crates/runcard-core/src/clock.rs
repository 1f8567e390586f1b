//! Wall-clock source for step timestamps and project bookkeeping.

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::cell::Cell;

/// Format used for `startTime` / `endTime` values written by check-in/out.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of "now". Injected so tests can pin time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    /// Current time rendered for a step timestamp field.
    fn stamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A pinned clock that can be moved forward by hand.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<NaiveDateTime>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Parse a stored timestamp or date string into a calendar date.
///
/// Accepts the canonical [`TIMESTAMP_FORMAT`], ISO `T`-separated datetimes,
/// and bare dates with `-` or `/` separators. Anything after the date part
/// is ignored when the full value does not parse.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    let date_part = raw
        .split(|c: char| c.is_whitespace() || c == 'T' || c == ',')
        .next()
        .unwrap_or(raw);
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
