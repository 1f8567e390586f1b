//! Search, date-range, column-value filtering and pagination over flat rows.
//!
//! [`ListQuery::run`] applies the stages in a fixed order: free-text search,
//! then the created-date range, then column filters (which also reorder rows
//! by selection order), then pagination.

use super::{Column, FlatRow};
use crate::model::step::{ParseEnumError, normalize};
use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Rows per page in list views.
pub const DEFAULT_PAGE_SIZE: usize = 20;

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// True when any value of the row contains `query`, case-insensitively.
/// The query is matched as given, whitespace included; only the empty query
/// matches everything.
#[must_use]
pub fn matches_search(row: &FlatRow, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    row.values().any(|v| v.to_lowercase().contains(&needle))
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// Inclusive day-level bounds on a row's created date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Quick-select ranges ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePreset {
    LastMonth,
    Last3Months,
    Last6Months,
    LastYear,
    All,
}

impl DatePreset {
    /// `[today − N months, today]`, or unbounded for [`DatePreset::All`].
    #[must_use]
    pub fn range(self, today: NaiveDate) -> DateRange {
        let months = match self {
            Self::LastMonth => 1,
            Self::Last3Months => 3,
            Self::Last6Months => 6,
            Self::LastYear => 12,
            Self::All => return DateRange::all(),
        };
        DateRange {
            from: today.checked_sub_months(Months::new(months)),
            to: Some(today),
        }
    }
}

impl FromStr for DatePreset {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "1m" | "month" | "lastmonth" => Ok(Self::LastMonth),
            "3m" | "last3months" => Ok(Self::Last3Months),
            "6m" | "last6months" => Ok(Self::Last6Months),
            "1y" | "12m" | "year" | "lastyear" => Ok(Self::LastYear),
            "all" | "alltime" => Ok(Self::All),
            _ => Err(ParseEnumError {
                expected: "date preset (1m, 3m, 6m, 1y, all)",
                got: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Column filters
// ---------------------------------------------------------------------------

/// Active per-column value selections, in the order columns were activated.
///
/// Each column's values keep the order the user selected them; that order is
/// also the sort order of the filtered rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnFilters {
    active: Vec<(Column, Vec<String>)>,
}

impl ColumnFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to `column`'s selection, activating the column if needed.
    pub fn select(&mut self, column: Column, value: impl Into<String>) {
        let value = value.into();
        match self.active.iter_mut().find(|(c, _)| *c == column) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            None => self.active.push((column, vec![value])),
        }
    }

    /// Remove `value`; a column whose selection empties is deactivated.
    pub fn deselect(&mut self, column: &Column, value: &str) {
        for (c, values) in &mut self.active {
            if c == column {
                values.retain(|v| v != value);
            }
        }
        self.active.retain(|(_, values)| !values.is_empty());
    }

    pub fn clear(&mut self, column: &Column) {
        self.active.retain(|(c, _)| c != column);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Column, &[String])> {
        self.active.iter().map(|(c, v)| (c, v.as_slice()))
    }

    /// A row passes when, for every active column, its value is selected.
    #[must_use]
    pub fn accepts(&self, row: &FlatRow) -> bool {
        self.active.iter().all(|(column, values)| {
            let value = row.value(column);
            values.iter().any(|v| *v == value)
        })
    }

    /// Reorder rows by selection order, first-activated column as primary key.
    pub fn order(&self, rows: &mut [FlatRow]) {
        for (column, values) in self.active.iter().rev() {
            order_by_selection(rows, column, values);
        }
    }
}

/// Reorder rows whose `column` value is in `selection` so they appear in
/// selection order. Rows with other values keep their exact positions, and
/// rows sharing a value keep their relative order.
pub fn order_by_selection(rows: &mut [FlatRow], column: &Column, selection: &[String]) {
    let rank = |row: &FlatRow| {
        let value = row.value(column);
        selection.iter().position(|s| *s == value)
    };
    let slots: Vec<usize> = (0..rows.len()).filter(|&i| rank(&rows[i]).is_some()).collect();
    let mut picked: Vec<(usize, FlatRow)> = slots
        .iter()
        .map(|&i| (rank(&rows[i]).unwrap_or(usize::MAX), rows[i].clone()))
        .collect();
    picked.sort_by_key(|(r, _)| *r);
    for (slot, (_, row)) in slots.into_iter().zip(picked) {
        rows[slot] = row;
    }
}

/// Distinct values of a column in first-seen order, for building filters.
#[must_use]
pub fn distinct_values(rows: &[FlatRow], column: &Column) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for row in rows {
        let value = row.value(column);
        if !out.iter().any(|v| *v == value) {
            out.push(value.into_owned());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// Matching rows before slicing.
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

impl Page {
    /// Slice `items`; page numbers past the end yield an empty page.
    #[must_use]
    pub fn slice<T>(self, items: Vec<T>) -> PageResult<T> {
        let size = self.size.max(1);
        let number = self.number.max(1);
        let total = items.len();
        let pages = total.div_ceil(size);
        let start = (number - 1).saturating_mul(size);
        let items = items.into_iter().skip(start).take(size).collect();
        PageResult {
            items,
            total,
            page: number,
            pages,
        }
    }
}

impl<T> PageResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            pages: self.pages,
        }
    }
}

impl<T> fmt::Display for PageResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {}/{} ({} rows)",
            self.page,
            self.pages.max(1),
            self.total
        )
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A full list-view request.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: String,
    pub range: DateRange,
    pub filters: ColumnFilters,
    pub page: Page,
}

impl ListQuery {
    /// Search, range, column filter + order, then paginate.
    #[must_use]
    pub fn run(&self, rows: Vec<FlatRow>) -> PageResult<FlatRow> {
        let mut kept: Vec<FlatRow> = rows
            .into_iter()
            .filter(|row| matches_search(row, &self.search))
            .filter(|row| self.range.contains(row.created_date))
            .filter(|row| self.filters.accepts(row))
            .collect();
        self.filters.order(&mut kept);
        self.page.slice(kept)
    }
}
