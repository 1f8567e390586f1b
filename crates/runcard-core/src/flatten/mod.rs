//! Row-per-step projection of the project collection.
//!
//! [`flatten`] walks every project, lot, stress group and step in stored
//! order and emits one [`FlatRow`] per step. Each row carries a positional
//! [`RowKey`] valid only until the next structural change; callers that act
//! on a selection must re-flatten after any mutation.

pub mod filter;
pub mod summary;

pub use filter::{ColumnFilters, DatePreset, DateRange, ListQuery, Page, PageResult};
pub use summary::{LotSummary, QueueMode, WorkQueue, lot_summaries};

use crate::error::RunCardError;
use crate::model::project::{CANONICAL_HEADER_FIELDS, FIELD_PRODUCT_FAMILY};
use crate::model::step::normalize;
use crate::model::{Header, Project, Step, StepField};
use crate::status::{StepStatus, step_status};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::{fmt, str::FromStr};

/// Positional composite row identifier `project-lot-stress-row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub project: usize,
    pub lot: usize,
    pub stress: usize,
    pub row: usize,
}

impl RowKey {
    #[must_use]
    pub const fn new(project: usize, lot: usize, stress: usize, row: usize) -> Self {
        Self {
            project,
            lot,
            stress,
            row,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.project, self.lot, self.stress, self.row)
    }
}

impl FromStr for RowKey {
    type Err = RunCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RunCardError::InvalidRowId(s.to_string());
        let parts: Vec<usize> = s
            .trim()
            .split('-')
            .map(|part| part.parse::<usize>().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;
        match parts.as_slice() {
            [project, lot, stress, row] => Ok(Self::new(*project, *lot, *stress, *row)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for RowKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One step with everything it inherits from its containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRow {
    pub key: RowKey,
    pub project_id: String,
    /// Internal id of the lot (not its label).
    pub lot_ref: String,
    pub stress_ref: String,
    pub header: Header,
    /// Display name resolved from the family lookup, else the raw header value.
    pub family_name: String,
    pub lot_label: String,
    /// Stress label: the step's own, else the group's legacy label.
    pub stress: String,
    pub step: Step,
    pub status: StepStatus,
    pub created_date: NaiveDate,
}

/// Flatten the collection. `families` maps product-family id to display name.
#[must_use]
pub fn flatten(projects: &[Project], families: &HashMap<String, String>) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for (p, project) in projects.iter().enumerate() {
        let raw_family = project.header.value(FIELD_PRODUCT_FAMILY);
        let family_name = families
            .get(raw_family)
            .map_or(raw_family, String::as_str)
            .to_string();
        let created_date = project.created_date();
        for (l, lot) in project.lots.iter().enumerate() {
            for (s, group) in lot.stresses.iter().enumerate() {
                for (r, step) in group.row_data.iter().enumerate() {
                    rows.push(FlatRow {
                        key: RowKey::new(p, l, s, r),
                        project_id: project.id.clone(),
                        lot_ref: lot.id.clone(),
                        stress_ref: group.id.clone(),
                        header: project.header.clone(),
                        family_name: family_name.clone(),
                        lot_label: lot.lot_id.clone(),
                        stress: group.stress_label(step).to_string(),
                        step: step.clone(),
                        status: step_status(step),
                        created_date,
                    });
                }
            }
        }
    }
    rows
}

/// Addressable columns of a [`FlatRow`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    RowId,
    ProductFamily,
    LotId,
    Stress,
    Status,
    CreatedDate,
    StartTime,
    EndTime,
    /// A descriptive step field other than `stress`.
    Step(StepField),
    /// Any other header field, by its stored name.
    Header(String),
}

impl Column {
    /// Columns searched in addition to every header value.
    pub const SEARCHED: [Self; 8] = [
        Self::RowId,
        Self::ProductFamily,
        Self::LotId,
        Self::Stress,
        Self::Status,
        Self::CreatedDate,
        Self::StartTime,
        Self::EndTime,
    ];
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowId => f.write_str("rowId"),
            Self::ProductFamily => f.write_str(FIELD_PRODUCT_FAMILY),
            Self::LotId => f.write_str("lotId"),
            Self::Stress => f.write_str("stress"),
            Self::Status => f.write_str("status"),
            Self::CreatedDate => f.write_str("createdDate"),
            Self::StartTime => f.write_str("startTime"),
            Self::EndTime => f.write_str("endTime"),
            Self::Step(field) => write!(f, "{field}"),
            Self::Header(name) => f.write_str(name),
        }
    }
}

impl FromStr for Column {
    type Err = std::convert::Infallible;

    /// Known column names (any case, `_`/`-`/space insensitive) map to their
    /// variant; canonical header names map to their stored spelling; anything
    /// else is taken as a free-form header field name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize(s);
        let column = match key.as_str() {
            "rowid" | "id" | "key" => Self::RowId,
            "productfamily" | "family" => Self::ProductFamily,
            "lotid" | "lot" => Self::LotId,
            "stress" => Self::Stress,
            "status" => Self::Status,
            "createddate" | "created" => Self::CreatedDate,
            "starttime" | "start" => Self::StartTime,
            "endtime" | "end" => Self::EndTime,
            _ => {
                if let Some(field) = CANONICAL_HEADER_FIELDS
                    .iter()
                    .find(|field| normalize(field) == key)
                {
                    Self::Header((*field).to_string())
                } else if let Ok(field) = s.parse::<StepField>() {
                    Self::Step(field)
                } else {
                    Self::Header(s.trim().to_string())
                }
            }
        };
        Ok(column)
    }
}

impl FlatRow {
    /// Stringified value of a column; absent values are `""`.
    #[must_use]
    pub fn value(&self, column: &Column) -> Cow<'_, str> {
        match column {
            Column::RowId => Cow::Owned(self.key.to_string()),
            Column::ProductFamily => Cow::Borrowed(&self.family_name),
            Column::LotId => Cow::Borrowed(&self.lot_label),
            Column::Stress | Column::Step(StepField::Stress) => Cow::Borrowed(&self.stress),
            Column::Status => Cow::Owned(self.status.to_string()),
            Column::CreatedDate => Cow::Owned(self.created_date.to_string()),
            Column::StartTime => Cow::Borrowed(self.step.start_time.as_str()),
            Column::EndTime => Cow::Borrowed(self.step.end_time.as_str()),
            Column::Step(field) => Cow::Borrowed(self.step.field(*field)),
            Column::Header(name) => Cow::Borrowed(self.header.value(name)),
        }
    }

    /// Every searchable value of the row.
    pub fn values(&self) -> impl Iterator<Item = Cow<'_, str>> {
        let fixed = Column::SEARCHED.into_iter().map(move |c| self.value(&c));
        let step = StepField::ALL
            .iter()
            .filter(|f| **f != StepField::Stress)
            .map(|f| Cow::Borrowed(self.step.field(*f)));
        let header = self.header.ordered().map(|(_, v)| Cow::Borrowed(v));
        fixed.chain(step).chain(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::FIELD_PRODUCT_ID;
    use crate::model::{Lot, StressGroup};
    use crate::status::ProjectStatus;
    use chrono::NaiveDateTime;

    pub(crate) fn project(product: &str, family: &str, lots: usize, steps: usize) -> Project {
        let now = NaiveDateTime::parse_from_str("2026-05-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let mut header = Header::new();
        header.set(FIELD_PRODUCT_ID, product);
        header.set(FIELD_PRODUCT_FAMILY, family);
        Project {
            id: format!("proj_{product}"),
            header,
            lots: (0..lots)
                .map(|i| {
                    let mut lot = Lot::fresh(format!("L{i}"));
                    let group: &mut StressGroup = &mut lot.stresses[0];
                    group.row_data[0].stress = "HTOL".into();
                    for _ in 1..steps {
                        let mut step = Step::empty(crate::ids::step_rid());
                        step.stress = "HTOL".into();
                        group.row_data.push(step);
                    }
                    lot
                })
                .collect(),
            status: ProjectStatus::Init,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_key_roundtrip_and_rejects_garbage() {
        let key: RowKey = "1-0-2-3".parse().unwrap();
        assert_eq!(key, RowKey::new(1, 0, 2, 3));
        assert_eq!(key.to_string(), "1-0-2-3");
        assert_eq!(serde_json::to_value(key).unwrap(), "1-0-2-3");
        for bad in ["", "1-2-3", "1-2-3-4-5", "a-0-0-0", "-1-0-0-0"] {
            assert!(
                matches!(bad.parse::<RowKey>(), Err(RunCardError::InvalidRowId(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn flatten_emits_one_row_per_step_with_positions() {
        let projects = vec![project("P-1", "pf_1", 2, 2), project("P-2", "unknown", 1, 1)];
        let families: HashMap<String, String> =
            [("pf_1".to_string(), "Automotive".to_string())].into_iter().collect();
        let rows = flatten(&projects, &families);
        assert_eq!(rows.len(), 5);
        let keys: Vec<String> = rows.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, ["0-0-0-0", "0-0-0-1", "0-1-0-0", "0-1-0-1", "1-0-0-0"]);
        assert_eq!(rows[0].family_name, "Automotive");
        assert_eq!(rows[4].family_name, "unknown");
        assert_eq!(rows[2].lot_label, "L1");
        assert_eq!(rows[0].created_date.to_string(), "2026-05-01");
        assert_eq!(rows[0].status, StepStatus::Init);
    }

    #[test]
    fn column_names_parse_leniently() {
        assert_eq!("lot_id".parse::<Column>().unwrap(), Column::LotId);
        assert_eq!(
            "product id".parse::<Column>().unwrap(),
            Column::Header(FIELD_PRODUCT_ID.into())
        );
        assert_eq!(
            "operation".parse::<Column>().unwrap(),
            Column::Step(StepField::Operation)
        );
        assert_eq!(
            "Chamber".parse::<Column>().unwrap(),
            Column::Header("Chamber".into())
        );
    }

    #[test]
    fn skipped_status_wins_in_rows() {
        let mut projects = vec![project("P-1", "", 1, 1)];
        let step = &mut projects[0].lots[0].stresses[0].row_data[0];
        step.start_time = crate::model::TimeMark::Skipped;
        step.end_time = crate::model::TimeMark::Skipped;
        let rows = flatten(&projects, &HashMap::new());
        assert_eq!(rows[0].status, StepStatus::Skipped);
        assert_eq!(rows[0].value(&Column::Status), "skipped");
    }
}
