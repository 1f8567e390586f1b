//! Per-lot and per-project roll-ups for the browse and check-in views.

use crate::model::project::{FIELD_OWNER, FIELD_PRODUCT};
use crate::model::step::{ParseEnumError, normalize};
use crate::model::Project;
use crate::status::{Progress, ProjectStatus, lot_status};
use chrono::NaiveDate;
use serde::Serialize;
use std::str::FromStr;

/// One row per lot for the browse grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSummary {
    pub project_id: String,
    pub lot_ref: String,
    pub product_id: String,
    pub product: String,
    pub owner: String,
    pub created_date: NaiveDate,
    pub lot_label: String,
    pub status: ProjectStatus,
    pub progress: Progress,
}

#[must_use]
pub fn lot_summaries(projects: &[Project]) -> Vec<LotSummary> {
    projects
        .iter()
        .flat_map(|project| {
            project.lots.iter().map(move |lot| LotSummary {
                project_id: project.id.clone(),
                lot_ref: lot.id.clone(),
                product_id: project.product_id().to_string(),
                product: project.header.value(FIELD_PRODUCT).to_string(),
                owner: project.header.value(FIELD_OWNER).to_string(),
                created_date: project.created_date(),
                lot_label: lot.lot_id.clone(),
                status: lot_status(lot),
                progress: Progress::of(lot.steps()),
            })
        })
        .collect()
}

/// Check-in work-queue filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Every project that is not completed.
    #[default]
    All,
    InProcess,
    Init,
}

impl QueueMode {
    const fn admits(self, status: ProjectStatus) -> bool {
        match (self, status) {
            (_, ProjectStatus::Completed) => false,
            (Self::All, _) => true,
            (Self::InProcess, s) => matches!(s, ProjectStatus::InProcess),
            (Self::Init, s) => matches!(s, ProjectStatus::Init),
        }
    }
}

impl FromStr for QueueMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "all" => Ok(Self::All),
            "inprocess" | "ongoing" => Ok(Self::InProcess),
            "init" | "pending" => Ok(Self::Init),
            _ => Err(ParseEnumError {
                expected: "queue mode (all, in-process, init)",
                got: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub project_id: String,
    pub product_id: String,
    pub status: ProjectStatus,
    pub progress: Progress,
}

/// Non-completed projects narrowed by mode and Product ID substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkQueue {
    pub entries: Vec<QueueEntry>,
    /// Non-completed projects matching the Product ID search, any mode.
    pub all: usize,
    pub in_process: usize,
    pub init: usize,
}

impl WorkQueue {
    /// Build the queue. Status is recomputed from steps, not read from cache.
    #[must_use]
    pub fn build(projects: &[Project], mode: QueueMode, product_search: &str) -> Self {
        let needle = product_search.trim();
        let candidates: Vec<(&Project, ProjectStatus)> = projects
            .iter()
            .map(|p| (p, crate::status::project_status(p)))
            .filter(|(p, status)| {
                *status != ProjectStatus::Completed && p.product_id().contains(needle)
            })
            .collect();
        let count = |wanted: ProjectStatus| candidates.iter().filter(|(_, s)| *s == wanted).count();
        Self {
            all: candidates.len(),
            in_process: count(ProjectStatus::InProcess),
            init: count(ProjectStatus::Init),
            entries: candidates
                .iter()
                .filter(|(_, status)| mode.admits(*status))
                .map(|(project, status)| QueueEntry {
                    project_id: project.id.clone(),
                    product_id: project.product_id().to_string(),
                    status: *status,
                    progress: Progress::of(project.steps()),
                })
                .collect(),
        }
    }
}
