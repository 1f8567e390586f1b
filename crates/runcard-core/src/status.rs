//! Status derivation from step timestamps.
//!
//! Everything here is pure: status is recomputed from `startTime`/`endTime`
//! on every read. The only cached copy is [`Project::status`], which
//! [`refresh_project_status`] rewrites after every committed mutation.

use crate::model::step::normalize;
use crate::model::{Lot, Project, Step, step::ParseEnumError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Init,
    InProcess,
    Completed,
    Skipped,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::InProcess => "in-process",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

/// Aggregate lifecycle of a lot or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    #[serde(alias = "Init")]
    Init,
    #[serde(alias = "InProcess", alias = "in_process")]
    InProcess,
    #[serde(alias = "Completed")]
    Completed,
}

impl ProjectStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::InProcess => "in-process",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "init" => Ok(Self::Init),
            "inprocess" => Ok(Self::InProcess),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(ParseEnumError {
                expected: "step status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "init" => Ok(Self::Init),
            "inprocess" => Ok(Self::InProcess),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

/// Derive a step's status. `SKIPPED` in `endTime` wins over everything.
#[must_use]
pub const fn step_status(step: &Step) -> StepStatus {
    if step.end_time.is_skipped() {
        StepStatus::Skipped
    } else if step.end_time.is_set() {
        StepStatus::Completed
    } else if step.start_time.is_set() {
        StepStatus::InProcess
    } else {
        StepStatus::Init
    }
}

/// Aggregate over any set of steps.
///
/// Completed iff there is at least one step and every step has a non-empty
/// `endTime` (a `SKIPPED` end counts); in-process iff any step has either
/// timestamp set; otherwise init.
pub fn aggregate_status<'a>(steps: impl IntoIterator<Item = &'a Step>) -> ProjectStatus {
    let mut any = false;
    let mut all_done = true;
    let mut any_touched = false;
    for step in steps {
        any = true;
        all_done &= step.end_time.is_set();
        any_touched |= step.start_time.is_set() || step.end_time.is_set();
    }
    if any && all_done {
        ProjectStatus::Completed
    } else if any_touched {
        ProjectStatus::InProcess
    } else {
        ProjectStatus::Init
    }
}

#[must_use]
pub fn lot_status(lot: &Lot) -> ProjectStatus {
    aggregate_status(lot.steps())
}

#[must_use]
pub fn project_status(project: &Project) -> ProjectStatus {
    aggregate_status(project.steps())
}

/// Rewrite the cached status. Returns true when it changed.
pub fn refresh_project_status(project: &mut Project) -> bool {
    let fresh = project_status(project);
    let changed = project.status != fresh;
    project.status = fresh;
    changed
}

/// Finished-vs-total step counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn of<'a>(steps: impl IntoIterator<Item = &'a Step>) -> Self {
        steps.into_iter().fold(Self::default(), |acc, step| Self {
            done: acc.done + usize::from(step.end_time.is_set()),
            total: acc.total + 1,
        })
    }

    /// Rounded completion percentage; 0 for an empty set.
    #[must_use]
    pub fn percent(self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.done * 200 + self.total) / (self.total * 2);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.done, self.total)
    }
}

/// Dashboard counters, one unit per lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub completed: usize,
    pub in_process: usize,
    pub init: usize,
}

impl StatusCounts {
    #[must_use]
    pub fn of_lots(projects: &[Project]) -> Self {
        projects
            .iter()
            .flat_map(|p| p.lots.iter())
            .fold(Self::default(), |mut acc, lot| {
                acc.total += 1;
                match lot_status(lot) {
                    ProjectStatus::Completed => acc.completed += 1,
                    ProjectStatus::InProcess => acc.in_process += 1,
                    ProjectStatus::Init => acc.init += 1,
                }
                acc
            })
    }
}

/// A fully finished lot with its last check-out time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedLot {
    pub project_id: String,
    pub product_id: String,
    pub lot_id: String,
    pub lot_label: String,
    pub created_date: String,
    /// Latest real `endTime`; empty when every step was skipped.
    pub final_checkout: String,
}

/// Every completed lot across the collection, in collection order.
#[must_use]
pub fn completed_lots(projects: &[Project]) -> Vec<CompletedLot> {
    projects
        .iter()
        .flat_map(|project| {
            project
                .lots
                .iter()
                .filter(|lot| lot_status(lot) == ProjectStatus::Completed)
                .map(move |lot| CompletedLot {
                    project_id: project.id.clone(),
                    product_id: project.product_id().to_string(),
                    lot_id: lot.id.clone(),
                    lot_label: lot.lot_id.clone(),
                    created_date: project.created_date().to_string(),
                    final_checkout: lot
                        .steps()
                        .filter_map(|s| s.end_time.timestamp())
                        .max()
                        .unwrap_or("")
                        .to_string(),
                })
        })
        .collect()
}
