//! Commit path: every mutation goes load → edit a copy → recompute → save.
//!
//! [`SyncEngine`] never holds the collection between calls. Each operation
//! reloads current store state, edits a private copy, and saves it whole. If
//! the edit is refused or the save fails, the previously persisted collection
//! is untouched.

use crate::clock::Clock;
use crate::error::{EntityKind, Result, RunCardError};
use crate::flatten::RowKey;
use crate::hierarchy;
use crate::model::step::{ParseEnumError, normalize};
use crate::model::{Header, Lot, Project, Step, StepPatch, TimeMark};
use crate::status::refresh_project_status;
use crate::store::{self, PROJECTS_KEY, RecordStore, TEMPLATES_KEY};
use crate::template::{self, Template};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;
use std::{fmt, str::FromStr};
use tracing::{debug, info, warn};

/// Ordered check-in/out actions on a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Start,
    Finish,
    Skip,
    Unskip,
}

impl StepAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Skip => "skip",
            Self::Unskip => "unskip",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "start" | "checkin" => Ok(Self::Start),
            "finish" | "checkout" | "end" => Ok(Self::Finish),
            "skip" => Ok(Self::Skip),
            "unskip" => Ok(Self::Unskip),
            _ => Err(ParseEnumError {
                expected: "step action",
                got: s.to_string(),
            }),
        }
    }
}

/// Apply `action` to `steps[index]`, stamping with `stamp`.
///
/// Ordering is judged against the immediately preceding step of the same
/// group (and, for unskip, the following one). A refused action leaves the
/// step untouched.
///
/// # Errors
///
/// [`RunCardError::OrderingViolation`] when the action is out of sequence,
/// [`RunCardError::NotFound`] when `index` is past the end of `steps`.
pub fn apply_action(steps: &mut [Step], index: usize, action: StepAction, stamp: &str) -> Result<()> {
    let missing = || RunCardError::not_found(EntityKind::Step, format!("#{index}"));
    let previous_done = match index.checked_sub(1) {
        Some(prev) => steps.get(prev).ok_or_else(missing)?.end_time.is_set(),
        None => true,
    };
    let next_started = index
        .checked_add(1)
        .and_then(|next| steps.get(next))
        .is_some_and(|next| next.start_time.is_set());
    let step = steps.get_mut(index).ok_or_else(missing)?;

    let refusal = match action {
        StepAction::Start if step.start_time.is_set() => Some("already started"),
        StepAction::Start if step.end_time.is_skipped() => Some("step is skipped"),
        StepAction::Start if !previous_done => Some("previous step is not finished"),
        StepAction::Finish if !step.start_time.is_set() => Some("step has not started"),
        StepAction::Finish if step.end_time.is_set() => Some("already finished"),
        StepAction::Skip if step.start_time.is_set() => Some("step has already started"),
        StepAction::Skip if !previous_done => Some("previous step is not finished"),
        StepAction::Unskip if !step.end_time.is_skipped() => Some("step is not skipped"),
        StepAction::Unskip if next_started => Some("a later step has already started"),
        _ => None,
    };
    if let Some(reason) = refusal {
        debug!(rid = %step.rid, %action, reason, "step action rejected");
        return Err(RunCardError::OrderingViolation {
            action,
            rid: step.rid.clone(),
            reason,
        });
    }

    match action {
        StepAction::Start => step.start_time = TimeMark::At(stamp.to_string()),
        StepAction::Finish => step.end_time = TimeMark::At(stamp.to_string()),
        StepAction::Skip => {
            step.start_time = TimeMark::Skipped;
            step.end_time = TimeMark::Skipped;
        }
        StepAction::Unskip => {
            step.start_time = TimeMark::Unset;
            step.end_time = TimeMark::Unset;
        }
    }
    Ok(())
}

/// Identity path to one step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLocation {
    pub project_id: String,
    pub lot_id: String,
    pub stress_id: String,
    pub rid: String,
}

/// Outcome of a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub steps_removed: usize,
    pub groups_pruned: usize,
    pub lots_pruned: usize,
    pub projects_pruned: usize,
    /// Selected identifiers that matched no current row.
    pub unmatched: Vec<String>,
}

/// Drop every step for which `doomed` is true, then prune emptied containers
/// bottom-up: groups, then lots, then projects.
///
/// Steps are filtered in one pass per group while every container is still
/// at its original position, so the [`RowKey`] handed to `doomed` always
/// matches the positions the collection had on entry. Surviving projects
/// that lost rows get their status recomputed and `updated_at` set to `now`.
pub fn prune_rows(
    mut projects: Vec<Project>,
    now: NaiveDateTime,
    mut doomed: impl FnMut(&RowKey, &Step) -> bool,
) -> (Vec<Project>, DeleteReport) {
    let mut report = DeleteReport::default();
    let mut touched = vec![false; projects.len()];

    for (p, project) in projects.iter_mut().enumerate() {
        for (l, lot) in project.lots.iter_mut().enumerate() {
            for (s, group) in lot.stresses.iter_mut().enumerate() {
                let before = group.row_data.len();
                let mut r = 0;
                group.row_data.retain(|step| {
                    let key = RowKey::new(p, l, s, r);
                    r += 1;
                    !doomed(&key, step)
                });
                let removed = before - group.row_data.len();
                report.steps_removed += removed;
                touched[p] |= removed > 0;
            }
        }
    }

    for project in &mut projects {
        for lot in &mut project.lots {
            let before = lot.stresses.len();
            lot.stresses.retain(|g| !g.row_data.is_empty());
            report.groups_pruned += before - lot.stresses.len();
        }
        let before = project.lots.len();
        project.lots.retain(|l| !l.stresses.is_empty());
        report.lots_pruned += before - project.lots.len();
    }

    let before = projects.len();
    let survivors: Vec<Project> = projects
        .into_iter()
        .zip(touched)
        .filter(|(project, _)| !project.lots.is_empty())
        .map(|(mut project, touched)| {
            if touched {
                refresh_project_status(&mut project);
                project.updated_at = now;
            }
            project
        })
        .collect();
    report.projects_pruned = before - survivors.len();
    (survivors, report)
}

/// Mutation and persistence front door over a [`RecordStore`].
pub struct SyncEngine<S, C> {
    store: S,
    clock: C,
}

impl<S: RecordStore, C: Clock> SyncEngine<S, C> {
    pub const fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current project collection.
    ///
    /// # Errors
    ///
    /// [`RunCardError::StoreUnavailable`].
    pub fn projects(&self) -> Result<Vec<Project>> {
        Ok(store::load_collection(&self.store, PROJECTS_KEY)?)
    }

    /// # Errors
    ///
    /// [`RunCardError::NotFound`] or a store failure.
    pub fn project(&self, project_id: &str) -> Result<Project> {
        self.projects()?
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| RunCardError::not_found(EntityKind::Project, project_id))
    }

    /// Find a step anywhere in the collection by `_rid`.
    ///
    /// # Errors
    ///
    /// [`RunCardError::NotFound`] or a store failure.
    pub fn locate_rid(&self, rid: &str) -> Result<StepLocation> {
        self.projects()?
            .iter()
            .find_map(|project| {
                project.lots.iter().find_map(|lot| {
                    lot.stresses.iter().find_map(|group| {
                        group.step(rid).map(|_| StepLocation {
                            project_id: project.id.clone(),
                            lot_id: lot.id.clone(),
                            stress_id: group.id.clone(),
                            rid: rid.to_string(),
                        })
                    })
                })
            })
            .ok_or_else(|| RunCardError::not_found(EntityKind::Step, rid))
    }

    /// Resolve a positional row key against the current collection.
    ///
    /// # Errors
    ///
    /// [`RunCardError::InvalidRowId`] when no row sits at that position now.
    pub fn resolve_row_key(&self, key: RowKey) -> Result<StepLocation> {
        let projects = self.projects()?;
        let located = projects.get(key.project).and_then(|project| {
            let lot = project.lots.get(key.lot)?;
            let group = lot.stresses.get(key.stress)?;
            let step = group.row_data.get(key.row)?;
            Some(StepLocation {
                project_id: project.id.clone(),
                lot_id: lot.id.clone(),
                stress_id: group.id.clone(),
                rid: step.rid.clone(),
            })
        });
        located.ok_or_else(|| {
            warn!(%key, "row id does not match current positions");
            RunCardError::InvalidRowId(key.to_string())
        })
    }

    // -----------------------------------------------------------------------
    // Project mutations
    // -----------------------------------------------------------------------

    /// Validate and append a new project.
    ///
    /// # Errors
    ///
    /// [`RunCardError::Validation`] or a store failure; nothing is saved on
    /// error.
    pub fn create_project(
        &self,
        header: Header,
        lots: Vec<Lot>,
        required_fields: &[String],
    ) -> Result<Project> {
        let project = hierarchy::new_project(header, lots, required_fields, &self.clock)?;
        let mut projects = self.projects()?;
        projects.push(project.clone());
        self.save_projects(&projects)?;
        info!(project = %project.id, product_id = project.product_id(), "project created");
        Ok(project)
    }

    /// Run `edit` on a fresh copy of one project and commit it.
    ///
    /// Status is recomputed and `updated_at` stamped before saving. When
    /// `edit` fails nothing is saved.
    ///
    /// # Errors
    ///
    /// Whatever `edit` returns, [`RunCardError::NotFound`], or a store failure.
    pub fn mutate_project<T>(
        &self,
        project_id: &str,
        edit: impl FnOnce(&mut Project) -> Result<T>,
    ) -> Result<T> {
        let mut projects = self.projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| RunCardError::not_found(EntityKind::Project, project_id))?;
        let out = edit(project)?;
        refresh_project_status(project);
        project.updated_at = self.clock.now();
        let status = project.status;
        self.save_projects(&projects)?;
        info!(project = project_id, %status, "project updated");
        Ok(out)
    }

    /// Merge a descriptive-field patch into one step.
    ///
    /// # Errors
    ///
    /// [`RunCardError::NotFound`] or a store failure.
    pub fn patch_step(&self, at: &StepLocation, patch: &StepPatch) -> Result<Step> {
        self.mutate_project(&at.project_id, |project| {
            hierarchy::patch_step(project, &at.lot_id, &at.stress_id, &at.rid, patch)?;
            current_step(project, at)
        })
    }

    /// Start, finish, skip or unskip a step, optionally merging a patch
    /// (typically the check-in remark) in the same commit.
    ///
    /// # Errors
    ///
    /// [`RunCardError::OrderingViolation`] (nothing persisted),
    /// [`RunCardError::NotFound`], or a store failure.
    pub fn step_action(
        &self,
        at: &StepLocation,
        action: StepAction,
        patch: Option<&StepPatch>,
    ) -> Result<Step> {
        let stamp = self.clock.stamp();
        self.mutate_project(&at.project_id, |project| {
            let group = hierarchy::stress_mut(project, &at.lot_id, &at.stress_id)?;
            let index = group
                .step_index(&at.rid)
                .ok_or_else(|| RunCardError::not_found(EntityKind::Step, &at.rid))?;
            apply_action(&mut group.row_data, index, action, &stamp)?;
            if let Some(patch) = patch {
                patch.apply_to(&mut group.row_data[index]);
            }
            current_step(project, at)
        })
    }

    // -----------------------------------------------------------------------
    // Bulk delete
    // -----------------------------------------------------------------------

    /// Delete rows selected by positional key from one flatten pass.
    ///
    /// Keys are matched against the positions the collection has now. A key
    /// that names no current row is reported in `unmatched`.
    ///
    /// # Errors
    ///
    /// A store failure; nothing is removed in that case.
    pub fn bulk_delete(&self, keys: &HashSet<RowKey>) -> Result<DeleteReport> {
        let projects = self.projects()?;
        let mut hit = HashSet::new();
        let (survivors, mut report) = prune_rows(projects, self.clock.now(), |key, _| {
            let doomed = keys.contains(key);
            if doomed {
                hit.insert(*key);
            }
            doomed
        });
        let mut unmatched: Vec<RowKey> = keys.difference(&hit).copied().collect();
        unmatched.sort();
        report.unmatched = unmatched.iter().map(ToString::to_string).collect();
        self.commit_delete(&survivors, &report)?;
        Ok(report)
    }

    /// Delete rows by `_rid`, with the same filter-then-prune pass.
    ///
    /// # Errors
    ///
    /// A store failure; nothing is removed in that case.
    pub fn delete_by_rids(&self, rids: &HashSet<String>) -> Result<DeleteReport> {
        let projects = self.projects()?;
        let mut hit = HashSet::new();
        let (survivors, mut report) = prune_rows(projects, self.clock.now(), |_, step| {
            let doomed = rids.contains(&step.rid);
            if doomed {
                hit.insert(step.rid.clone());
            }
            doomed
        });
        let mut unmatched: Vec<String> = rids.difference(&hit).cloned().collect();
        unmatched.sort();
        report.unmatched = unmatched;
        self.commit_delete(&survivors, &report)?;
        Ok(report)
    }

    fn commit_delete(&self, survivors: &[Project], report: &DeleteReport) -> Result<()> {
        if !report.unmatched.is_empty() {
            warn!(unmatched = ?report.unmatched, "selected rows not found; re-list before deleting");
        }
        if report.steps_removed == 0 {
            return Ok(());
        }
        self.save_projects(survivors)?;
        info!(
            steps = report.steps_removed,
            groups = report.groups_pruned,
            lots = report.lots_pruned,
            projects = report.projects_pruned,
            "rows deleted"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// [`RunCardError::StoreUnavailable`].
    pub fn templates(&self) -> Result<Vec<Template>> {
        Ok(store::load_collection(&self.store, TEMPLATES_KEY)?)
    }

    /// Capture a lot's shape under `name`, replacing any template of that name.
    ///
    /// # Errors
    ///
    /// [`RunCardError::Validation`] for a blank name, [`RunCardError::NotFound`],
    /// or a store failure.
    pub fn save_template(&self, name: &str, project_id: &str, lot_id: &str) -> Result<Template> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RunCardError::Validation("template name is required".into()));
        }
        let project = self.project(project_id)?;
        let lot = project
            .lot(lot_id)
            .ok_or_else(|| RunCardError::not_found(EntityKind::Lot, lot_id))?;
        let captured = template::capture(name, lot);
        let mut templates = self.templates()?;
        template::upsert(&mut templates, captured.clone());
        store::save_collection(&self.store, TEMPLATES_KEY, &templates)?;
        info!(template = name, steps = captured.step_count(), "template saved");
        Ok(captured)
    }

    /// Replace a lot's groups with the named template's shape.
    ///
    /// # Errors
    ///
    /// [`RunCardError::NotFound`] for the template or lot,
    /// [`RunCardError::Validation`] for an empty template, or a store failure.
    pub fn apply_template(&self, project_id: &str, lot_id: &str, name: &str) -> Result<()> {
        let chosen = self
            .templates()?
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RunCardError::not_found(EntityKind::Template, name))?;
        self.mutate_project(project_id, |project| {
            template::apply(hierarchy::lot_mut(project, lot_id)?, &chosen)
        })
    }

    /// # Errors
    ///
    /// [`RunCardError::NotFound`] or a store failure.
    pub fn delete_template(&self, name: &str) -> Result<()> {
        let mut templates = self.templates()?;
        let before = templates.len();
        templates.retain(|t| t.name != name);
        if templates.len() == before {
            return Err(RunCardError::not_found(EntityKind::Template, name));
        }
        store::save_collection(&self.store, TEMPLATES_KEY, &templates)?;
        info!(template = name, "template deleted");
        Ok(())
    }

    fn save_projects(&self, projects: &[Project]) -> Result<()> {
        store::save_collection(&self.store, PROJECTS_KEY, projects)?;
        Ok(())
    }
}

fn current_step(project: &Project, at: &StepLocation) -> Result<Step> {
    project
        .lot(&at.lot_id)
        .and_then(|lot| lot.stress(&at.stress_id))
        .and_then(|group| group.step(&at.rid))
        .cloned()
        .ok_or_else(|| RunCardError::not_found(EntityKind::Step, &at.rid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::project::FIELD_PRODUCT_ID;
    use crate::store::MemoryStore;
    use crate::status::{ProjectStatus, project_status};
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock::new(
            NaiveDate::from_ymd_opt(2026, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn engine() -> SyncEngine<MemoryStore, FixedClock> {
        SyncEngine::new(MemoryStore::new(), clock())
    }

    fn header(product: &str) -> Header {
        let mut header = Header::new();
        header.set(FIELD_PRODUCT_ID, product);
        header
    }

    fn required() -> Vec<String> {
        vec![FIELD_PRODUCT_ID.to_string()]
    }

    fn two_step_project(engine: &SyncEngine<MemoryStore, FixedClock>) -> (Project, StepLocation, StepLocation) {
        let project = engine
            .create_project(header("P-1"), vec![Lot::fresh("L1")], &required())
            .unwrap();
        let lot_id = project.lots[0].id.clone();
        let stress_id = project.lots[0].stresses[0].id.clone();
        let first = project.lots[0].stresses[0].row_data[0].rid.clone();
        let second = engine
            .mutate_project(&project.id, |p| hierarchy::add_step(p, &lot_id, &stress_id))
            .unwrap();
        let at = |rid: String| StepLocation {
            project_id: project.id.clone(),
            lot_id: lot_id.clone(),
            stress_id: stress_id.clone(),
            rid,
        };
        let (a, b) = (at(first), at(second));
        (engine.project(&project.id).unwrap(), a, b)
    }

    fn steps(n: usize) -> Vec<Step> {
        (0..n).map(|i| Step::empty(format!("row_{i}"))).collect()
    }

    #[test]
    fn action_table() {
        let mut s = steps(2);
        assert!(apply_action(&mut s, 1, StepAction::Start, "t1").is_err());
        assert!(apply_action(&mut s, 0, StepAction::Finish, "t1").is_err());
        apply_action(&mut s, 0, StepAction::Start, "t1").unwrap();
        assert!(apply_action(&mut s, 0, StepAction::Start, "t2").is_err());
        assert!(apply_action(&mut s, 0, StepAction::Skip, "t2").is_err());
        apply_action(&mut s, 0, StepAction::Finish, "t2").unwrap();
        assert_eq!(s[0].start_time.as_str(), "t1");
        assert_eq!(s[0].end_time.as_str(), "t2");
        assert!(apply_action(&mut s, 0, StepAction::Finish, "t3").is_err());
        apply_action(&mut s, 1, StepAction::Start, "t3").unwrap();
    }

    #[test]
    fn skip_unskip_reskip() {
        let mut s = steps(2);
        apply_action(&mut s, 0, StepAction::Skip, "ignored").unwrap();
        assert!(s[0].start_time.is_skipped() && s[0].end_time.is_skipped());
        assert!(apply_action(&mut s, 0, StepAction::Start, "t").is_err());

        apply_action(&mut s, 0, StepAction::Unskip, "ignored").unwrap();
        assert_eq!(s[0].start_time, TimeMark::Unset);
        assert_eq!(s[0].end_time, TimeMark::Unset);
        assert!(apply_action(&mut s, 0, StepAction::Unskip, "x").is_err());

        apply_action(&mut s, 0, StepAction::Skip, "ignored").unwrap();
        apply_action(&mut s, 1, StepAction::Start, "t").unwrap();
        let err = apply_action(&mut s, 0, StepAction::Unskip, "x").unwrap_err();
        assert!(matches!(err, RunCardError::OrderingViolation { action: StepAction::Unskip, .. }));
    }

    #[test]
    fn skip_requires_previous_finished() {
        let mut s = steps(2);
        assert!(apply_action(&mut s, 1, StepAction::Skip, "t").is_err());
        assert!(s.iter().all(|step| !step.start_time.is_set()));
    }

    #[test]
    fn out_of_range_index_is_not_found() {
        let mut s = steps(2);
        for index in [2, 7, usize::MAX] {
            let err = apply_action(&mut s, index, StepAction::Start, "t").unwrap_err();
            assert!(matches!(err, RunCardError::NotFound { kind: EntityKind::Step, .. }));
        }
        let mut none: Vec<Step> = Vec::new();
        assert!(apply_action(&mut none, 0, StepAction::Skip, "t").is_err());
        assert!(s.iter().all(|step| !step.start_time.is_set()));
    }

    #[test]
    fn action_parse_accepts_checkin_words() {
        assert_eq!("check-in".parse::<StepAction>(), Ok(StepAction::Start));
        assert_eq!("Check_Out".parse::<StepAction>(), Ok(StepAction::Finish));
        assert!("pause".parse::<StepAction>().is_err());
    }

    #[test]
    fn rejected_action_persists_nothing() {
        let engine = engine();
        let (before, _, second) = two_step_project(&engine);
        let err = engine.step_action(&second, StepAction::Start, None).unwrap_err();
        assert!(matches!(err, RunCardError::OrderingViolation { .. }));
        assert_eq!(engine.project(&before.id).unwrap(), before);
    }

    #[test]
    fn committed_action_updates_cached_status_and_timestamp() {
        let engine = engine();
        let (_, first, _) = two_step_project(&engine);
        engine.clock().advance(chrono::Duration::hours(1));
        let remark = StepPatch::new().set(crate::model::StepField::ExecNote, "bench 3");
        let step = engine
            .step_action(&first, StepAction::Start, Some(&remark))
            .unwrap();
        assert_eq!(step.start_time.as_str(), "2026-06-01 10:00:00");
        assert_eq!(step.exec_note, "bench 3");

        let project = engine.project(&first.project_id).unwrap();
        assert_eq!(project.status, ProjectStatus::InProcess);
        assert_eq!(project.status, project_status(&project));
        assert_eq!(project.updated_at, engine.clock().now());
    }

    #[test]
    fn failed_save_leaves_store_untouched() {
        let engine = engine();
        let (before, first, _) = two_step_project(&engine);
        engine.store().fail_saves(true);
        let err = engine.step_action(&first, StepAction::Start, None).unwrap_err();
        assert!(matches!(err, RunCardError::StoreUnavailable(_)));
        engine.store().fail_saves(false);
        assert_eq!(engine.project(&before.id).unwrap(), before);
    }

    #[test]
    fn locate_and_resolve_agree() {
        let engine = engine();
        let (_, _, second) = two_step_project(&engine);
        assert_eq!(engine.locate_rid(&second.rid).unwrap(), second);
        assert_eq!(engine.resolve_row_key(RowKey::new(0, 0, 0, 1)).unwrap(), second);
        assert!(matches!(
            engine.resolve_row_key(RowKey::new(0, 0, 0, 2)),
            Err(RunCardError::InvalidRowId(_))
        ));
    }

    #[test]
    fn prune_filters_by_original_positions() {
        let engine = engine();
        let (project, first, second) = two_step_project(&engine);
        let mut keys = HashSet::new();
        keys.insert(RowKey::new(0, 0, 0, 0));
        keys.insert(RowKey::new(0, 0, 0, 1));
        let (survivors, report) =
            prune_rows(vec![project], clock().now(), |key, _| keys.contains(key));
        assert!(survivors.is_empty());
        assert_eq!(report.steps_removed, 2);
        assert_eq!(report.projects_pruned, 1);
        assert_ne!(first.rid, second.rid);
    }

    #[test]
    fn bulk_delete_reports_stale_keys_and_saves_nothing_without_hits() {
        let engine = engine();
        let (before, _, _) = two_step_project(&engine);
        let keys: HashSet<RowKey> = [RowKey::new(3, 0, 0, 0)].into_iter().collect();
        let report = engine.bulk_delete(&keys).unwrap();
        assert_eq!(report.steps_removed, 0);
        assert_eq!(report.unmatched, vec!["3-0-0-0".to_string()]);
        assert_eq!(engine.project(&before.id).unwrap(), before);
    }

    #[test]
    fn delete_by_rid_keeps_siblings() {
        let engine = engine();
        let (_, first, second) = two_step_project(&engine);
        let rids: HashSet<String> = [first.rid.clone()].into_iter().collect();
        let report = engine.delete_by_rids(&rids).unwrap();
        assert_eq!(report.steps_removed, 1);
        assert_eq!(report.groups_pruned, 0);
        let project = engine.project(&second.project_id).unwrap();
        let remaining: Vec<&str> = project.steps().map(|s| s.rid.as_str()).collect();
        assert_eq!(remaining, vec![second.rid.as_str()]);
    }

    #[test]
    fn template_lifecycle() {
        let engine = engine();
        let (project, first, _) = two_step_project(&engine);
        engine.step_action(&first, StepAction::Start, None).unwrap();

        assert!(matches!(
            engine.save_template("  ", &project.id, &first.lot_id),
            Err(RunCardError::Validation(_))
        ));
        let saved = engine.save_template("two-step", &project.id, &first.lot_id).unwrap();
        assert_eq!(saved.step_count(), 2);

        let other_lot = engine
            .mutate_project(&project.id, |p| Ok(hierarchy::add_lot(p, "L2")))
            .unwrap();
        engine.apply_template(&project.id, &other_lot, "two-step").unwrap();
        let project = engine.project(&project.id).unwrap();
        let lot = project.lot(&other_lot).unwrap();
        assert_eq!(lot.steps().count(), 2);
        assert!(lot.steps().all(|s| !s.start_time.is_set()));

        assert!(matches!(
            engine.apply_template(&project.id, &other_lot, "missing"),
            Err(RunCardError::NotFound { kind: EntityKind::Template, .. })
        ));
        engine.delete_template("two-step").unwrap();
        assert!(engine.templates().unwrap().is_empty());
        assert!(engine.delete_template("two-step").is_err());
    }
}
