//! Structural edits on the Project → Lot → StressGroup → Step tree.
//!
//! Every operation works on a `&mut Project` that the caller owns as a
//! transient copy; [`crate::sync::SyncEngine`] decides when the result is
//! committed. Operations address containers by identity, never by position.
//!
//! Invariants kept here:
//! - a project always has at least one lot,
//! - a lot always has at least one stress group,
//! - a stress group always has at least one step.
//!
//! Only bulk-delete reconciliation (see [`crate::sync::prune_rows`]) may empty
//! a container, and it prunes the emptied container in the same pass.

use crate::clock::Clock;
use crate::error::{EntityKind, Result, RunCardError};
use crate::ids;
use crate::model::{Header, Lot, Project, Step, StepPatch, StressGroup};
use crate::status::{ProjectStatus, refresh_project_status};

/// Label given to a duplicated lot whose source had no label.
pub const DEFAULT_LOT_LABEL: &str = "NewLOT";

/// Suffix appended to the label of a duplicated lot.
pub const COPY_SUFFIX: &str = "_Copy";

/// Result of [`delete_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStepOutcome {
    /// The step was removed; siblings remain.
    Removed,
    /// The step was the group's last; a fresh empty step took its place.
    Replaced { rid: String },
}

/// Build a new project, validating the required header fields.
///
/// # Errors
///
/// [`RunCardError::Validation`] if a required field is blank or `lots` is
/// empty.
pub fn new_project(
    header: Header,
    lots: Vec<Lot>,
    required_fields: &[String],
    clock: &dyn Clock,
) -> Result<Project> {
    let missing = header.missing(required_fields);
    if !missing.is_empty() {
        return Err(RunCardError::Validation(format!(
            "missing required header field(s): {}",
            missing.join(", ")
        )));
    }
    if lots.is_empty() {
        return Err(RunCardError::Validation(
            "a project needs at least one lot".into(),
        ));
    }
    let now = clock.now();
    let mut project = Project {
        id: ids::project_id(),
        header,
        lots,
        status: ProjectStatus::Init,
        created_at: now,
        updated_at: now,
    };
    refresh_project_status(&mut project);
    Ok(project)
}

pub(crate) fn lot_mut<'a>(project: &'a mut Project, lot_id: &str) -> Result<&'a mut Lot> {
    project
        .lots
        .iter_mut()
        .find(|l| l.id == lot_id)
        .ok_or_else(|| RunCardError::not_found(EntityKind::Lot, lot_id))
}

pub(crate) fn stress_mut<'a>(
    project: &'a mut Project,
    lot_id: &str,
    stress_id: &str,
) -> Result<&'a mut StressGroup> {
    lot_mut(project, lot_id)?
        .stresses
        .iter_mut()
        .find(|s| s.id == stress_id)
        .ok_or_else(|| RunCardError::not_found(EntityKind::Stress, stress_id))
}

fn step_index(group: &StressGroup, rid: &str) -> Result<usize> {
    group
        .step_index(rid)
        .ok_or_else(|| RunCardError::not_found(EntityKind::Step, rid))
}

// ---------------------------------------------------------------------------
// Lots
// ---------------------------------------------------------------------------

/// Append a fresh lot (one group, one empty step). Returns its id.
pub fn add_lot(project: &mut Project, label: &str) -> String {
    let lot = Lot::fresh(label);
    let id = lot.id.clone();
    project.lots.push(lot);
    id
}

/// Deep-copy a lot with fresh ids at every level, appended at the end.
///
/// The copy's label is the source label (or [`DEFAULT_LOT_LABEL`]) plus
/// [`COPY_SUFFIX`]. All step field values, timestamps included, are kept.
///
/// # Errors
///
/// [`RunCardError::NotFound`] if `lot_id` is not in the project.
pub fn duplicate_lot(project: &mut Project, lot_id: &str) -> Result<String> {
    let source = project
        .lot(lot_id)
        .ok_or_else(|| RunCardError::not_found(EntityKind::Lot, lot_id))?;
    let base = if source.lot_id.is_empty() {
        DEFAULT_LOT_LABEL
    } else {
        source.lot_id.as_str()
    };
    let copy = Lot {
        id: ids::lot_id(),
        lot_id: format!("{base}{COPY_SUFFIX}"),
        stresses: source.stresses.iter().map(reidentify_group).collect(),
    };
    let id = copy.id.clone();
    project.lots.push(copy);
    Ok(id)
}

fn reidentify_group(group: &StressGroup) -> StressGroup {
    StressGroup {
        id: ids::stress_id(),
        stress: group.stress.clone(),
        row_data: group
            .row_data
            .iter()
            .map(|step| Step {
                rid: ids::step_rid(),
                ..step.clone()
            })
            .collect(),
    }
}

/// Remove a lot and return the lot id that should be selected afterwards.
///
/// Selection stays put unless the removed lot was selected (or nothing was),
/// in which case it falls back to the new first lot.
///
/// # Errors
///
/// [`RunCardError::StructuralRefusal`] when this is the project's only lot,
/// [`RunCardError::NotFound`] when `lot_id` is unknown.
pub fn delete_lot(project: &mut Project, lot_id: &str, selected: Option<&str>) -> Result<String> {
    let index = project
        .lots
        .iter()
        .position(|l| l.id == lot_id)
        .ok_or_else(|| RunCardError::not_found(EntityKind::Lot, lot_id))?;
    if project.lots.len() == 1 {
        return Err(RunCardError::StructuralRefusal(
            "a project must keep at least one lot".into(),
        ));
    }
    project.lots.remove(index);
    let next = match selected {
        Some(current) if current != lot_id && project.lot(current).is_some() => current.to_string(),
        _ => project.lots[0].id.clone(),
    };
    Ok(next)
}

/// Change a lot's user label.
///
/// # Errors
///
/// [`RunCardError::NotFound`] when `lot_id` is unknown.
pub fn rename_lot(project: &mut Project, lot_id: &str, label: &str) -> Result<()> {
    lot_mut(project, lot_id)?.lot_id = label.to_string();
    Ok(())
}

// ---------------------------------------------------------------------------
// Stress groups
// ---------------------------------------------------------------------------

/// Append a fresh stress group (one empty step) to a lot. Returns its id.
///
/// # Errors
///
/// [`RunCardError::NotFound`] when `lot_id` is unknown.
pub fn add_stress(project: &mut Project, lot_id: &str) -> Result<String> {
    let group = StressGroup::fresh();
    let id = group.id.clone();
    lot_mut(project, lot_id)?.stresses.push(group);
    Ok(id)
}

/// Remove a stress group.
///
/// # Errors
///
/// [`RunCardError::StructuralRefusal`] for the lot's last group,
/// [`RunCardError::NotFound`] for unknown ids.
pub fn delete_stress(project: &mut Project, lot_id: &str, stress_id: &str) -> Result<()> {
    let lot = lot_mut(project, lot_id)?;
    let index = lot
        .stresses
        .iter()
        .position(|s| s.id == stress_id)
        .ok_or_else(|| RunCardError::not_found(EntityKind::Stress, stress_id))?;
    if lot.stresses.len() == 1 {
        return Err(RunCardError::StructuralRefusal(
            "a lot must keep at least one stress group".into(),
        ));
    }
    lot.stresses.remove(index);
    Ok(())
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Append a fresh empty step to a group. Returns its `_rid`.
///
/// # Errors
///
/// [`RunCardError::NotFound`] for unknown ids.
pub fn add_step(project: &mut Project, lot_id: &str, stress_id: &str) -> Result<String> {
    let rid = ids::step_rid();
    stress_mut(project, lot_id, stress_id)?
        .row_data
        .push(Step::empty(rid.clone()));
    Ok(rid)
}

/// Remove a step. The group's last step is replaced, never removed.
///
/// # Errors
///
/// [`RunCardError::NotFound`] for unknown ids.
pub fn delete_step(
    project: &mut Project,
    lot_id: &str,
    stress_id: &str,
    rid: &str,
) -> Result<DeleteStepOutcome> {
    let group = stress_mut(project, lot_id, stress_id)?;
    let index = step_index(group, rid)?;
    if group.row_data.len() == 1 {
        let fresh = ids::step_rid();
        group.row_data = vec![Step::empty(fresh.clone())];
        return Ok(DeleteStepOutcome::Replaced { rid: fresh });
    }
    group.row_data.remove(index);
    Ok(DeleteStepOutcome::Removed)
}

/// Copy a step with a fresh `_rid`, appended at the end of its group.
///
/// # Errors
///
/// [`RunCardError::NotFound`] for unknown ids.
pub fn duplicate_step(
    project: &mut Project,
    lot_id: &str,
    stress_id: &str,
    rid: &str,
) -> Result<String> {
    let group = stress_mut(project, lot_id, stress_id)?;
    let index = step_index(group, rid)?;
    let copy = Step {
        rid: ids::step_rid(),
        ..group.row_data[index].clone()
    };
    let new_rid = copy.rid.clone();
    group.row_data.push(copy);
    Ok(new_rid)
}

/// Move a step to `to_index` within its group (clamped to the group's end).
///
/// # Errors
///
/// [`RunCardError::StructuralRefusal`] when the new order would leave a
/// started step behind an unfinished one, [`RunCardError::NotFound`] for
/// unknown ids.
pub fn move_step(
    project: &mut Project,
    lot_id: &str,
    stress_id: &str,
    rid: &str,
    to_index: usize,
) -> Result<()> {
    let group = stress_mut(project, lot_id, stress_id)?;
    let from = step_index(group, rid)?;
    let mut reordered = group.row_data.clone();
    let step = reordered.remove(from);
    let to = to_index.min(reordered.len());
    reordered.insert(to, step);
    if !ordering_consistent(&reordered) {
        return Err(RunCardError::StructuralRefusal(
            "move would place a started step after an unfinished one".into(),
        ));
    }
    group.row_data = reordered;
    Ok(())
}

/// True when every started step follows a step that has an `endTime`.
#[must_use]
pub fn ordering_consistent(steps: &[Step]) -> bool {
    steps
        .windows(2)
        .all(|pair| !pair[1].start_time.is_set() || pair[0].end_time.is_set())
}

/// Merge a descriptive-field patch into one step.
///
/// # Errors
///
/// [`RunCardError::NotFound`] for unknown ids.
pub fn patch_step(
    project: &mut Project,
    lot_id: &str,
    stress_id: &str,
    rid: &str,
    patch: &StepPatch,
) -> Result<()> {
    let group = stress_mut(project, lot_id, stress_id)?;
    let index = step_index(group, rid)?;
    patch.apply_to(&mut group.row_data[index]);
    Ok(())
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Set (or clear, with an empty value) a header field.
///
/// # Errors
///
/// [`RunCardError::Validation`] when clearing a required field.
pub fn set_header_field(
    project: &mut Project,
    field: &str,
    value: &str,
    required_fields: &[String],
) -> Result<()> {
    if value.trim().is_empty() {
        if required_fields.iter().any(|f| f == field) {
            return Err(RunCardError::Validation(format!(
                "'{field}' is required and cannot be cleared"
            )));
        }
        project.header.remove(field);
    } else {
        project.header.set(field, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{StepField, TimeMark};
    use crate::model::project::FIELD_PRODUCT_ID;
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock::new(
            NaiveDate::from_ymd_opt(2026, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn required() -> Vec<String> {
        vec![FIELD_PRODUCT_ID.to_string()]
    }

    fn project() -> Project {
        let mut header = Header::new();
        header.set(FIELD_PRODUCT_ID, "P-100");
        new_project(header, vec![Lot::fresh("L1")], &required(), &clock()).unwrap()
    }

    fn first_ids(p: &Project) -> (String, String, String) {
        let lot = &p.lots[0];
        let group = &lot.stresses[0];
        (lot.id.clone(), group.id.clone(), group.row_data[0].rid.clone())
    }

    #[test]
    fn new_project_requires_product_id() {
        let err = new_project(Header::new(), vec![Lot::fresh("")], &required(), &clock())
            .unwrap_err();
        assert!(matches!(err, RunCardError::Validation(ref m) if m.contains("Product ID")));
    }

    #[test]
    fn new_project_stamps_creation_and_status() {
        let p = project();
        assert!(p.id.starts_with("proj_"));
        assert_eq!(p.created_at, p.updated_at);
        assert_eq!(p.status, ProjectStatus::Init);
    }

    #[test]
    fn add_lot_appends_fresh_lot() {
        let mut p = project();
        let id = add_lot(&mut p, "L2");
        assert_eq!(p.lots.len(), 2);
        assert_eq!(p.lots[1].id, id);
        assert_eq!(p.lots[1].stresses[0].row_data.len(), 1);
    }

    #[test]
    fn duplicate_lot_regenerates_every_identity() {
        let mut p = project();
        let (lot_id, stress_id, rid) = first_ids(&p);
        patch_step(
            &mut p,
            &lot_id,
            &stress_id,
            &rid,
            &StepPatch::new().set(StepField::Stress, "HTOL"),
        )
        .unwrap();

        let copy_id = duplicate_lot(&mut p, &lot_id).unwrap();
        let copy = p.lot(&copy_id).unwrap();
        assert_eq!(copy.lot_id, "L1_Copy");
        assert_ne!(copy.stresses[0].id, stress_id);
        assert_ne!(copy.stresses[0].row_data[0].rid, rid);
        assert_eq!(copy.stresses[0].row_data[0].stress, "HTOL");
    }

    #[test]
    fn duplicate_unlabelled_lot_gets_default_label() {
        let mut p = project();
        let id = add_lot(&mut p, "");
        let copy_id = duplicate_lot(&mut p, &id).unwrap();
        assert_eq!(p.lot(&copy_id).unwrap().lot_id, "NewLOT_Copy");
    }

    #[test]
    fn delete_only_lot_is_refused() {
        let mut p = project();
        let (lot_id, _, _) = first_ids(&p);
        let err = delete_lot(&mut p, &lot_id, Some(&lot_id)).unwrap_err();
        assert!(matches!(err, RunCardError::StructuralRefusal(_)));
        assert_eq!(p.lots.len(), 1);
    }

    #[test]
    fn delete_selected_lot_falls_back_to_first() {
        let mut p = project();
        let (first, _, _) = first_ids(&p);
        let second = add_lot(&mut p, "L2");
        let third = add_lot(&mut p, "L3");

        let selected = delete_lot(&mut p, &third, Some(&third)).unwrap();
        assert_eq!(selected, first);

        let selected = delete_lot(&mut p, &first, Some(&second)).unwrap();
        assert_eq!(selected, second);
        assert_eq!(p.lots.len(), 1);
    }

    #[test]
    fn delete_last_step_replaces_it() {
        let mut p = project();
        let (lot_id, stress_id, rid) = first_ids(&p);
        let outcome = delete_step(&mut p, &lot_id, &stress_id, &rid).unwrap();
        let DeleteStepOutcome::Replaced { rid: fresh } = outcome else {
            panic!("expected replacement, got {outcome:?}");
        };
        let rows = &p.lots[0].stresses[0].row_data;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rid, fresh);
        assert_ne!(fresh, rid);
    }

    #[test]
    fn delete_step_with_siblings_removes_it() {
        let mut p = project();
        let (lot_id, stress_id, rid) = first_ids(&p);
        let other = add_step(&mut p, &lot_id, &stress_id).unwrap();
        let outcome = delete_step(&mut p, &lot_id, &stress_id, &rid).unwrap();
        assert_eq!(outcome, DeleteStepOutcome::Removed);
        let rows = &p.lots[0].stresses[0].row_data;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rid, other);
    }

    #[test]
    fn duplicate_step_appends_to_group() {
        let mut p = project();
        let (lot_id, stress_id, first) = first_ids(&p);
        let last = add_step(&mut p, &lot_id, &stress_id).unwrap();
        patch_step(
            &mut p,
            &lot_id,
            &stress_id,
            &first,
            &StepPatch::new().set(StepField::Operation, "Readout"),
        )
        .unwrap();

        let copy = duplicate_step(&mut p, &lot_id, &stress_id, &first).unwrap();
        let rids: Vec<&str> = p.lots[0].stresses[0]
            .row_data
            .iter()
            .map(|s| s.rid.as_str())
            .collect();
        assert_eq!(rids, vec![first.as_str(), last.as_str(), copy.as_str()]);
        assert_eq!(p.lots[0].stresses[0].row_data[2].operation, "Readout");
    }

    #[test]
    fn delete_last_stress_group_is_refused() {
        let mut p = project();
        let (lot_id, stress_id, _) = first_ids(&p);
        assert!(matches!(
            delete_stress(&mut p, &lot_id, &stress_id),
            Err(RunCardError::StructuralRefusal(_))
        ));
        let extra = add_stress(&mut p, &lot_id).unwrap();
        delete_stress(&mut p, &lot_id, &stress_id).unwrap();
        assert_eq!(p.lots[0].stresses.len(), 1);
        assert_eq!(p.lots[0].stresses[0].id, extra);
    }

    #[test]
    fn move_step_refuses_started_behind_unfinished() {
        let mut p = project();
        let (lot_id, stress_id, first) = first_ids(&p);
        let second = add_step(&mut p, &lot_id, &stress_id).unwrap();
        {
            let group = stress_mut(&mut p, &lot_id, &stress_id).unwrap();
            group.row_data[0].start_time = TimeMark::from("2026-06-01 09:00:00");
        }
        let err = move_step(&mut p, &lot_id, &stress_id, &first, 1).unwrap_err();
        assert!(matches!(err, RunCardError::StructuralRefusal(_)));

        move_step(&mut p, &lot_id, &stress_id, &second, 5).unwrap();
        let rows = &p.lots[0].stresses[0].row_data;
        assert_eq!(rows[0].rid, first);
        assert_eq!(rows[1].rid, second);
    }

    #[test]
    fn move_unstarted_steps_freely() {
        let mut p = project();
        let (lot_id, stress_id, first) = first_ids(&p);
        let second = add_step(&mut p, &lot_id, &stress_id).unwrap();
        move_step(&mut p, &lot_id, &stress_id, &second, 0).unwrap();
        let rows = &p.lots[0].stresses[0].row_data;
        assert_eq!(rows[0].rid, second);
        assert_eq!(rows[1].rid, first);
    }

    #[test]
    fn required_header_field_cannot_be_cleared() {
        let mut p = project();
        assert!(set_header_field(&mut p, FIELD_PRODUCT_ID, " ", &required()).is_err());
        set_header_field(&mut p, "Owner", "lee", &required()).unwrap();
        assert_eq!(p.header.get("Owner"), Some("lee"));
        set_header_field(&mut p, "Owner", "", &required()).unwrap();
        assert_eq!(p.header.get("Owner"), None);
    }

    #[test]
    fn unknown_ids_report_their_level() {
        let mut p = project();
        let (lot_id, _, _) = first_ids(&p);
        assert!(matches!(
            add_step(&mut p, "nope", "x"),
            Err(RunCardError::NotFound { kind: EntityKind::Lot, .. })
        ));
        assert!(matches!(
            add_step(&mut p, &lot_id, "x"),
            Err(RunCardError::NotFound { kind: EntityKind::Stress, .. })
        ));
    }
}
