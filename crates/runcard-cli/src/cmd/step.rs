//! `rc step`: add, remove, duplicate, move and edit steps.
//!
//! Targets are a composite row id from `rc list` / `rc show` or a `_rid`.

use super::{Workspace, find_project, parse_assignment, resolve_step};
use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use runcard_core::catalog::{StressCatalog, select_field, stress_catalog_or_empty};
use runcard_core::hierarchy::{self, DeleteStepOutcome};
use runcard_core::model::{Step, StepField, StepPatch};
use runcard_core::StepLocation;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StepArgs {
    #[command(subcommand)]
    pub command: StepCommand,
}

#[derive(Subcommand, Debug)]
pub enum StepCommand {
    /// Append an empty step to a stress group.
    Add {
        /// Project id or Product ID.
        project: String,
        lot: String,
        stress: String,
    },
    /// Remove a step. A group's last step is replaced by an empty one.
    Rm { target: String },
    /// Copy a step (new `_rid`), inserted right after it.
    Dup { target: String },
    /// Move a step to a zero-based position within its group.
    Move { target: String, index: usize },
    /// Set descriptive fields, as `FIELD=VALUE`.
    ///
    /// Selecting `stress` clears type, operation and condition; `type` clears
    /// operation and condition; `operation` fills condition from the catalog.
    Set {
        target: String,
        #[arg(required = true, value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
        /// Write values as given, without catalog-driven resets.
        #[arg(long)]
        no_cascade: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepOutput {
    action: &'static str,
    #[serde(flatten)]
    location: StepLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<Step>,
}

/// Fold `FIELD=VALUE` assignments into one patch, each selection seeing the
/// effect of the ones before it.
fn build_patch(
    current: &Step,
    assignments: &[String],
    catalog: &StressCatalog,
    cascade: bool,
) -> Result<StepPatch> {
    let mut working = current.clone();
    let mut combined = StepPatch::new();
    for raw in assignments {
        let (name, value) = parse_assignment(raw)?;
        let field: StepField = name
            .parse()
            .with_context(|| format!("'{name}' is not an editable step field"))?;
        let patch = if cascade {
            select_field(&working, field, &value, catalog)
        } else {
            StepPatch::new().set(field, value)
        };
        patch.apply_to(&mut working);
        for (f, v) in patch.iter() {
            combined = combined.set(f, v);
        }
    }
    Ok(combined)
}

fn sibling(at: &StepLocation, rid: String) -> StepLocation {
    StepLocation {
        rid,
        ..at.clone()
    }
}

pub fn run_step(args: &StepArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let engine = &ws.engine;
    let result = match &args.command {
        StepCommand::Add {
            project,
            lot,
            stress,
        } => {
            let project = find_project(engine, project)?;
            let rid = engine.mutate_project(&project.id, |p| hierarchy::add_step(p, lot, stress))?;
            StepOutput {
                action: "added",
                location: StepLocation {
                    project_id: project.id,
                    lot_id: lot.clone(),
                    stress_id: stress.clone(),
                    rid,
                },
                step: None,
            }
        }
        StepCommand::Rm { target } => {
            let at = resolve_step(engine, target)?;
            let outcome = engine.mutate_project(&at.project_id, |p| {
                hierarchy::delete_step(p, &at.lot_id, &at.stress_id, &at.rid)
            })?;
            match outcome {
                DeleteStepOutcome::Removed => StepOutput {
                    action: "removed",
                    location: at,
                    step: None,
                },
                DeleteStepOutcome::Replaced { rid } => StepOutput {
                    action: "replaced",
                    location: sibling(&at, rid),
                    step: None,
                },
            }
        }
        StepCommand::Dup { target } => {
            let at = resolve_step(engine, target)?;
            let rid = engine.mutate_project(&at.project_id, |p| {
                hierarchy::duplicate_step(p, &at.lot_id, &at.stress_id, &at.rid)
            })?;
            StepOutput {
                action: "duplicated",
                location: sibling(&at, rid),
                step: None,
            }
        }
        StepCommand::Move { target, index } => {
            let at = resolve_step(engine, target)?;
            engine.mutate_project(&at.project_id, |p| {
                hierarchy::move_step(p, &at.lot_id, &at.stress_id, &at.rid, *index)
            })?;
            StepOutput {
                action: "moved",
                location: at,
                step: None,
            }
        }
        StepCommand::Set {
            target,
            assignments,
            no_cascade,
        } => {
            let at = resolve_step(engine, target)?;
            let project = engine.project(&at.project_id)?;
            let current = project
                .lot(&at.lot_id)
                .and_then(|l| l.stress(&at.stress_id))
                .and_then(|g| g.step(&at.rid))
                .with_context(|| format!("step {} vanished", at.rid))?;
            let catalog = if *no_cascade {
                StressCatalog::new()
            } else {
                stress_catalog_or_empty(&ws.catalog)
            };
            let patch = build_patch(current, assignments, &catalog, !*no_cascade)?;
            let step = engine.patch_step(&at, &patch)?;
            StepOutput {
                action: "updated",
                location: at,
                step: Some(step),
            }
        }
    };

    render(output, &result, |r, w| {
        writeln!(w, "✓ Step {} {}", r.location.rid, r.action)?;
        if let Some(step) = &r.step {
            for field in StepField::ALL {
                let value = step.field(field);
                if !value.is_empty() {
                    writeln!(w, "  {field}: {value}")?;
                }
            }
        }
        Ok(())
    })
}
