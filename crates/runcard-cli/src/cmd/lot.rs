//! `rc lot`: add, duplicate, remove and relabel lots.

use super::{Workspace, find_project};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::{Args, Subcommand};
use runcard_core::hierarchy;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct LotArgs {
    #[command(subcommand)]
    pub command: LotCommand,
}

#[derive(Subcommand, Debug)]
pub enum LotCommand {
    /// Append a lot with one stress group and one empty step.
    Add {
        /// Project id or Product ID.
        project: String,
        /// Lot label.
        #[arg(long, default_value = "")]
        label: String,
    },
    /// Deep-copy a lot (fresh ids, timestamps kept), appended at the end.
    Dup { project: String, lot: String },
    /// Remove a lot. The project's last lot cannot be removed.
    Rm {
        project: String,
        lot: String,
        /// Currently selected lot; echoed back as the next selection.
        #[arg(long)]
        selected: Option<String>,
    },
    /// Change a lot's label.
    Rename {
        project: String,
        lot: String,
        label: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LotOutput {
    project_id: String,
    action: &'static str,
    lot: String,
    /// Lot to select after a removal.
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<String>,
}

pub fn run_lot(args: &LotArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let result = match &args.command {
        LotCommand::Add { project, label } => {
            let project = find_project(&ws.engine, project)?;
            let lot = ws
                .engine
                .mutate_project(&project.id, |p| Ok(hierarchy::add_lot(p, label.trim())))?;
            LotOutput {
                project_id: project.id,
                action: "added",
                lot,
                selected: None,
            }
        }
        LotCommand::Dup { project, lot } => {
            let project = find_project(&ws.engine, project)?;
            let copy = ws
                .engine
                .mutate_project(&project.id, |p| hierarchy::duplicate_lot(p, lot))?;
            LotOutput {
                project_id: project.id,
                action: "duplicated",
                lot: copy,
                selected: None,
            }
        }
        LotCommand::Rm {
            project,
            lot,
            selected,
        } => {
            let project = find_project(&ws.engine, project)?;
            let next = ws.engine.mutate_project(&project.id, |p| {
                hierarchy::delete_lot(p, lot, selected.as_deref())
            })?;
            LotOutput {
                project_id: project.id,
                action: "removed",
                lot: lot.clone(),
                selected: Some(next),
            }
        }
        LotCommand::Rename {
            project,
            lot,
            label,
        } => {
            let project = find_project(&ws.engine, project)?;
            ws.engine
                .mutate_project(&project.id, |p| hierarchy::rename_lot(p, lot, label.trim()))?;
            LotOutput {
                project_id: project.id,
                action: "renamed",
                lot: lot.clone(),
                selected: None,
            }
        }
    };

    render(output, &result, |r, w| {
        writeln!(w, "✓ Lot {} {} in {}", r.lot, r.action, r.project_id)?;
        if let Some(next) = &r.selected {
            writeln!(w, "  selected: {next}")?;
        }
        Ok(())
    })
}
