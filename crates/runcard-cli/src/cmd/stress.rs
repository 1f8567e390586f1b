//! `rc stress`: add and remove stress groups within a lot.

use super::{Workspace, find_project};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::{Args, Subcommand};
use runcard_core::hierarchy;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StressArgs {
    #[command(subcommand)]
    pub command: StressCommand,
}

#[derive(Subcommand, Debug)]
pub enum StressCommand {
    /// Append a stress group holding one empty step.
    Add {
        /// Project id or Product ID.
        project: String,
        lot: String,
    },
    /// Remove a stress group. A lot's last group cannot be removed.
    Rm {
        project: String,
        lot: String,
        stress: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StressOutput {
    project_id: String,
    lot_id: String,
    stress_id: String,
    action: &'static str,
}

pub fn run_stress(args: &StressArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let result = match &args.command {
        StressCommand::Add { project, lot } => {
            let project = find_project(&ws.engine, project)?;
            let stress_id = ws
                .engine
                .mutate_project(&project.id, |p| hierarchy::add_stress(p, lot))?;
            StressOutput {
                project_id: project.id,
                lot_id: lot.clone(),
                stress_id,
                action: "added",
            }
        }
        StressCommand::Rm {
            project,
            lot,
            stress,
        } => {
            let project = find_project(&ws.engine, project)?;
            ws.engine
                .mutate_project(&project.id, |p| hierarchy::delete_stress(p, lot, stress))?;
            StressOutput {
                project_id: project.id,
                lot_id: lot.clone(),
                stress_id: stress.clone(),
                action: "removed",
            }
        }
    };

    render(output, &result, |r, w| {
        writeln!(w, "✓ Stress group {} {} in lot {}", r.stress_id, r.action, r.lot_id)
    })
}
