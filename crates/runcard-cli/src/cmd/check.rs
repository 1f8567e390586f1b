//! `rc start|finish|skip|unskip`: ordered check-in/out of one step.

use super::{Workspace, resolve_step};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use runcard_core::model::{Step, StepField, StepPatch};
use runcard_core::status::{StepStatus, step_status};
use runcard_core::{StepAction, StepLocation};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Step row id (`0-1-0-2`) or `_rid`.
    pub target: String,

    /// Remark stored on the step with the action.
    #[arg(short, long)]
    pub remark: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutput {
    action: StepAction,
    #[serde(flatten)]
    location: StepLocation,
    status: StepStatus,
    step: Step,
}

pub fn run_check(
    action: StepAction,
    args: &CheckArgs,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let at = resolve_step(&ws.engine, &args.target)?;
    let patch = args
        .remark
        .as_deref()
        .map(|remark| StepPatch::new().set(StepField::ExecNote, remark.trim()));
    let step = ws.engine.step_action(&at, action, patch.as_ref())?;

    let result = CheckOutput {
        action,
        location: at,
        status: step_status(&step),
        step,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ {} {} → {}", r.action, r.location.rid, r.status)?;
        writeln!(w, "  start: {}", r.step.start_time)?;
        writeln!(w, "  end:   {}", r.step.end_time)
    })
}
