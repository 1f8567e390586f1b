//! `rc lots`: one line per lot with status and progress.

use super::Workspace;
use crate::output::{OutputMode, pretty_rule, render_mode};
use anyhow::Result;
use clap::Args;
use runcard_core::flatten::{LotSummary, lot_summaries};
use runcard_core::status::ProjectStatus;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct LotsArgs {
    /// Only lots with this status (init, in-process, completed).
    #[arg(long)]
    pub status: Option<ProjectStatus>,
}

fn render_text(lots: &[LotSummary], w: &mut dyn Write) -> io::Result<()> {
    for l in lots {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            l.project_id, l.lot_ref, l.product_id, l.lot_label, l.status, l.progress
        )?;
    }
    Ok(())
}

fn render_pretty(lots: &[LotSummary], w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{:<14} {:<10} {:<14} {:<11} {:>9}  {}",
        "PRODUCT ID", "LOT", "OWNER", "STATUS", "PROGRESS", "CREATED"
    )?;
    pretty_rule(w)?;
    for l in lots {
        let progress = format!("{} {}%", l.progress, l.progress.percent());
        writeln!(
            w,
            "{:<14} {:<10} {:<14} {:<11} {:>9}  {}",
            l.product_id,
            l.lot_label,
            l.owner,
            l.status.to_string(),
            progress,
            l.created_date
        )?;
    }
    if lots.is_empty() {
        writeln!(w, "  (no lots)")?;
    }
    Ok(())
}

pub fn run_lots(args: &LotsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let mut lots = lot_summaries(&ws.engine.projects()?);
    if let Some(wanted) = args.status {
        lots.retain(|l| l.status == wanted);
    }
    render_mode(
        output,
        &lots,
        |l, w| render_text(l, w),
        |l, w| render_pretty(l, w),
    )
}
