//! `rc stats`: dashboard counters and the completed-lot report.

use super::Workspace;
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use runcard_core::status::{CompletedLot, StatusCounts, completed_lots};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Also list every completed lot with its final check-out.
    #[arg(long)]
    pub completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsOutput {
    #[serde(flatten)]
    counts: StatusCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_lots: Option<Vec<CompletedLot>>,
}

fn render_text(stats: &StatsOutput, w: &mut dyn Write) -> io::Result<()> {
    let c = &stats.counts;
    writeln!(w, "total\t{}", c.total)?;
    writeln!(w, "completed\t{}", c.completed)?;
    writeln!(w, "in-process\t{}", c.in_process)?;
    writeln!(w, "init\t{}", c.init)?;
    for lot in stats.completed_lots.iter().flatten() {
        writeln!(
            w,
            "lot\t{}\t{}\t{}\t{}",
            lot.product_id, lot.lot_label, lot.created_date, lot.final_checkout
        )?;
    }
    Ok(())
}

fn render_pretty(stats: &StatsOutput, w: &mut dyn Write) -> io::Result<()> {
    let c = &stats.counts;
    pretty_section(w, "Lots")?;
    pretty_kv(w, "Total", c.total.to_string())?;
    pretty_kv(w, "Completed", c.completed.to_string())?;
    pretty_kv(w, "In process", c.in_process.to_string())?;
    pretty_kv(w, "Init", c.init.to_string())?;
    if let Some(lots) = &stats.completed_lots {
        writeln!(w)?;
        writeln!(
            w,
            "{:<16} {:<12} {:<12} {}",
            "PRODUCT ID", "LOT", "CREATED", "FINAL CHECK-OUT"
        )?;
        pretty_rule(w)?;
        for lot in lots {
            let checkout = if lot.final_checkout.is_empty() {
                "(all skipped)"
            } else {
                lot.final_checkout.as_str()
            };
            writeln!(
                w,
                "{:<16} {:<12} {:<12} {checkout}",
                lot.product_id, lot.lot_label, lot.created_date
            )?;
        }
    }
    Ok(())
}

pub fn run_stats(args: &StatsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let projects = ws.engine.projects()?;
    let stats = StatsOutput {
        counts: StatusCounts::of_lots(&projects),
        completed_lots: args.completed.then(|| completed_lots(&projects)),
    };
    render_mode(output, &stats, render_text, render_pretty)
}
