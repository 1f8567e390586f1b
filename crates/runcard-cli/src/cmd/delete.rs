//! `rc delete`: bulk-delete selected step rows, pruning emptied groups, lots
//! and projects.

use super::Workspace;
use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result, bail};
use clap::Args;
use runcard_core::flatten::RowKey;
use runcard_core::sync::DeleteReport;
use std::collections::HashSet;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Composite row ids as printed by `rc list` (`0-1-0-2`).
    #[arg(value_name = "ROW", required_unless_present = "rids")]
    pub rows: Vec<String>,

    /// Select by `_rid` instead of position (repeatable).
    #[arg(long = "rid", value_name = "RID", conflicts_with = "rows")]
    pub rids: Vec<String>,

    /// Confirm the deletion.
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_rows(rows: &[String]) -> Result<HashSet<RowKey>> {
    rows.iter()
        .map(|raw| {
            raw.parse::<RowKey>()
                .with_context(|| format!("'{raw}' is not a row id"))
        })
        .collect()
}

pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let selected = args.rows.len() + args.rids.len();
    if !args.yes {
        bail!("refusing to delete {selected} row(s) without --yes");
    }

    let report = if args.rids.is_empty() {
        ws.engine.bulk_delete(&parse_rows(&args.rows)?)?
    } else {
        let rids: HashSet<String> = args.rids.iter().map(|r| r.trim().to_string()).collect();
        ws.engine.delete_by_rids(&rids)?
    };

    render(output, &report, |r: &DeleteReport, w| {
        writeln!(w, "✓ Deleted {} step(s)", r.steps_removed)?;
        if r.groups_pruned + r.lots_pruned + r.projects_pruned > 0 {
            writeln!(
                w,
                "  pruned: {} group(s), {} lot(s), {} project(s)",
                r.groups_pruned, r.lots_pruned, r.projects_pruned
            )?;
        }
        if !r.unmatched.is_empty() {
            writeln!(w, "  not found: {}", r.unmatched.join(", "))?;
        }
        Ok(())
    })
}
