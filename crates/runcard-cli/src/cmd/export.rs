//! `rc export`: CSV report for a project or one of its lots.

use super::{Workspace, find_project};
use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use clap::Args;
use runcard_core::RunCardError;
use runcard_core::error::EntityKind;
use runcard_core::export::{lot_csv, project_csv, report_file_name};
use runcard_core::model::{Lot, Project};
use serde::Serialize;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Project id or Product ID.
    pub project: String,

    /// Export a single lot (internal id or label).
    #[arg(short, long)]
    pub lot: Option<String>,

    /// Write to this file instead of stdout.
    #[arg(short, long, conflicts_with = "save")]
    pub out: Option<PathBuf>,

    /// Write to `Report_<lot>_<product id>.csv` in the current directory.
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportOutput {
    path: PathBuf,
    bytes: usize,
}

fn pick_lot<'a>(project: &'a Project, needle: &str) -> Result<&'a Lot> {
    project
        .lot(needle)
        .or_else(|| project.lots.iter().find(|l| l.lot_id == needle))
        .ok_or_else(|| {
            RunCardError::NotFound {
                kind: EntityKind::Lot,
                id: needle.to_string(),
            }
            .into()
        })
}

pub fn run_export(args: &ExportArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let project = find_project(&ws.engine, &args.project)?;
    let lot = args
        .lot
        .as_deref()
        .map(|needle| pick_lot(&project, needle.trim()))
        .transpose()?;
    let bytes = match lot {
        Some(lot) => lot_csv(&project, lot)?,
        None => project_csv(&project)?,
    };

    let path = match (&args.out, args.save) {
        (Some(path), _) => path.clone(),
        (None, true) => project_root.join(report_file_name(&project, lot)),
        (None, false) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            out.write_all(&bytes)?;
            out.flush()?;
            return Ok(());
        }
    };

    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "report exported");
    let result = ExportOutput {
        path,
        bytes: bytes.len(),
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Wrote {} ({} bytes)", r.path.display(), r.bytes)
    })
}
