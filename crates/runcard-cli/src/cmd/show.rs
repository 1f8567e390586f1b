//! `rc show`: one project with its lots, stress groups and steps.

use super::{Workspace, find_project};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use runcard_core::catalog::family_names_or_empty;
use runcard_core::flatten::{RowKey, flatten};
use runcard_core::model::{Project, Step};
use runcard_core::status::{Progress, ProjectStatus, StepStatus, lot_status, step_status};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Project id or Product ID.
    pub project: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepView<'a> {
    /// Positional row id, valid until the next structural change.
    key: Option<RowKey>,
    status: StepStatus,
    #[serde(flatten)]
    step: &'a Step,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupView<'a> {
    id: &'a str,
    stress: Option<&'a str>,
    steps: Vec<StepView<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LotView<'a> {
    id: &'a str,
    lot_id: &'a str,
    status: ProjectStatus,
    progress: Progress,
    stresses: Vec<GroupView<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectView<'a> {
    id: &'a str,
    family_name: String,
    header: Vec<(&'a str, &'a str)>,
    status: ProjectStatus,
    progress: Progress,
    created_at: String,
    updated_at: String,
    lots: Vec<LotView<'a>>,
}

fn view<'a>(
    project: &'a Project,
    keys: &HashMap<&str, RowKey>,
    families: &HashMap<String, String>,
) -> ProjectView<'a> {
    let raw_family = project
        .header
        .value(runcard_core::model::project::FIELD_PRODUCT_FAMILY);
    ProjectView {
        id: &project.id,
        family_name: families
            .get(raw_family)
            .map_or(raw_family, String::as_str)
            .to_string(),
        header: project.header.ordered().collect(),
        status: project.status,
        progress: Progress::of(project.steps()),
        created_at: project.created_at.to_string(),
        updated_at: project.updated_at.to_string(),
        lots: project
            .lots
            .iter()
            .map(|lot| LotView {
                id: &lot.id,
                lot_id: &lot.lot_id,
                status: lot_status(lot),
                progress: Progress::of(lot.steps()),
                stresses: lot
                    .stresses
                    .iter()
                    .map(|group| GroupView {
                        id: &group.id,
                        stress: group.stress.as_deref(),
                        steps: group
                            .row_data
                            .iter()
                            .map(|step| StepView {
                                key: keys.get(step.rid.as_str()).copied(),
                                status: step_status(step),
                                step,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn render_text(v: &ProjectView<'_>, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "project\t{}\t{}\t{}", v.id, v.status, v.progress)?;
    for (field, value) in &v.header {
        writeln!(w, "header\t{field}\t{value}")?;
    }
    for lot in &v.lots {
        writeln!(w, "lot\t{}\t{}\t{}\t{}", lot.id, lot.lot_id, lot.status, lot.progress)?;
        for group in &lot.stresses {
            writeln!(w, "stress\t{}\t{}", group.id, group.stress.unwrap_or(""))?;
            for s in &group.steps {
                let key = s.key.map(|k| k.to_string()).unwrap_or_default();
                writeln!(
                    w,
                    "step\t{key}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    s.step.rid,
                    s.status,
                    s.step.stress,
                    s.step.operation,
                    s.step.condition,
                    s.step.start_time,
                    s.step.end_time
                )?;
            }
        }
    }
    Ok(())
}

fn render_pretty(v: &ProjectView<'_>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Project {}", v.id))?;
    pretty_kv(w, "status", v.status.to_string())?;
    pretty_kv(w, "progress", v.progress.to_string())?;
    if !v.family_name.is_empty() {
        pretty_kv(w, "family", &v.family_name)?;
    }
    for (field, value) in &v.header {
        pretty_kv(w, field, value)?;
    }
    pretty_kv(w, "created", &v.created_at)?;
    pretty_kv(w, "updated", &v.updated_at)?;

    for lot in &v.lots {
        writeln!(w)?;
        pretty_section(
            w,
            &format!("Lot {} ({})  {}  {}", dash(lot.lot_id), lot.id, lot.status, lot.progress),
        )?;
        for group in &lot.stresses {
            writeln!(w, "  stress group {}  {}", group.id, group.stress.unwrap_or(""))?;
            for s in &group.steps {
                let key = s.key.map(|k| k.to_string()).unwrap_or_default();
                writeln!(
                    w,
                    "    {key:<9} {:<11} {:<10} {:<12} {:<12} {:<19} {}",
                    s.status.to_string(),
                    dash(&s.step.stress),
                    dash(&s.step.operation),
                    dash(&s.step.condition),
                    dash(s.step.start_time.as_str()),
                    dash(s.step.end_time.as_str()),
                )?;
                writeln!(w, "              rid {}", s.step.rid)?;
            }
        }
    }
    pretty_rule(w)
}

pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let project = find_project(&ws.engine, &args.project)?;
    let families = family_names_or_empty(&ws.catalog);

    let all = ws.engine.projects()?;
    let rows = flatten(&all, &HashMap::new());
    let keys: HashMap<&str, RowKey> = rows
        .iter()
        .filter(|r| r.project_id == project.id)
        .map(|r| (r.step.rid.as_str(), r.key))
        .collect();

    let v = view(&project, &keys, &families);
    render_mode(output, &v, render_text, render_pretty)
}
