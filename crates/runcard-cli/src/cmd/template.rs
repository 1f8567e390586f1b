//! `rc template`: save, apply, list and delete lot templates.

use super::{Workspace, find_project};
use crate::output::{OutputMode, pretty_rule, render, render_mode, render_success};
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use runcard_core::template::Template;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommand,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Capture a lot's stress groups and steps under NAME.
    ///
    /// Timestamps and row identities are not captured. An existing template
    /// with the same name is replaced.
    Save {
        name: String,
        /// Project id or Product ID.
        project: String,
        lot: String,
    },
    /// Replace a lot's stress groups with the template's shape.
    ///
    /// Destructive: every existing step of the lot is discarded.
    Apply {
        name: String,
        /// Project id or Product ID.
        project: String,
        lot: String,
        /// Confirm discarding the lot's current steps.
        #[arg(short, long)]
        yes: bool,
    },
    /// List saved templates.
    List,
    /// Delete a template.
    Rm { name: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateSummary {
    name: String,
    groups: usize,
    steps: usize,
}

impl From<&Template> for TemplateSummary {
    fn from(t: &Template) -> Self {
        Self {
            name: t.name.clone(),
            groups: t.stresses.len(),
            steps: t.step_count(),
        }
    }
}

pub fn run_template(args: &TemplateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    match &args.command {
        TemplateCommand::Save { name, project, lot } => {
            let project = find_project(&ws.engine, project)?;
            let template = ws.engine.save_template(name, &project.id, lot)?;
            render(output, &template, |t, w| {
                writeln!(
                    w,
                    "✓ Template '{}' saved ({} group(s), {} step(s))",
                    t.name,
                    t.stresses.len(),
                    t.step_count()
                )
            })
        }
        TemplateCommand::Apply {
            name,
            project,
            lot,
            yes,
        } => {
            if !*yes {
                bail!("applying '{name}' discards every step of lot {lot}; pass --yes to confirm");
            }
            let project = find_project(&ws.engine, project)?;
            ws.engine.apply_template(&project.id, lot, name)?;
            render_success(output, &format!("Template '{name}' applied to lot {lot}"))
        }
        TemplateCommand::List => {
            let summaries: Vec<TemplateSummary> =
                ws.engine.templates()?.iter().map(TemplateSummary::from).collect();
            render_mode(
                output,
                &summaries,
                |v, w| {
                    v.iter()
                        .try_for_each(|t| writeln!(w, "{}\t{}\t{}", t.name, t.groups, t.steps))
                },
                |v, w| {
                    writeln!(w, "{:<24} {:>6} {:>6}", "NAME", "GROUPS", "STEPS")?;
                    pretty_rule(w)?;
                    for t in v {
                        writeln!(w, "{:<24} {:>6} {:>6}", t.name, t.groups, t.steps)?;
                    }
                    if v.is_empty() {
                        writeln!(w, "  (no templates)")?;
                    }
                    Ok(())
                },
            )
        }
        TemplateCommand::Rm { name } => {
            ws.engine.delete_template(name)?;
            render_success(output, &format!("Template '{name}' deleted"))
        }
    }
}
