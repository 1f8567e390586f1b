//! `rc header set`: set or clear a project header field.

use super::{Workspace, find_project};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::{Args, Subcommand};
use runcard_core::hierarchy;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct HeaderArgs {
    #[command(subcommand)]
    pub command: HeaderCommand,
}

#[derive(Subcommand, Debug)]
pub enum HeaderCommand {
    /// Set a header field; an empty value clears it.
    Set {
        /// Project id or Product ID.
        project: String,
        field: String,
        #[arg(default_value = "")]
        value: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HeaderOutput {
    project_id: String,
    field: String,
    value: Option<String>,
}

pub fn run_header(args: &HeaderArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let HeaderCommand::Set {
        project,
        field,
        value,
    } = &args.command;

    let project = find_project(&ws.engine, project)?;
    let field = field.trim();
    let value = ws.engine.mutate_project(&project.id, |p| {
        hierarchy::set_header_field(p, field, value.trim(), ws.required_fields())?;
        Ok(p.header.get(field).map(String::from))
    })?;

    let result = HeaderOutput {
        project_id: project.id,
        field: field.to_string(),
        value,
    };
    render(output, &result, |r, w| match &r.value {
        Some(v) => writeln!(w, "✓ {} = {v}", r.field),
        None => writeln!(w, "✓ {} cleared", r.field),
    })
}
