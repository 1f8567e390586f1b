//! `rc create`: create a run card project.

use super::{Workspace, parse_assignment};
use crate::output::{OutputMode, pretty_kv, render};
use anyhow::Result;
use clap::Args;
use runcard_core::model::project::FIELD_PRODUCT_ID;
use runcard_core::error::EntityKind;
use runcard_core::model::{Header, Lot, Project};
use runcard_core::RunCardError;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Product ID header value.
    #[arg(long)]
    pub product_id: Option<String>,

    /// Extra header field, as `NAME=VALUE` (repeatable).
    #[arg(short, long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Lot label (repeatable). One unlabelled lot when omitted.
    #[arg(short, long = "lot", value_name = "LABEL")]
    pub lots: Vec<String>,

    /// Apply a saved template to every new lot.
    #[arg(short, long)]
    pub template: Option<String>,
}

fn header_from(args: &CreateArgs) -> Result<Header> {
    let mut header = Header::new();
    for raw in &args.fields {
        let (name, value) = parse_assignment(raw)?;
        if !value.is_empty() {
            header.set(name, value);
        }
    }
    if let Some(product_id) = args.product_id.as_deref().map(str::trim)
        && !product_id.is_empty()
    {
        header.set(FIELD_PRODUCT_ID, product_id);
    }
    Ok(header)
}

pub fn run_create(args: &CreateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let header = header_from(args)?;
    if let Some(name) = &args.template
        && !ws.engine.templates()?.iter().any(|t| &t.name == name)
    {
        return Err(RunCardError::NotFound {
            kind: EntityKind::Template,
            id: name.clone(),
        }
        .into());
    }
    let lots: Vec<Lot> = if args.lots.is_empty() {
        vec![Lot::fresh("")]
    } else {
        args.lots.iter().map(|label| Lot::fresh(label.trim())).collect()
    };

    let mut project = ws
        .engine
        .create_project(header, lots, ws.required_fields())?;

    if let Some(name) = &args.template {
        let lot_ids: Vec<String> = project.lots.iter().map(|l| l.id.clone()).collect();
        for lot_id in &lot_ids {
            ws.engine.apply_template(&project.id, lot_id, name)?;
        }
        project = ws.engine.project(&project.id)?;
    }

    render(output, &project, |p: &Project, w| {
        writeln!(w, "✓ Created project {}", p.id)?;
        pretty_kv(w, "Product ID", p.product_id())?;
        pretty_kv(w, "Lots", p.lots.len().to_string())?;
        pretty_kv(w, "Steps", p.steps().count().to_string())
    })
}
