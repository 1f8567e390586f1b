//! `rc catalog`: maintain product families, products and the stress table,
//! and show the dependent option lists for a step.

use super::{Workspace, resolve_step};
use crate::output::{OutputMode, pretty_kv, pretty_rule, render, render_mode, render_success};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use runcard_core::RunCardError;
use runcard_core::catalog::{
    CatalogData, CatalogError, Product, StepOptions, StressEntry, stress_catalog_or_empty,
};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// List product families.
    Families,
    /// List products, optionally within one family (id or name).
    Products {
        #[arg(short, long)]
        family: Option<String>,
    },
    /// Show the stress table.
    Stresses,
    /// Option lists for a step's stress, type and operation.
    Options {
        /// Step row id (`0-1-0-2`) or `_rid`.
        target: String,
    },
    /// Add a product family.
    AddFamily { name: String },
    /// Rename a product family.
    RenameFamily { id: String, name: String },
    /// Remove a product family and all of its products.
    RmFamily { id: String },
    /// Add a product, or replace one with `--id`.
    AddProduct {
        /// Family id.
        #[arg(long)]
        family: String,
        /// Product name.
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        version: String,
        #[arg(long, default_value = "")]
        internal_name: String,
        #[arg(long, default_value = "")]
        db_pn: String,
        #[arg(long, default_value = "")]
        spec: String,
        /// Replace the product with this id.
        #[arg(long)]
        id: Option<String>,
    },
    /// Remove a product.
    RmProduct { id: String },
    /// Load stress rows from CSV with columns `Stress,Type,Operation,Condition`.
    ///
    /// Rows already present are skipped. Reads stdin when FILE is `-`.
    ImportStresses {
        file: PathBuf,
        /// Drop the current stress table first.
        #[arg(long)]
        replace: bool,
    },
}

#[derive(Debug, Deserialize)]
struct StressRow {
    #[serde(rename = "Stress")]
    stress: String,
    #[serde(rename = "Type", default)]
    step_type: String,
    #[serde(rename = "Operation", default)]
    operation: String,
    #[serde(rename = "Condition", default)]
    condition: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportOutput {
    imported: usize,
    skipped: usize,
    stresses: usize,
}

fn edit<T>(ws: &Workspace, f: impl FnOnce(&mut CatalogData) -> Result<T, CatalogError>) -> Result<T> {
    Ok(ws.catalog.update(f).map_err(RunCardError::from)?)
}

fn read_catalog(ws: &Workspace) -> Result<CatalogData> {
    Ok(ws.catalog.read().map_err(RunCardError::from)?)
}

fn parse_stress_rows(input: impl Read) -> Result<Vec<StressRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let mut rows = Vec::new();
    for (n, record) in reader.deserialize::<StressRow>().enumerate() {
        let row = record.with_context(|| format!("stress CSV row {}", n + 2))?;
        if !row.stress.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Merge rows into the stress table, skipping exact duplicates. Returns how
/// many rows were added.
fn merge_stress_rows(data: &mut CatalogData, rows: Vec<StressRow>) -> usize {
    let mut added = 0;
    for row in rows {
        let entry = StressEntry {
            step_type: row.step_type,
            operation: row.operation,
            condition: row.condition,
        };
        let entries = data.stress_catalog.entry(row.stress).or_default();
        if !entries.contains(&entry) {
            entries.push(entry);
            added += 1;
        }
    }
    added
}

fn import_stresses(ws: &Workspace, file: &Path, replace: bool) -> Result<ImportOutput> {
    let rows = if file == Path::new("-") {
        parse_stress_rows(std::io::stdin().lock())?
    } else {
        let handle = std::fs::File::open(file)
            .with_context(|| format!("Failed to open {}", file.display()))?;
        parse_stress_rows(handle)?
    };
    let total = rows.len();
    let (imported, stresses) = edit(ws, |data| {
        if replace {
            data.stress_catalog.clear();
        }
        let added = merge_stress_rows(data, rows);
        Ok((added, data.stress_catalog.len()))
    })?;
    info!(imported, total, "stress rows imported");
    Ok(ImportOutput {
        imported,
        skipped: total - imported,
        stresses,
    })
}

#[allow(clippy::too_many_lines)]
pub fn run_catalog(args: &CatalogArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    match &args.command {
        CatalogCommand::Families => {
            let families = read_catalog(&ws)?.product_families;
            render_mode(
                output,
                &families,
                |v, w| v.iter().try_for_each(|f| writeln!(w, "{}\t{}", f.id, f.name)),
                |v, w| {
                    writeln!(w, "{:<28} NAME", "ID")?;
                    pretty_rule(w)?;
                    v.iter().try_for_each(|f| writeln!(w, "{:<28} {}", f.id, f.name))
                },
            )
        }
        CatalogCommand::Products { family } => {
            let data = read_catalog(&ws)?;
            let products: Vec<Product> = match family {
                Some(needle) => {
                    let family = data
                        .product_families
                        .iter()
                        .find(|f| f.id == *needle || f.name == *needle)
                        .ok_or_else(|| {
                            RunCardError::from(CatalogError::UnknownFamily(needle.clone()))
                        })?;
                    data.products_in(&family.id).cloned().collect()
                }
                None => data.products,
            };
            render_mode(
                output,
                &products,
                |v, w| {
                    v.iter().try_for_each(|p| {
                        writeln!(
                            w,
                            "{}\t{}\t{}\t{}",
                            p.id, p.family_id, p.product_name, p.version
                        )
                    })
                },
                |v, w| {
                    writeln!(w, "{:<24} {:<20} {:<10} {}", "ID", "PRODUCT", "VERSION", "DB P/N")?;
                    pretty_rule(w)?;
                    v.iter().try_for_each(|p| {
                        writeln!(
                            w,
                            "{:<24} {:<20} {:<10} {}",
                            p.id, p.product_name, p.version, p.db_pn
                        )
                    })
                },
            )
        }
        CatalogCommand::Stresses => {
            let table = read_catalog(&ws)?.stress_catalog;
            render(output, &table, |t, w| {
                for (stress, entries) in t {
                    for e in entries {
                        writeln!(w, "{stress}\t{}\t{}\t{}", e.step_type, e.operation, e.condition)?;
                    }
                }
                Ok(())
            })
        }
        CatalogCommand::Options { target } => {
            let at = resolve_step(&ws.engine, target)?;
            let project = ws.engine.project(&at.project_id)?;
            let step = project
                .lot(&at.lot_id)
                .and_then(|l| l.stress(&at.stress_id))
                .and_then(|g| g.step(&at.rid))
                .with_context(|| format!("step {} vanished", at.rid))?;
            let options = StepOptions::derive(step, &stress_catalog_or_empty(&ws.catalog));
            render(output, &options, |o, w| {
                pretty_kv(w, "Stresses", o.stresses.join(", "))?;
                pretty_kv(w, "Types", o.types.join(", "))?;
                pretty_kv(w, "Operations", o.operations.join(", "))?;
                pretty_kv(w, "Condition", o.condition.as_deref().unwrap_or("-"))
            })
        }
        CatalogCommand::AddFamily { name } => {
            let id = edit(&ws, |data| data.add_family(name))?;
            render_success(output, &format!("Product family '{}' added ({id})", name.trim()))
        }
        CatalogCommand::RenameFamily { id, name } => {
            edit(&ws, |data| data.rename_family(id, name))?;
            render_success(output, &format!("Product family {id} renamed"))
        }
        CatalogCommand::RmFamily { id } => {
            let dropped = edit(&ws, |data| data.delete_family(id))?;
            render_success(
                output,
                &format!("Product family {id} removed with {dropped} product(s)"),
            )
        }
        CatalogCommand::AddProduct {
            family,
            name,
            version,
            internal_name,
            db_pn,
            spec,
            id,
        } => {
            let product = Product {
                id: id.clone().unwrap_or_default(),
                family_id: family.trim().to_string(),
                internal_name: internal_name.trim().to_string(),
                product_name: name.trim().to_string(),
                version: version.trim().to_string(),
                db_pn: db_pn.trim().to_string(),
                spec: spec.trim().to_string(),
            };
            let id = edit(&ws, |data| data.upsert_product(product))?;
            render_success(output, &format!("Product '{}' saved ({id})", name.trim()))
        }
        CatalogCommand::RmProduct { id } => {
            edit(&ws, |data| data.delete_product(id))?;
            render_success(output, &format!("Product {id} removed"))
        }
        CatalogCommand::ImportStresses { file, replace } => {
            let result = import_stresses(&ws, file, *replace)?;
            render(output, &result, |r, w| {
                writeln!(
                    w,
                    "✓ Imported {} stress row(s), {} already present; {} stress(es) in catalog",
                    r.imported, r.skipped, r.stresses
                )
            })
        }
    }
}
