//! `rc list`: flattened step rows with search, date range, column filters
//! and pagination.

use super::{Workspace, parse_assignment};
use crate::output::{OutputMode, pretty_rule, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use runcard_core::catalog::family_names_or_empty;
use runcard_core::clock::{Clock, parse_date};
use runcard_core::flatten::filter::distinct_values;
use runcard_core::flatten::{
    Column, ColumnFilters, DatePreset, DateRange, FlatRow, ListQuery, Page, PageResult, flatten,
};
use runcard_core::model::project::FIELD_PRODUCT_ID;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive substring searched across every column.
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Quick date range on created date: 1m, 3m, 6m, 1y, all.
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub preset: Option<DatePreset>,

    /// Earliest created date (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    pub from: Option<String>,

    /// Latest created date (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    pub to: Option<String>,

    /// Keep rows whose COLUMN equals VALUE (repeatable). Matching rows are
    /// ordered by the order values were given.
    #[arg(short, long = "filter", value_name = "COLUMN=VALUE")]
    pub filters: Vec<String>,

    /// Print the distinct values of a column instead of rows.
    #[arg(long, value_name = "COLUMN")]
    pub values: Option<String>,

    /// One-based page number.
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page (defaults to `[list] page_size`).
    #[arg(long)]
    pub page_size: Option<usize>,
}

fn column(name: &str) -> Column {
    match name.parse::<Column>() {
        Ok(column) => column,
        Err(never) => match never {},
    }
}

fn date_arg(raw: Option<&str>, flag: &str) -> Result<Option<chrono::NaiveDate>> {
    raw.map(|value| parse_date(value).with_context(|| format!("--{flag}: '{value}' is not a date")))
        .transpose()
}

fn build_query(args: &ListArgs, today: chrono::NaiveDate, default_page_size: usize) -> Result<ListQuery> {
    let range = match args.preset {
        Some(preset) => preset.range(today),
        None => DateRange {
            from: date_arg(args.from.as_deref(), "from")?,
            to: date_arg(args.to.as_deref(), "to")?,
        },
    };
    let mut filters = ColumnFilters::new();
    for raw in &args.filters {
        let (name, value) = parse_assignment(raw)?;
        filters.select(column(&name), value);
    }
    Ok(ListQuery {
        search: args.search.clone(),
        range,
        filters,
        page: Page {
            number: args.page,
            size: args.page_size.unwrap_or(default_page_size),
        },
    })
}

fn render_text(page: &PageResult<FlatRow>, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "row\tproduct_id\tlot\tstress\toperation\tstatus\tstart\tend")?;
    for r in &page.items {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.key,
            r.header.value(FIELD_PRODUCT_ID),
            r.lot_label,
            r.stress,
            r.step.operation,
            r.status,
            r.step.start_time,
            r.step.end_time
        )?;
    }
    Ok(())
}

fn render_pretty(page: &PageResult<FlatRow>, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{:<10} {:<12} {:<10} {:<8} {:<12} {:<11} {:<19} {}",
        "ROW", "PRODUCT ID", "LOT", "STRESS", "OPERATION", "STATUS", "START", "END"
    )?;
    pretty_rule(w)?;
    for r in &page.items {
        writeln!(
            w,
            "{:<10} {:<12} {:<10} {:<8} {:<12} {:<11} {:<19} {}",
            r.key.to_string(),
            r.header.value(FIELD_PRODUCT_ID),
            r.lot_label,
            r.stress,
            r.step.operation,
            r.status.to_string(),
            r.step.start_time.as_str(),
            r.step.end_time.as_str()
        )?;
    }
    pretty_rule(w)?;
    writeln!(w, "{page}")
}

pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let query = build_query(args, ws.engine.clock().today(), ws.config.list.page_size)?;
    let families = family_names_or_empty(&ws.catalog);
    let rows = flatten(&ws.engine.projects()?, &families);

    if let Some(name) = &args.values {
        let narrowed = ListQuery {
            filters: ColumnFilters::new(),
            page: Page {
                number: 1,
                size: usize::MAX,
            },
            ..query
        }
        .run(rows);
        let values = distinct_values(&narrowed.items, &column(name));
        return render_mode(
            output,
            &values,
            |v, w| v.iter().try_for_each(|value| writeln!(w, "{value}")),
            |v, w| {
                writeln!(w, "{name}")?;
                pretty_rule(w)?;
                v.iter().try_for_each(|value| writeln!(w, "  {value}"))
            },
        );
    }

    let page = query.run(rows);
    render_mode(output, &page, render_text, render_pretty)
}
