use crate::output::{OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use runcard_core::catalog::{CatalogData, FileCatalog};
use runcard_core::config::{RUNCARD_DIR, StoreBackend};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force re-initialization even if `.runcard/` already exists.
    #[arg(long)]
    pub force: bool,

    /// Record store backend written into the new config.
    #[arg(long, value_enum, default_value_t = BackendArg::Json)]
    pub backend: BackendArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Json,
    Sqlite,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Json => Self::Json,
            BackendArg::Sqlite => Self::Sqlite,
        }
    }
}

fn config_toml(backend: StoreBackend) -> String {
    let backend = match backend {
        StoreBackend::Json => "json",
        StoreBackend::Sqlite => "sqlite",
    };
    format!(
        "[store]\n\
         backend = \"{backend}\"\n\
         \n\
         [list]\n\
         page_size = 20\n\
         \n\
         [project]\n\
         required_fields = [\"Product ID\"]\n\
         \n\
         [catalog]\n\
         path = \"catalog.json\"\n"
    )
}

const GITIGNORE: &str = "runcard.sqlite3*\nrecords.lock\n*.tmp\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    dir: String,
    backend: StoreBackend,
    catalog: String,
}

/// Execute `rc init`. Creates:
///
/// ```text
/// .runcard/
///   config.toml    (default project config)
///   catalog.json   (empty product/stress catalog, kept if present)
///   .gitignore     (sqlite database, lock and temp files)
/// ```
///
/// # Errors
///
/// Returns an error if `.runcard/` already exists and `--force` is not set,
/// or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(RUNCARD_DIR);

    if dir.exists() && !args.force {
        anyhow::bail!(".runcard/ already exists. Use `rc init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let backend = StoreBackend::from(args.backend);
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, config_toml(backend))
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let catalog = FileCatalog::new(dir.join("catalog.json"));
    if !catalog.path().exists() {
        catalog.write(&CatalogData::default())?;
    }

    tracing::info!(dir = %dir.display(), ?backend, "workspace initialized");

    let result = InitOutput {
        dir: dir.display().to_string(),
        backend,
        catalog: catalog.path().display().to_string(),
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Initialized .runcard/ workspace.")?;
        pretty_kv(w, "Config", format!("{}/config.toml", r.dir))?;
        pretty_kv(w, "Catalog", &r.catalog)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  rc create --product-id P-100 --lot LOT1")
    })
}
