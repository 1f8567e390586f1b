//! Subcommand handlers. Each `run_*` takes its parsed args, the resolved
//! [`crate::output::OutputMode`] and the directory the command was run in.

pub mod catalog;
pub mod check;
pub mod create;
pub mod delete;
pub mod export;
pub mod header;
pub mod init;
pub mod list;
pub mod lot;
pub mod lots;
pub mod queue;
pub mod show;
pub mod stats;
pub mod step;
pub mod stress;
pub mod template;

use anyhow::Context;
use runcard_core::catalog::FileCatalog;
use runcard_core::clock::SystemClock;
use runcard_core::config::{self, ProjectConfig};
use runcard_core::error::EntityKind;
use runcard_core::flatten::RowKey;
use runcard_core::model::Project;
use runcard_core::store::RecordStore;
use runcard_core::{RunCardError, StepLocation, SyncEngine};
use std::path::{Path, PathBuf};

pub type Engine = SyncEngine<Box<dyn RecordStore>, SystemClock>;

/// An opened `.runcard/` workspace: config, engine and catalog.
pub struct Workspace {
    pub dir: PathBuf,
    pub config: ProjectConfig,
    pub engine: Engine,
    pub catalog: FileCatalog,
}

impl Workspace {
    /// Locate `.runcard/` at or above `project_root` and open its store.
    ///
    /// # Errors
    ///
    /// [`RunCardError::NotInitialized`], [`RunCardError::Config`], or a
    /// store open failure.
    pub fn open(project_root: &Path) -> anyhow::Result<Self> {
        let dir = config::find_runcard_dir(project_root)
            .ok_or_else(|| RunCardError::NotInitialized(project_root.to_path_buf()))?;
        let config = config::load_project_config(&dir)
            .map_err(|err| RunCardError::Config(format!("{err:#}")))?;
        let store = config.open_store(&dir)?;
        let catalog = FileCatalog::new(config.catalog_path(&dir));
        Ok(Self {
            dir,
            config,
            engine: SyncEngine::new(store, SystemClock),
            catalog,
        })
    }

    pub fn required_fields(&self) -> &[String] {
        &self.config.project.required_fields
    }
}

/// Resolve a step target: a composite row id (`0-1-0-2`) against current
/// positions, otherwise a `_rid`.
///
/// # Errors
///
/// [`RunCardError::InvalidRowId`] for a stale row id, or
/// [`RunCardError::NotFound`] for an unknown `_rid`.
pub fn resolve_step(engine: &Engine, target: &str) -> anyhow::Result<StepLocation> {
    let location = match target.parse::<RowKey>() {
        Ok(key) => engine.resolve_row_key(key),
        Err(_) => engine.locate_rid(target.trim()),
    };
    location.with_context(|| format!("resolving step '{target}'"))
}

/// Find a project by internal id, falling back to an exact Product ID match.
///
/// # Errors
///
/// [`RunCardError::NotFound`] when neither matches, or a store failure.
pub fn find_project(engine: &Engine, needle: &str) -> anyhow::Result<Project> {
    let needle = needle.trim();
    let mut projects = engine.projects()?;
    let found = projects
        .iter()
        .position(|p| p.id == needle)
        .or_else(|| projects.iter().position(|p| p.product_id() == needle));
    match found {
        Some(index) => Ok(projects.swap_remove(index)),
        None => Err(RunCardError::NotFound {
            kind: EntityKind::Project,
            id: needle.to_string(),
        }
        .into()),
    }
}

/// Parse `name=value` pairs given on the command line.
pub fn parse_assignment(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "empty field name in '{raw}'");
    Ok((name.to_string(), value.trim().to_string()))
}
