use crate::store::{JsonDirStore, RecordStore, SqliteStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Name of the per-workspace directory holding config and records.
pub const RUNCARD_DIR: &str = ".runcard";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub project: ProjectRules,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Relative to the `.runcard/` directory. Defaults per backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRules {
    /// Header fields that must be non-blank before a project is saved.
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
}

impl Default for ProjectRules {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Walk up from `start` to the nearest directory containing `.runcard/`.
#[must_use]
pub fn find_runcard_dir(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(RUNCARD_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load `.runcard/config.toml` under `runcard_dir`; absent file → defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(runcard_dir: &Path) -> Result<ProjectConfig> {
    let path = runcard_dir.join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `<config_dir>/runcard/config.toml`; absent file → defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("runcard/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Output mode precedence: CLI flag, `FORMAT` env, user config, TTY.
#[must_use]
pub fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> &'static str {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json";
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode;
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode;
    }

    if std::io::stdout().is_terminal() {
        "pretty"
    } else {
        "text"
    }
}

/// [`resolve_output`] with `FORMAT` read from the environment.
///
/// # Errors
///
/// Returns an error if the user config exists but is malformed.
pub fn resolve_output_from_env(cli_json: bool) -> Result<&'static str> {
    let user = load_user_config()?;
    let env_format = env::var("FORMAT").ok();
    Ok(resolve_output(
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
    ))
}

impl ProjectConfig {
    /// Open the configured record store under `runcard_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQLite database cannot be opened.
    pub fn open_store(&self, runcard_dir: &Path) -> Result<Box<dyn RecordStore>> {
        let store: Box<dyn RecordStore> = match self.store.backend {
            StoreBackend::Json => {
                let dir = runcard_dir.join(self.store.path.as_deref().unwrap_or(Path::new("data")));
                Box::new(JsonDirStore::new(dir))
            }
            StoreBackend::Sqlite => {
                let path = runcard_dir.join(
                    self.store
                        .path
                        .as_deref()
                        .unwrap_or(Path::new("runcard.sqlite3")),
                );
                Box::new(
                    SqliteStore::open(&path)
                        .with_context(|| format!("open record database {}", path.display()))?,
                )
            }
        };
        Ok(store)
    }

    /// Catalog file path, resolved against `runcard_dir`.
    #[must_use]
    pub fn catalog_path(&self, runcard_dir: &Path) -> PathBuf {
        runcard_dir.join(&self.catalog.path)
    }
}

const fn default_page_size() -> usize {
    crate::flatten::filter::DEFAULT_PAGE_SIZE
}

fn default_required_fields() -> Vec<String> {
    vec![crate::model::project::FIELD_PRODUCT_ID.to_string()]
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.store.backend, StoreBackend::Json);
        assert_eq!(cfg.list.page_size, 20);
        assert_eq!(cfg.project.required_fields, vec!["Product ID"]);
        assert_eq!(cfg.catalog_path(root.path()), root.path().join("catalog.json"));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            root.path().join("config.toml"),
            "[store]\nbackend = \"sqlite\"\n\n[project]\nrequired_fields = [\"Product ID\", \"Owner\"]\n",
        )
        .expect("write config");
        let cfg = load_project_config(root.path()).expect("load");
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.project.required_fields.len(), 2);
        assert_eq!(cfg.list.page_size, 20);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::write(root.path().join("config.toml"), "[list\npage_size = ").expect("write");
        let err = load_project_config(root.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config_and_aliases_normalize() {
        assert_eq!(resolve_output(false, Some("table"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("human"), Some("table")), "text");
        assert_eq!(resolve_output(false, Some("json"), Some("bogus")), "json");
    }

    #[test]
    fn finds_runcard_dir_in_ancestors() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(root.path().join(".runcard")).expect("mkdir");
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).expect("mkdir nested");
        assert_eq!(find_runcard_dir(&nested), Some(root.path().join(".runcard")));
    }

    #[test]
    fn open_store_honours_backend() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut cfg = ProjectConfig::default();
        let json = cfg.open_store(root.path()).expect("json store");
        json.save("k", &serde_json::json!([1])).expect("save");
        assert!(root.path().join("data/k.json").exists());

        cfg.store.backend = StoreBackend::Sqlite;
        let sqlite = cfg.open_store(root.path()).expect("sqlite store");
        assert_eq!(sqlite.load("k").expect("load"), None);
        assert!(root.path().join("runcard.sqlite3").exists());
    }
}
