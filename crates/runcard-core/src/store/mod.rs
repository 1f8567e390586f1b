//! Key/value persistence boundary for the project and template collections.
//!
//! A [`RecordStore`] holds opaque JSON values under string keys. Typed access
//! goes through [`load_collection`] / [`save_collection`], which treat a
//! missing key as an empty collection and a value that fails to decode as an
//! error naming the key.

pub mod json_dir;
pub mod memory;
pub mod sqlite;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::lock::LockError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

/// Key of the project collection.
pub const PROJECTS_KEY: &str = "all_projects";

/// Key of the template collection.
pub const TEMPLATES_KEY: &str = "runcard_templates";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o on record '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("record lock: {0}")]
    Lock(#[from] LockError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record '{key}' is not valid: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store rejected write to '{0}'")]
    Rejected(String),
}

/// Injectable persistence for whole-collection blobs.
pub trait RecordStore {
    /// The value under `key`, or `None` when the key was never written.
    ///
    /// # Errors
    ///
    /// Any backend failure. Absence is not an error.
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Any backend failure. On error the previous value stays in place.
    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

/// Load and decode a collection; a missing key yields an empty `Vec`.
///
/// # Errors
///
/// Backend failures and [`StoreError::Decode`] for malformed values.
pub fn load_collection<S, T>(store: &S, key: &str) -> Result<Vec<T>, StoreError>
where
    S: RecordStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(value) = store.load(key)? else {
        debug!(key, "record absent, starting empty");
        return Ok(Vec::new());
    };
    if value.is_null() {
        return Ok(Vec::new());
    }
    let items: Vec<T> = serde_json::from_value(value).map_err(|source| StoreError::Decode {
        key: key.to_string(),
        source,
    })?;
    debug!(key, count = items.len(), "record loaded");
    Ok(items)
}

/// Encode and save a collection.
///
/// # Errors
///
/// Backend failures and [`StoreError::Encode`].
pub fn save_collection<S, T>(store: &S, key: &str, items: &[T]) -> Result<(), StoreError>
where
    S: RecordStore + ?Sized,
    T: Serialize,
{
    let value = serde_json::to_value(items).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.save(key, &value)
}
