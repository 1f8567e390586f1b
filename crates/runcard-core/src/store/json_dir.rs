use super::{RecordStore, StoreError};
use crate::lock::RecordLock;
use serde_json::Value;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

const LOCK_FILE: &str = "records.lock";

/// One pretty-printed `<key>.json` file per record under a directory.
///
/// Writes go to a temporary sibling file that is renamed over the target, so
/// a failed save never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn io_err(key: &str) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl RecordStore for JsonDirStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let _lock = RecordLock::shared(&self.lock_path())?;
        let bytes = fs::read(&path).map_err(Self::io_err(key))?;
        debug!(key, path = %path.display(), bytes = bytes.len(), "read record file");
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(Self::io_err(key))?;
        let _lock = RecordLock::exclusive(&self.lock_path())?;

        let mut body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        body.push(b'\n');

        let target = self.record_path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        {
            let mut file = fs::File::create(&tmp).map_err(Self::io_err(key))?;
            file.write_all(&body).map_err(Self::io_err(key))?;
            file.sync_all().map_err(Self::io_err(key))?;
        }
        fs::rename(&tmp, &target).map_err(Self::io_err(key))?;
        debug!(key, path = %target.display(), "wrote record file");
        Ok(())
    }
}
