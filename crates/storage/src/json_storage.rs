//! JSON file storage implementation.
//!
//! Each key is stored as `<root>/<key>.json`, with a small meta marker
//! (version + updated_at) at `<root>/meta/<key>.meta.json`.

use std::fs;
use std::path::{Path, PathBuf};
use super::{KeyValueStore, StorageError, Result};
use tracing::debug;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the directory tree.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("meta"))?;
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of times `key` has been written.
    pub fn version(&self, key: &str) -> Result<u64> {
        let path = self.meta_path(key)?;
        Ok(read_version(&path))
    }

    fn value_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.json", key)))
    }

    fn meta_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join("meta").join(format!("{}.meta.json", key)))
    }

    /// Read and increment the per-key version, return the new version.
    fn bump_version(&self, key: &str) -> Result<u64> {
        let path = self.meta_path(key)?;
        let version = read_version(&path) + 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes())?;
        Ok(version)
    }
}

impl KeyValueStore for JsonStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.value_path(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(key)?;
        // Write-then-rename: readers never see a partial snapshot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value.as_bytes())?;
        fs::rename(&tmp, &path)?;

        let version = self.bump_version(key)?;
        debug!(key, version, "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        for path in [self.value_path(key)?, self.meta_path(key)?] {
            fs::remove_file(path).or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
            })?;
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

fn read_version(path: &Path) -> u64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        .and_then(|json| json.get("version").and_then(|v| v.as_u64()))
        .unwrap_or(0)
}
