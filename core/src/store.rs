//! Record store contract and the two bundled backends.
//!
//! # Design
//! The contract is the minimum the pipeline needs from a blob service: list
//! object names in a container, create a container, write one object by key.
//! Objects are named `<id>.json`. Both backends are safe to share across
//! sync workers.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::StoreError;

pub const OBJECT_SUFFIX: &str = ".json";

/// Object name for a subsidy id.
pub fn object_key(id: &str) -> String {
    format!("{id}{OBJECT_SUFFIX}")
}

/// Recover the subsidy id from an object name. `None` for names that do not
/// follow the `<id>.json` convention.
pub fn id_from_key(key: &str) -> Option<&str> {
    key.strip_suffix(OBJECT_SUFFIX).filter(|id| !id.is_empty())
}

/// Write-by-key persistence over a blob backend.
pub trait RecordStore: Send + Sync {
    /// All object names in `container`. Fails with
    /// `StoreError::ContainerNotFound` when the container does not exist.
    fn list_keys(&self, container: &str) -> Result<Vec<String>, StoreError>;

    /// Create `container`. Succeeds when it already exists.
    fn create_container(&self, container: &str) -> Result<(), StoreError>;

    /// Write `bytes` under `key`. With `overwrite == false` an existing key
    /// fails with `StoreError::AlreadyExists`.
    fn write_object(
        &self,
        container: &str,
        key: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

type Containers = HashMap<String, BTreeMap<String, Vec<u8>>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: Mutex<Containers>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Containers>, StoreError> {
        self.containers
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Read an object back. Used by tests and diagnostics.
    pub fn get(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        let containers = self.lock().ok()?;
        containers.get(container)?.get(key).cloned()
    }

    pub fn contains_container(&self, container: &str) -> bool {
        self.lock()
            .map(|containers| containers.contains_key(container))
            .unwrap_or(false)
    }
}

impl RecordStore for MemoryStore {
    fn list_keys(&self, container: &str) -> Result<Vec<String>, StoreError> {
        let containers = self.lock()?;
        containers
            .get(container)
            .map(|objects| objects.keys().cloned().collect())
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))
    }

    fn create_container(&self, container: &str) -> Result<(), StoreError> {
        validate_name(container)?;
        self.lock()?.entry(container.to_string()).or_default();
        Ok(())
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(), StoreError> {
        validate_name(key)?;
        let mut containers = self.lock()?;
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        if !overwrite && objects.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                container: container.to_string(),
                key: key.to_string(),
            });
        }
        objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// One directory per container under `root`, one file per object.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, StoreError> {
        validate_name(container)?;
        Ok(self.root.join(container))
    }
}

impl RecordStore for FsStore {
    fn list_keys(&self, container: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.container_dir(container)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ContainerNotFound(container.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // In-flight temp files start with a dot.
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn create_container(&self, container: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.container_dir(container)?)?;
        Ok(())
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(), StoreError> {
        validate_name(key)?;
        let dir = self.container_dir(container)?;
        if !dir.is_dir() {
            return Err(StoreError::ContainerNotFound(container.to_string()));
        }

        let target = dir.join(key);
        if !overwrite && target.exists() {
            return Err(StoreError::AlreadyExists {
                container: container.to_string(),
                key: key.to_string(),
            });
        }

        let tmp = dir.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &target)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Container and object names must be a single non-hidden path component.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidKey(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_naming_roundtrip() {
        assert_eq!(object_key("a0W5h00000RcFx6EAF"), "a0W5h00000RcFx6EAF.json");
        assert_eq!(id_from_key("a0W5h00000RcFx6EAF.json"), Some("a0W5h00000RcFx6EAF"));
        assert_eq!(id_from_key("notes.txt"), None);
        assert_eq!(id_from_key(".json"), None);
    }

    #[test]
    fn memory_store_missing_container() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.list_keys("subsidies"),
            Err(StoreError::ContainerNotFound(_))
        ));
        assert!(matches!(
            store.write_object("subsidies", "A.json", b"{}", true),
            Err(StoreError::ContainerNotFound(_))
        ));
    }

    #[test]
    fn memory_store_overwrite_rules() {
        let store = MemoryStore::new();
        store.create_container("subsidies").unwrap();
        store.create_container("subsidies").unwrap();
        store.write_object("subsidies", "A.json", b"1", false).unwrap();
        assert!(matches!(
            store.write_object("subsidies", "A.json", b"2", false),
            Err(StoreError::AlreadyExists { .. })
        ));
        store.write_object("subsidies", "A.json", b"3", true).unwrap();
        assert_eq!(store.get("subsidies", "A.json").unwrap(), b"3");
        assert_eq!(store.list_keys("subsidies").unwrap(), vec!["A.json".to_string()]);
    }

    #[test]
    fn fs_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(matches!(
            store.list_keys("subsidies"),
            Err(StoreError::ContainerNotFound(_))
        ));
        store.create_container("subsidies").unwrap();
        assert!(store.list_keys("subsidies").unwrap().is_empty());

        store.write_object("subsidies", "B.json", b"{\"id\":\"B\"}", true).unwrap();
        store.write_object("subsidies", "A.json", b"{}", true).unwrap();
        store.write_object("subsidies", "A.json", b"{\"id\":\"A\"}", true).unwrap();

        assert_eq!(
            store.list_keys("subsidies").unwrap(),
            vec!["A.json".to_string(), "B.json".to_string()]
        );
        let body = fs::read_to_string(dir.path().join("subsidies/A.json")).unwrap();
        assert_eq!(body, "{\"id\":\"A\"}");
    }

    #[test]
    fn fs_store_rejects_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.create_container("c").unwrap();
        store.write_object("c", "A.json", b"1", false).unwrap();
        assert!(matches!(
            store.write_object("c", "A.json", b"2", false),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.create_container("c").unwrap();
        assert!(matches!(
            store.write_object("c", "../escape.json", b"x", true),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.create_container(".."), Err(StoreError::InvalidKey(_))));
    }
}
