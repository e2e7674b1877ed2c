//! Superset storage backends.
//!
//! Stores are keyed by superset id. `insert` replaces on conflict, and
//! `update` refuses a snapshot whose revision is older than the stored one,
//! so a late write can never roll a superset back.

use crate::{Error, Result, Superset};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Keyed save/load contract used by the persistence gateway
pub trait SupersetStore: Send + Sync {
    fn insert(&self, superset: &Superset) -> Result<()>;
    fn update(&self, superset: &Superset) -> Result<()>;
    fn delete(&self, superset_id: Uuid) -> Result<()>;
    fn get_all(&self) -> Result<Vec<Superset>>;
    fn size(&self) -> Result<usize>;
}

type SupersetMap = BTreeMap<Uuid, Superset>;

fn apply_update(map: &mut SupersetMap, superset: &Superset) {
    if let Some(stored) = map.get(&superset.id()) {
        if stored.revision() > superset.revision() {
            tracing::warn!(
                "Ignoring stale write for superset {} (revision {} < stored {})",
                superset.id(),
                superset.revision(),
                stored.revision()
            );
            return;
        }
    } else {
        tracing::debug!("Update for unknown superset {}, inserting", superset.id());
    }
    map.insert(superset.id(), superset.clone());
}

/// In-process store, used by tests and embedders without disk access
#[derive(Debug, Default)]
pub struct MemoryStore {
    supersets: Mutex<SupersetMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut SupersetMap) -> T) -> Result<T> {
        let mut guard = self
            .supersets
            .lock()
            .map_err(|_| Error::Persistence("memory store lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

impl SupersetStore for MemoryStore {
    fn insert(&self, superset: &Superset) -> Result<()> {
        self.with(|map| {
            map.insert(superset.id(), superset.clone());
        })
    }

    fn update(&self, superset: &Superset) -> Result<()> {
        self.with(|map| apply_update(map, superset))
    }

    fn delete(&self, superset_id: Uuid) -> Result<()> {
        self.with(|map| {
            map.remove(&superset_id);
        })
    }

    fn get_all(&self) -> Result<Vec<Superset>> {
        self.with(|map| map.values().cloned().collect())
    }

    fn size(&self) -> Result<usize> {
        self.with(|map| map.len())
    }
}

/// Single JSON document holding every superset of the current session
///
/// Reads take a shared lock, writes go to a locked temp file that is
/// atomically renamed over the original.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored map with shared locking
    ///
    /// Returns an empty map if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns an empty map.
    fn load(&self) -> Result<SupersetMap> {
        if !self.path.exists() {
            tracing::debug!("No superset file at {:?}, starting empty", self.path);
            return Ok(SupersetMap::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read superset file {:?}: {}. Starting empty.",
                self.path,
                e
            );
            return Ok(SupersetMap::new());
        }

        file.unlock()?;

        match serde_json::from_str::<SupersetMap>(&contents) {
            Ok(map) => {
                tracing::debug!("Loaded {} supersets from {:?}", map.len(), self.path);
                Ok(map)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse superset file {:?}: {}. Starting empty.",
                    self.path,
                    e
                );
                Ok(SupersetMap::new())
            }
        }
    }

    /// Atomically write the whole map
    fn save(&self, map: &SupersetMap) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Persistence("superset path missing parent".into()))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(map)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} supersets to {:?}", map.len(), self.path);
        Ok(())
    }

    /// Load, modify and save back
    fn modify(&self, f: impl FnOnce(&mut SupersetMap)) -> Result<()> {
        let mut map = self.load()?;
        f(&mut map);
        self.save(&map)
    }
}

impl SupersetStore for JsonFileStore {
    fn insert(&self, superset: &Superset) -> Result<()> {
        self.modify(|map| {
            map.insert(superset.id(), superset.clone());
        })
    }

    fn update(&self, superset: &Superset) -> Result<()> {
        self.modify(|map| apply_update(map, superset))
    }

    fn delete(&self, superset_id: Uuid) -> Result<()> {
        self.modify(|map| {
            map.remove(&superset_id);
        })
    }

    fn get_all(&self) -> Result<Vec<Superset>> {
        Ok(self.load()?.into_values().collect())
    }

    fn size(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }
}
