use crate::obihai_client::DeviceCredentials;
use anyhow::{Context, Result, anyhow, bail};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use uuid::Uuid;

/// Persisted configuration record for one device
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub id: Uuid,
    pub title: String,
    pub data: DeviceCredentials,
}

/// Outcome of a create or update, decided under the store lock
#[derive(Clone, Debug, PartialEq)]
pub enum StoreOutcome {
    Stored(ConfigEntry),
    /// Another entry already holds the requested host
    DuplicateHost,
}

/// Store for configuration records, backed by a JSON file.
///
/// Create and update enforce host uniqueness while holding the lock; the
/// flows additionally scan beforehand so duplicates abort before any
/// validation is attempted. All mutations are written back to disk before
/// they are visible.
pub struct EntryStore {
    path: PathBuf,
    entries: Mutex<Vec<ConfigEntry>>,
}

impl EntryStore {
    /// Load the store from `path`, starting empty if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<Vec<ConfigEntry>>(&contents)
                .with_context(|| format!("failed to parse entries file {path:?}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read entries file {path:?}"));
            }
        };

        info!("loaded {} configuration entries", entries.len());

        Ok(EntryStore {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn entries(&self) -> Result<Vec<ConfigEntry>> {
        Ok(self.lock()?.clone())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<ConfigEntry>> {
        Ok(self.lock()?.iter().find(|entry| entry.id == id).cloned())
    }

    /// Check whether any record other than `exclude` is configured for `host`
    pub fn host_exists(&self, host: &str, exclude: Option<Uuid>) -> Result<bool> {
        Ok(self
            .lock()?
            .iter()
            .any(|entry| Some(entry.id) != exclude && entry.data.host == host))
    }

    pub fn create(&self, title: String, data: DeviceCredentials) -> Result<StoreOutcome> {
        let mut entries = self.lock()?;

        if entries.iter().any(|entry| entry.data.host == data.host) {
            return Ok(StoreOutcome::DuplicateHost);
        }

        let entry = ConfigEntry {
            id: Uuid::new_v4(),
            title,
            data,
        };

        entries.push(entry.clone());
        Self::persist(&entries, &self.path)?;

        Ok(StoreOutcome::Stored(entry))
    }

    pub fn update(&self, id: Uuid, title: String, data: DeviceCredentials) -> Result<StoreOutcome> {
        let mut entries = self.lock()?;

        if entries
            .iter()
            .any(|entry| entry.id != id && entry.data.host == data.host)
        {
            return Ok(StoreOutcome::DuplicateHost);
        }

        let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) else {
            bail!("failed to update entry: unknown id {id}");
        };

        entry.title = title;
        entry.data = data;
        let updated = entry.clone();

        Self::persist(&entries, &self.path)?;

        Ok(StoreOutcome::Stored(updated))
    }

    fn persist(entries: &[ConfigEntry], path: &Path) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(entries).context("failed to serialize entries")?;

        fs::write(path, contents).with_context(|| format!("failed to write entries file {path:?}"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ConfigEntry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("entry store lock poisoned"))
    }
}
