use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// A single stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    String(String),
}

#[derive(Debug, Clone)]
enum Change {
    Put(String, PrefValue),
    Remove(String),
}

/// Flat key/value preference store persisted as YAML.
///
/// Reads go straight to the in-memory map. Writes go through an
/// [`Editor`]: mutations are staged and become visible, and are persisted,
/// all at once on [`Editor::apply`].
#[derive(Debug, Default)]
pub struct Preferences {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, PrefValue>>,
}

impl Preferences {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Preferences::default()
    }

    /// Load preferences from `path`. A missing file yields an empty store
    /// that will be created on the first apply.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)
                .context(format!("Failed to read preferences file: {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_yaml::from_str(&content).context("Failed to parse YAML preferences")?
            }
        } else {
            debug!("No preferences at {}, starting empty", path.display());
            BTreeMap::new()
        };

        debug!("Loaded {} preferences from {}", values.len(), path.display());
        Ok(Preferences {
            path: Some(path.to_path_buf()),
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, PrefValue>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, PrefValue>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }

    /// String value for `key`, or `default` if absent or not a string
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.read().get(key) {
            Some(PrefValue::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.read().get(key) {
            Some(PrefValue::Bool(b)) => *b,
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.read().get(key) {
            Some(PrefValue::Int(i)) => *i,
            _ => default,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Copy of every stored value
    pub fn snapshot(&self) -> BTreeMap<String, PrefValue> {
        self.read().clone()
    }

    /// Begin an edit transaction
    pub fn edit(&self) -> Editor<'_> {
        Editor {
            prefs: self,
            changes: Vec::new(),
        }
    }

    fn persist(&self, values: &BTreeMap<String, PrefValue>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }

        let yaml = serde_yaml::to_string(values).context("Failed to serialize preferences to YAML")?;

        // Write-then-rename so readers never observe a half-written file
        let mut tmp_name = OsString::from(path.as_os_str());
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        fs::write(&tmp_path, yaml)
            .context(format!("Failed to write preferences to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .context(format!("Failed to replace preferences file {}", path.display()))?;

        debug!("Saved preferences to {}", path.display());
        Ok(())
    }
}

/// Staged preference mutations. Dropped without [`Editor::apply`], nothing changes.
#[must_use = "preference changes are discarded unless applied"]
pub struct Editor<'a> {
    prefs: &'a Preferences,
    changes: Vec<Change>,
}

impl<'a> Editor<'a> {
    pub fn put_string(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.changes
            .push(Change::Put(key.to_string(), PrefValue::String(value.into())));
        self
    }

    pub fn put_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.changes.push(Change::Put(key.to_string(), PrefValue::Bool(value)));
        self
    }

    pub fn put_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.changes.push(Change::Put(key.to_string(), PrefValue::Int(value)));
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.changes.push(Change::Remove(key.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Commit every staged change at once.
    ///
    /// The in-memory map is only updated if persisting succeeds, so a failed
    /// apply leaves the store exactly as it was.
    pub fn apply(self) -> Result<()> {
        let mut values = self.prefs.write();
        let mut updated = values.clone();
        for change in &self.changes {
            match change {
                Change::Put(key, value) => {
                    updated.insert(key.clone(), value.clone());
                }
                Change::Remove(key) => {
                    updated.remove(key);
                }
            }
        }

        self.prefs.persist(&updated)?;
        *values = updated;
        info!("Applied {} preference change(s)", self.changes.len());
        Ok(())
    }
}
