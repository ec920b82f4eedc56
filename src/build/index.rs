//! Persisted record of which descriptors each compilation unit produced

use crate::diagnostics::ValidationLevel;
use crate::fs::FileSystem;
use crate::version::SpecVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Implementation class to descriptor key, for one unit
pub type UnitOutputs = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read project index {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Project index {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write project index {path}: {error}")]
    Write { path: PathBuf, error: String },
}

/// Settings whose change invalidates every recorded output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexSettings {
    pub output_path: String,
    pub spec_version: SpecVersion,
    pub validation_level: ValidationLevel,
    pub missing_unbind_level: ValidationLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIndex {
    #[serde(default)]
    settings: Option<IndexSettings>,
    #[serde(default)]
    units: BTreeMap<String, UnitOutputs>,
}

impl ProjectIndex {
    pub fn new(settings: IndexSettings) -> Self {
        Self {
            settings: Some(settings),
            units: BTreeMap::new(),
        }
    }

    /// Reads the index at `path`; a missing file is an empty index
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self, IndexError> {
        if !fs.is_file(path) {
            debug!("No project index at {}", path.display());
            return Ok(Self::default());
        }
        let text = fs.read_to_string(path).map_err(|e| IndexError::Read {
            path: path.to_path_buf(),
            error: format!("{:#}", e),
        })?;
        serde_json::from_str(&text).map_err(|source| IndexError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, fs: &dyn FileSystem, path: &Path) -> Result<(), IndexError> {
        let write_error = |e: anyhow::Error| IndexError::Write {
            path: path.to_path_buf(),
            error: format!("{:#}", e),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs.create_dir_all(parent).map_err(write_error)?;
            }
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| IndexError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        fs.write(path, &format!("{}\n", text)).map_err(write_error)
    }

    pub fn settings(&self) -> Option<&IndexSettings> {
        self.settings.as_ref()
    }

    /// Whether outputs recorded here were produced with `settings`
    pub fn is_current(&self, settings: &IndexSettings) -> bool {
        self.settings.as_ref() == Some(settings)
    }

    pub fn unit(&self, key: &str) -> Option<&UnitOutputs> {
        self.units.get(key)
    }

    pub fn units(&self) -> impl Iterator<Item = (&String, &UnitOutputs)> {
        self.units.iter()
    }

    /// Records the outputs of `key`; an empty map forgets the unit
    pub fn set_unit(&mut self, key: impl Into<String>, outputs: UnitOutputs) {
        let key = key.into();
        if outputs.is_empty() {
            self.units.remove(&key);
        } else {
            self.units.insert(key, outputs);
        }
    }

    pub fn remove_unit(&mut self, key: &str) -> Option<UnitOutputs> {
        self.units.remove(key)
    }

    /// Every descriptor key some unit maps to
    pub fn descriptor_keys(&self) -> BTreeSet<String> {
        self.units.values().flat_map(|outputs| outputs.values().cloned()).collect()
    }
}
