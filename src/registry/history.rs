//! Per-component version history used for audit and rollback.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::component::ComponentId;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid history document: {0}")]
    Serde(#[from] serde_json::Error),
}

/// How a version came to be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Catalog,
    Artifact,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: Version,
    #[serde(default)]
    pub artifact_id: Option<Uuid>,
    #[serde(default)]
    pub checksum: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub source: VersionSource,
}

impl HistoryEntry {
    pub fn new(version: Version, source: VersionSource) -> Self {
        Self {
            version,
            artifact_id: None,
            checksum: None,
            recorded_at: Utc::now(),
            source,
        }
    }
}

/// Ordered record of the versions each component has run, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistory {
    components: BTreeMap<ComponentId, Vec<HistoryEntry>>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Recording the version that is already current is a no-op.
    pub fn record(&mut self, id: &ComponentId, entry: HistoryEntry) {
        let entries = self.components.entry(id.clone()).or_default();
        if entries.last().map(|last| &last.version) == Some(&entry.version) {
            return;
        }
        entries.push(entry);
    }

    pub fn entries(&self, id: &ComponentId) -> &[HistoryEntry] {
        self.components.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn current(&self, id: &ComponentId) -> Option<&HistoryEntry> {
        self.entries(id).last()
    }

    /// Most recent version before the current one that differs from it.
    pub fn previous_version(&self, id: &ComponentId) -> Option<&Version> {
        let entries = self.entries(id);
        let current = &entries.last()?.version;
        entries
            .iter()
            .rev()
            .map(|entry| &entry.version)
            .find(|version| *version != current)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| HistoryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a saved history. A missing file yields an empty history.
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(HistoryError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: (u64, u64, u64), source: VersionSource) -> HistoryEntry {
        HistoryEntry::new(Version::new(v.0, v.1, v.2), source)
    }

    #[test]
    fn test_previous_version_skips_current() {
        let id = ComponentId::new("cpu");
        let mut history = VersionHistory::new();
        history.record(&id, entry((1, 0, 0), VersionSource::Catalog));
        history.record(&id, entry((1, 0, 1), VersionSource::Artifact));
        history.record(&id, entry((1, 0, 1), VersionSource::Artifact));

        assert_eq!(history.entries(&id).len(), 2);
        assert_eq!(history.previous_version(&id), Some(&Version::new(1, 0, 0)));
    }

    #[test]
    fn test_no_previous_for_single_entry() {
        let id = ComponentId::new("cpu");
        let mut history = VersionHistory::new();
        assert!(history.previous_version(&id).is_none());
        history.record(&id, entry((1, 0, 0), VersionSource::Catalog));
        assert!(history.previous_version(&id).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.json");
        let id = ComponentId::new("memory");

        let mut history = VersionHistory::new();
        let mut built = entry((2, 1, 0), VersionSource::Artifact);
        built.checksum = Some("abc123".into());
        history.record(&id, built);
        history.save(&path).unwrap();

        let loaded = VersionHistory::load(&path).unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.current(&id).unwrap().checksum.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = VersionHistory::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.component_count(), 0);
    }
}
