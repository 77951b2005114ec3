//! Catalog providers supplying [`ModuleMetadata`] entries.
//!
//! Where entries come from is the provider's business; the registry only
//! requires a validated list with unique identifiers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::metadata::ModuleMetadata;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog JSON: {0}")]
    Parse(String),

    #[error("Invalid catalog entry {identifier}: {reason}")]
    Invalid { identifier: String, reason: String },

    #[error("Duplicate catalog entry: {0}")]
    Duplicate(String),
}

/// Supplies the discovery-time component catalog.
pub trait CatalogProvider: Send + Sync {
    fn discover(&self) -> Result<Vec<ModuleMetadata>, CatalogError>;
}

/// Validate every entry and reject duplicate identifiers.
pub(crate) fn validate_entries(entries: &[ModuleMetadata]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for entry in entries {
        entry.validate()?;
        if !seen.insert(entry.identifier.clone()) {
            return Err(CatalogError::Duplicate(entry.identifier.to_string()));
        }
    }
    Ok(())
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<ModuleMetadata>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<ModuleMetadata>) -> Self {
        Self { entries }
    }
}

impl CatalogProvider for StaticCatalog {
    fn discover(&self) -> Result<Vec<ModuleMetadata>, CatalogError> {
        validate_entries(&self.entries)?;
        Ok(self.entries.clone())
    }
}

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub modules: Vec<ModuleMetadata>,
}

/// Catalog read from a JSON document on every discovery.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse and validate a catalog document.
    pub fn from_json(json: &str) -> Result<Vec<ModuleMetadata>, CatalogError> {
        let doc: CatalogDocument =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        validate_entries(&doc.modules)?;
        Ok(doc.modules)
    }
}

impl CatalogProvider for JsonCatalog {
    fn discover(&self) -> Result<Vec<ModuleMetadata>, CatalogError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "modules": [
            {
                "identifier": "systemHealth",
                "display_name": "System Health",
                "available_versions": ["1.0.0", "1.1.0"],
                "capabilities": ["health.report"],
                "children": ["systemHealth.cpu"]
            },
            {
                "identifier": "systemHealth.cpu",
                "display_name": "CPU",
                "available_versions": ["1.0.0"]
            }
        ]
    }"#;

    #[test]
    fn test_json_catalog_parses() {
        let entries = JsonCatalog::from_json(CATALOG).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].children.len(), 1);
        assert_eq!(entries[1].effective_path().unwrap().depth(), 2);
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let entry = JsonCatalog::from_json(CATALOG).unwrap().remove(1);
        let catalog = StaticCatalog::new(vec![entry.clone(), entry]);
        assert!(matches!(catalog.discover(), Err(CatalogError::Duplicate(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            JsonCatalog::from_json("{\"modules\": [{}]}"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let catalog = JsonCatalog::new("/nonexistent/catalog.json");
        match catalog.discover() {
            Err(CatalogError::Io { path, .. }) => assert!(path.ends_with("catalog.json")),
            other => panic!("expected io error, got {:?}", other.map(|e| e.len())),
        }
    }
}
