//! Built artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::component::ComponentId;

/// Output of one successful build. Consumed once by the coordinator and
/// then kept for audit and rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub id: Uuid,
    pub component: ComponentId,
    pub version: Version,
    /// Storage location; opaque to the runtime.
    pub path: PathBuf,
    /// SHA-256 of the artifact bytes, lowercase hex.
    pub checksum: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl BuildArtifact {
    pub fn new(component: ComponentId, version: Version, path: PathBuf, bytes: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4(),
            component,
            version,
            path,
            checksum: checksum_hex(bytes),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn verify(&self, bytes: &[u8]) -> bool {
        self.checksum == checksum_hex(bytes)
    }
}

pub fn checksum_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_detects_tampering() {
        let artifact = BuildArtifact::new("cpu".into(), Version::new(1, 0, 1), "out/cpu".into(), b"payload");
        assert!(artifact.verify(b"payload"));
        assert!(!artifact.verify(b"payl0ad"));
        assert_eq!(artifact.checksum.len(), 64);
    }
}
