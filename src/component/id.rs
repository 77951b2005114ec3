//! Component identifiers and dotted hierarchy paths.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target marker produced when a request matched nothing in the hierarchy.
pub const UNKNOWN_TARGET: &str = "unknown";

/// Globally unique component identifier, stable across versions.
///
/// The identifier doubles as the catalog key of the component's
/// [`ModuleMetadata`](super::ModuleMetadata) entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ComponentPath> for ComponentId {
    fn from(path: &ComponentPath) -> Self {
        Self(path.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Component path is empty")]
    Empty,

    #[error("Invalid segment {segment:?} in path {path:?}")]
    InvalidSegment { path: String, segment: String },
}

/// Dotted hierarchy address, e.g. `systemHealth.cpu.display.animation`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentPath {
    segments: Vec<String>,
}

impl ComponentPath {
    /// Parse a dotted path. Segments must be non-empty `[A-Za-z0-9_-]`.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.trim().is_empty() {
            return Err(PathError::Empty);
        }
        let segments = path
            .split('.')
            .map(|segment| {
                let valid = !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if valid {
                    Ok(segment.to_string())
                } else {
                    Err(PathError::InvalidSegment {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// Build a path from already-validated segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self::parse(&joined)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Immediate parent path, `None` for a root segment.
    pub fn parent(&self) -> Option<ComponentPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Every proper prefix, root first.
    pub fn ancestors(&self) -> Vec<ComponentPath> {
        (1..self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// Extend this path with one more segment.
    pub fn child(&self, segment: &str) -> Result<ComponentPath, PathError> {
        Self::parse(&format!("{}.{}", self, segment))
    }

    /// True if `self` equals `other` or is one of its ancestors.
    pub fn contains(&self, other: &ComponentPath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for ComponentPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ComponentPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentPath> for String {
    fn from(path: ComponentPath) -> Self {
        path.to_string()
    }
}
