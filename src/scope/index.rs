//! Component index: the source-level view of the hierarchy.
//!
//! A tree keyed by path segment. Nodes record the files that make up the
//! component, whether it may be hot-swapped, and which other paths depend on
//! it being rebuilt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::{BuildLevel, ComponentId, ComponentPath, PathError};
use crate::intent::Vocabulary;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read index {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid index JSON: {0}")]
    Parse(String),

    #[error("Invalid index path: {0}")]
    Path(#[from] PathError),

    #[error("Index node {node} depends on unknown path {dependency}")]
    UnknownDependency { node: String, dependency: String },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub hot_swappable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<BuildLevel>,
    /// Registry identifier built from this node; defaults to the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentId>,
    /// Paths whose rebuild requires rebuilding this node too.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ComponentPath>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, IndexNode>,
}

impl Default for IndexNode {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            hot_swappable: true,
            level: None,
            component: None,
            depends_on: Vec::new(),
            children: BTreeMap::new(),
        }
    }
}

impl IndexNode {
    pub fn with_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hot_swappable(mut self, hot_swappable: bool) -> Self {
        self.hot_swappable = hot_swappable;
        self
    }

    pub fn with_level(mut self, level: BuildLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_component(mut self, component: impl Into<ComponentId>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_depends_on(mut self, paths: Vec<ComponentPath>) -> Self {
        self.depends_on = paths;
        self
    }

    /// Files of this node and every descendant, parents first.
    pub fn subtree_files(&self) -> Vec<PathBuf> {
        let mut files = self.files.clone();
        for child in self.children.values() {
            files.extend(child.subtree_files());
        }
        files
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIndex {
    #[serde(default)]
    roots: BTreeMap<String, IndexNode>,
}

impl ComponentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the node at `path`, creating default ancestors.
    /// Existing children of a replaced node are kept.
    pub fn insert(&mut self, path: &ComponentPath, node: IndexNode) {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut level = &mut self.roots;
        for segment in parents {
            level = &mut level.entry(segment.clone()).or_default().children;
        }
        let slot = level.entry(last.clone()).or_default();
        let children = std::mem::take(&mut slot.children);
        *slot = node;
        for (segment, child) in children {
            slot.children.entry(segment).or_insert(child);
        }
    }

    pub fn get(&self, path: &ComponentPath) -> Option<&IndexNode> {
        let mut level = &self.roots;
        let mut found = None;
        for segment in path.segments() {
            let node = level.get(segment)?;
            found = Some(node);
            level = &node.children;
        }
        found
    }

    pub fn contains(&self, path: &ComponentPath) -> bool {
        self.get(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Every node with its path, parents before children.
    pub fn nodes(&self) -> Vec<(ComponentPath, &IndexNode)> {
        fn walk<'a>(
            nodes: &'a BTreeMap<String, IndexNode>,
            prefix: Option<&ComponentPath>,
            out: &mut Vec<(ComponentPath, &'a IndexNode)>,
        ) {
            for (segment, node) in nodes {
                let path = match prefix {
                    Some(prefix) => prefix.child(segment),
                    None => ComponentPath::parse(segment),
                };
                if let Ok(path) = path {
                    out.push((path.clone(), node));
                    walk(&node.children, Some(&path), out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, None, &mut out);
        out
    }

    /// False if `path` or any of its ancestors is marked non-swappable.
    /// `None` when the path is not indexed.
    pub fn is_hot_swappable(&self, path: &ComponentPath) -> Option<bool> {
        self.get(path)?;
        let mut swappable = true;
        for prefix in path.ancestors().iter().chain(std::iter::once(path)) {
            if let Some(node) = self.get(prefix) {
                swappable &= node.hot_swappable;
            }
        }
        Some(swappable)
    }

    /// Nodes that depend on `path` or on anything beneath it, transitively,
    /// in breadth-first discovery order. Nodes on the path itself (its
    /// ancestors and subtree) are excluded.
    pub fn dependents_of(&self, path: &ComponentPath) -> Vec<ComponentPath> {
        let nodes = self.nodes();
        let mut found: Vec<ComponentPath> = Vec::new();
        let mut frontier = vec![path.clone()];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for changed in &frontier {
                for (candidate, node) in &nodes {
                    // The target's own subtree and ancestors are already affected.
                    if path.contains(candidate) || candidate.contains(path) {
                        continue;
                    }
                    if found.contains(candidate) || next.contains(candidate) {
                        continue;
                    }
                    if node.depends_on.iter().any(|dep| changed.contains(dep)) {
                        next.push(candidate.clone());
                    }
                }
            }
            found.extend(next.iter().cloned());
            frontier = next;
        }
        found
    }

    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let index: Self = serde_json::from_str(json).map_err(|e| IndexError::Parse(e.to_string()))?;
        index.validate()?;
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let content = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Index mirroring a vocabulary: one swappable node per vocabulary path,
    /// with no files.
    pub fn from_vocabulary(vocabulary: &Vocabulary) -> Self {
        let mut index = Self::new();
        for path in vocabulary.paths() {
            if !index.contains(&path) {
                index.insert(&path, IndexNode::default());
            }
        }
        index
    }

    fn validate(&self) -> Result<(), IndexError> {
        for (path, node) in self.nodes() {
            for segment in node.children.keys() {
                path.child(segment)?;
            }
            for dep in &node.depends_on {
                if !self.contains(dep) {
                    return Err(IndexError::UnknownDependency {
                        node: path.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }
        for segment in self.roots.keys() {
            ComponentPath::parse(segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ComponentPath {
        ComponentPath::parse(s).unwrap()
    }

    #[test]
    fn test_insert_creates_ancestors_and_keeps_children() {
        let mut index = ComponentIndex::new();
        index.insert(&path("a.b.c"), IndexNode::default().with_files(["c.rs"]));
        index.insert(&path("a.b"), IndexNode::default().with_files(["b.rs"]));

        assert!(index.contains(&path("a")));
        assert_eq!(index.get(&path("a.b")).unwrap().files, vec![PathBuf::from("b.rs")]);
        assert!(index.contains(&path("a.b.c")));
        assert_eq!(index.nodes().len(), 3);
    }

    #[test]
    fn test_hot_swappable_inherits_from_ancestors() {
        let mut index = ComponentIndex::new();
        index.insert(&path("core"), IndexNode::default().with_hot_swappable(false));
        index.insert(&path("core.scheduler"), IndexNode::default());
        assert_eq!(index.is_hot_swappable(&path("core.scheduler")), Some(false));
        assert_eq!(index.is_hot_swappable(&path("core.missing")), None);
    }

    #[test]
    fn test_dependents_are_transitive() {
        let mut index = ComponentIndex::new();
        index.insert(&path("theme.palette"), IndexNode::default());
        index.insert(
            &path("cpu.graph"),
            IndexNode::default().with_depends_on(vec![path("theme.palette")]),
        );
        index.insert(
            &path("report"),
            IndexNode::default().with_depends_on(vec![path("cpu.graph")]),
        );
        assert_eq!(
            index.dependents_of(&path("theme")),
            vec![path("cpu.graph"), path("report")]
        );
    }

    #[test]
    fn test_json_rejects_unknown_dependency() {
        let err = ComponentIndex::from_json(
            r#"{"roots": {"a": {"files": ["a.rs"], "depends_on": ["ghost"]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::UnknownDependency { .. }));
    }
}
