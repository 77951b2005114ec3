//! Hierarchy vocabulary the intent parser matches against.
//!
//! Nodes are listed in precedence order. A node is entered when one of its
//! keywords appears in the text, or, for implicit nodes, when some
//! descendant can be entered. Siblings are tried in declaration order and the
//! first enterable one wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::component::ComponentPath;

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid vocabulary JSON: {0}")]
    Parse(String),

    #[error("Invalid vocabulary node {segment:?}: {reason}")]
    Invalid { segment: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyNode {
    pub segment: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Entered when a descendant matches even if no own keyword does.
    #[serde(default)]
    pub implicit: bool,
    #[serde(default)]
    pub children: Vec<VocabularyNode>,
}

impl VocabularyNode {
    pub fn new(segment: &str, keywords: &[&str], children: Vec<VocabularyNode>) -> Self {
        Self {
            segment: segment.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            implicit: false,
            children,
        }
    }

    pub fn implicit(segment: &str, keywords: &[&str], children: Vec<VocabularyNode>) -> Self {
        Self {
            implicit: true,
            ..Self::new(segment, keywords, children)
        }
    }

    fn validate(&self) -> Result<(), VocabularyError> {
        let invalid = |reason: &str| VocabularyError::Invalid {
            segment: self.segment.clone(),
            reason: reason.to_string(),
        };
        match ComponentPath::parse(&self.segment) {
            Ok(path) if path.depth() == 1 => {}
            _ => return Err(invalid("segment must be a single path segment")),
        }
        if self.keywords.is_empty() && !self.implicit {
            return Err(invalid("explicit node has no keywords"));
        }
        if self.keywords.iter().any(|k| normalize_keyword(k).is_empty()) {
            return Err(invalid("empty keyword"));
        }
        let mut seen = std::collections::HashSet::new();
        for child in &self.children {
            if !seen.insert(child.segment.as_str()) {
                return Err(invalid("duplicate child segment"));
            }
            child.validate()?;
        }
        Ok(())
    }
}

/// Lowercased NFKC form with whitespace collapsed, as keywords are matched.
pub(crate) fn normalize_keyword(keyword: &str) -> String {
    let folded: String = keyword.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub nodes: Vec<VocabularyNode>,
}

impl Vocabulary {
    pub fn new(nodes: Vec<VocabularyNode>) -> Result<Self, VocabularyError> {
        let vocabulary = Self { nodes };
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    pub fn from_json(json: &str) -> Result<Self, VocabularyError> {
        let vocabulary: Self =
            serde_json::from_str(json).map_err(|e| VocabularyError::Parse(e.to_string()))?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let content = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    fn validate(&self) -> Result<(), VocabularyError> {
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.segment.as_str()) {
                return Err(VocabularyError::Invalid {
                    segment: node.segment.clone(),
                    reason: "duplicate top-level segment".to_string(),
                });
            }
            node.validate()?;
        }
        Ok(())
    }

    /// Every distinct normalized keyword.
    pub fn keywords(&self) -> Vec<String> {
        fn collect(nodes: &[VocabularyNode], out: &mut Vec<String>) {
            for node in nodes {
                for keyword in &node.keywords {
                    let keyword = normalize_keyword(keyword);
                    if !out.contains(&keyword) {
                        out.push(keyword);
                    }
                }
                collect(&node.children, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.nodes, &mut out);
        out
    }

    /// Every node path, parents before children, in precedence order.
    pub fn paths(&self) -> Vec<ComponentPath> {
        fn walk(nodes: &[VocabularyNode], prefix: Option<&ComponentPath>, out: &mut Vec<ComponentPath>) {
            for node in nodes {
                let path = match prefix {
                    Some(prefix) => prefix.child(&node.segment),
                    None => ComponentPath::parse(&node.segment),
                };
                // Segments are validated on construction.
                if let Ok(path) = path {
                    out.push(path.clone());
                    walk(&node.children, Some(&path), out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, None, &mut out);
        out
    }

    /// Built-in vocabulary for the system-health dashboard.
    pub fn system_health() -> Self {
        fn display(primary: VocabularyNode) -> VocabularyNode {
            VocabularyNode::implicit(
                "display",
                &["display", "panel", "view"],
                vec![
                    primary,
                    VocabularyNode::new(
                        "label",
                        &["label", "caption", "text"],
                        vec![
                            VocabularyNode::new("font", &["font", "typeface"], vec![]),
                            VocabularyNode::new("color", &["text color"], vec![]),
                        ],
                    ),
                ],
            )
        }
        fn styled(segment: &str, keywords: &[&str]) -> VocabularyNode {
            VocabularyNode::new(
                segment,
                keywords,
                vec![
                    VocabularyNode::new("color", &["color", "colour"], vec![]),
                    VocabularyNode::new("animation", &["animation", "animate", "animated"], vec![]),
                    VocabularyNode::new("threshold", &["threshold", "warning level"], vec![]),
                ],
            )
        }
        fn sampler() -> VocabularyNode {
            VocabularyNode::new(
                "sampler",
                &["sampler", "sampling", "polling", "poll"],
                vec![VocabularyNode::new(
                    "interval",
                    &["interval", "frequency", "refresh rate"],
                    vec![],
                )],
            )
        }

        Self {
            nodes: vec![VocabularyNode::implicit(
                "systemHealth",
                &["system health", "health dashboard", "health"],
                vec![
                    VocabularyNode::new(
                        "cpu",
                        &["cpu", "processor"],
                        vec![display(styled("graph", &["graph", "chart", "sparkline"])), sampler()],
                    ),
                    VocabularyNode::new(
                        "memory",
                        &["memory", "ram"],
                        vec![display(styled("bar", &["bar", "progress bar", "meter"])), sampler()],
                    ),
                    VocabularyNode::new(
                        "disk",
                        &["disk", "storage"],
                        vec![display(styled("gauge", &["gauge", "dial"])), sampler()],
                    ),
                    VocabularyNode::new(
                        "network",
                        &["network", "bandwidth", "throughput"],
                        vec![display(styled("graph", &["graph", "chart"])), sampler()],
                    ),
                ],
            )],
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::system_health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_vocabulary_is_valid() {
        let vocab = Vocabulary::system_health();
        vocab.validate().unwrap();
        let paths: Vec<String> = vocab.paths().iter().map(|p| p.to_string()).collect();
        assert!(paths.contains(&"systemHealth.memory.display.bar.color".to_string()));
        assert!(paths.contains(&"systemHealth.cpu.sampler.interval".to_string()));
    }

    #[test]
    fn test_json_round_trip_and_defaults() {
        let vocab = Vocabulary::from_json(
            r#"{"nodes": [{"segment": "editor", "keywords": ["editor"], "children": [
                {"segment": "tabs", "keywords": ["Tabs", "tab  bar"]}
            ]}]}"#,
        )
        .unwrap();
        assert!(!vocab.nodes[0].implicit);
        assert_eq!(vocab.keywords(), vec!["editor", "tabs", "tab bar"]);
    }

    #[test]
    fn test_explicit_node_needs_keywords() {
        let err = Vocabulary::from_json(r#"{"nodes": [{"segment": "editor"}]}"#).unwrap_err();
        assert!(matches!(err, VocabularyError::Invalid { .. }));
    }

    #[test]
    fn test_dotted_segment_rejected() {
        let err = Vocabulary::new(vec![VocabularyNode::new("a.b", &["a"], vec![])]).unwrap_err();
        assert!(matches!(err, VocabularyError::Invalid { .. }));
    }
}
