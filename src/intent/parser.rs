//! Keyword-driven intent parser.

use std::collections::HashSet;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use super::action::ChangeAction;
use super::vocabulary::{normalize_keyword, Vocabulary, VocabularyError, VocabularyNode};
use crate::component::{BuildLevel, ComponentPath, UNKNOWN_TARGET};

/// Words dropped during normalization.
const FILLER_WORDS: &[&str] = &["the", "a", "an"];

/// Structured change request: what to change and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub target_path: ComponentPath,
    #[serde(default)]
    pub action: ChangeAction,
}

impl ChangeRequest {
    pub fn new(target_path: ComponentPath, action: ChangeAction) -> Self {
        Self { target_path, action }
    }

    pub fn level(&self) -> BuildLevel {
        BuildLevel::from_depth(self.target_path.depth())
    }
}

/// Parser output. `target` is `None` when nothing in the text matched the
/// vocabulary; such intents need human clarification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub target: Option<ComponentPath>,
    pub level: BuildLevel,
    pub action: ChangeAction,
    /// Vocabulary keywords found in the text, in order of appearance.
    pub matched_keywords: Vec<String>,
}

impl Intent {
    /// Dotted target, or `unknown`.
    pub fn target_path(&self) -> String {
        self.target
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN_TARGET.to_string())
    }

    pub fn requires_clarification(&self) -> bool {
        self.target.is_none()
    }

    pub fn to_request(&self) -> Option<ChangeRequest> {
        self.target
            .clone()
            .map(|target_path| ChangeRequest::new(target_path, self.action))
    }
}

pub struct IntentParser {
    vocabulary: Vocabulary,
    keywords: Vec<String>,
    matcher: AhoCorasick,
    punctuation: Regex,
}

impl std::fmt::Debug for IntentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentParser")
            .field("keywords", &self.keywords.len())
            .finish()
    }
}

impl IntentParser {
    pub fn new(vocabulary: Vocabulary) -> Result<Self, VocabularyError> {
        let keywords = vocabulary.keywords();
        let matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&keywords)
            .map_err(|e| VocabularyError::Parse(e.to_string()))?;
        let punctuation =
            Regex::new(r"[^\p{L}\p{N}\s_-]+").map_err(|e| VocabularyError::Parse(e.to_string()))?;
        Ok(Self {
            vocabulary,
            keywords,
            matcher,
            punctuation,
        })
    }

    /// Parser over the built-in system-health vocabulary.
    pub fn system_health() -> Result<Self, VocabularyError> {
        Self::new(Vocabulary::system_health())
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// NFKC-fold, lowercase, strip punctuation and filler words, collapse whitespace.
    pub fn normalize(&self, text: &str) -> String {
        let folded: String = text.nfkc().collect::<String>().to_lowercase();
        let cleaned = self.punctuation.replace_all(&folded, " ");
        cleaned
            .split_whitespace()
            .filter(|word| !FILLER_WORDS.contains(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn parse(&self, text: &str) -> Intent {
        let normalized = self.normalize(text);
        let matched_keywords = self.scan(&normalized);
        let hits: HashSet<&str> = matched_keywords.iter().map(String::as_str).collect();

        let mut segments: Vec<&str> = Vec::new();
        let mut level_nodes: &[VocabularyNode] = &self.vocabulary.nodes;
        while let Some(node) = level_nodes.iter().find(|node| enterable(node, &hits)) {
            segments.push(&node.segment);
            level_nodes = &node.children;
        }

        let target = if segments.is_empty() {
            None
        } else {
            ComponentPath::from_segments(segments.iter().copied()).ok()
        };
        let level = target
            .as_ref()
            .map(|t| BuildLevel::from_depth(t.depth()))
            .unwrap_or(BuildLevel::Unknown);
        let action = normalized
            .split(' ')
            .find_map(ChangeAction::from_verb)
            .unwrap_or_default();

        debug!(
            text = %normalized,
            target = target.as_ref().map(|t| t.to_string()).unwrap_or_else(|| UNKNOWN_TARGET.to_string()),
            level = %level,
            action = %action,
            "intent parsed"
        );
        Intent {
            target,
            level,
            action,
            matched_keywords,
        }
    }

    /// Keywords that occur as whole words, in order of appearance.
    fn scan(&self, normalized: &str) -> Vec<String> {
        let bytes = normalized.as_bytes();
        let mut found: Vec<String> = Vec::new();
        for m in self.matcher.find_iter(normalized) {
            let starts_word = m.start() == 0 || bytes[m.start() - 1] == b' ';
            let ends_word = m.end() == bytes.len() || bytes[m.end()] == b' ';
            if !(starts_word && ends_word) {
                continue;
            }
            let keyword = &self.keywords[m.pattern().as_usize()];
            if !found.contains(keyword) {
                found.push(keyword.clone());
            }
        }
        found
    }
}

fn enterable(node: &VocabularyNode, hits: &HashSet<&str>) -> bool {
    let own = node
        .keywords
        .iter()
        .any(|keyword| hits.contains(normalize_keyword(keyword).as_str()));
    own || (node.implicit && node.children.iter().any(|child| enterable(child, hits)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> IntentParser {
        IntentParser::new(Vocabulary::system_health()).unwrap()
    }

    #[test]
    fn test_memory_bar_color_scenario() {
        let intent = parser().parse("change memory bar color to blue");
        assert_eq!(intent.target_path(), "systemHealth.memory.display.bar.color");
        assert_eq!(intent.action, ChangeAction::Update);
        assert_eq!(intent.level, BuildLevel::Property);
    }

    #[test]
    fn test_normalization() {
        let p = parser();
        assert_eq!(p.normalize("  Fix THE CPU, graph!  "), "fix cpu graph");
        // Fullwidth letters fold under NFKC.
        assert_eq!(p.normalize("ＣＰＵ"), "cpu");
    }

    #[test]
    fn test_nested_keyword_needs_parent() {
        let intent = parser().parse("fix the display");
        assert!(intent.requires_clarification());
        assert_eq!(intent.target_path(), UNKNOWN_TARGET);
        assert_eq!(intent.level, BuildLevel::Unknown);
        assert_eq!(intent.action, ChangeAction::Fix);
    }

    #[test]
    fn test_domain_only_is_feature() {
        let intent = parser().parse("improve cpu");
        assert_eq!(intent.target_path(), "systemHealth.cpu");
        assert_eq!(intent.level, BuildLevel::Feature);
        assert_eq!(intent.action, ChangeAction::Enhance);
    }

    #[test]
    fn test_earliest_verb_wins() {
        let intent = parser().parse("remove and then add the cpu sampler");
        assert_eq!(intent.action, ChangeAction::Remove);
        assert_eq!(intent.target_path(), "systemHealth.cpu.sampler");
    }

    #[test]
    fn test_partial_words_do_not_match() {
        let intent = parser().parse("update the barometer");
        assert!(intent.requires_clarification());
    }

    #[test]
    fn test_multi_word_keyword() {
        let intent = parser().parse("repair the memory progress bar animation");
        assert_eq!(intent.target_path(), "systemHealth.memory.display.bar.animation");
        assert!(intent.matched_keywords.contains(&"progress bar".to_string()));
    }
}
