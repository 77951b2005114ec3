// Copyright 2024-2026 Swapline Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for offline Swapline commands.
//!
//! Every command works on local files and the environment; none needs a
//! running runtime.
//!
//! ## Usage
//!
//! ```bash
//! swapline-cli parse "fix the memory bar color"   # Show the parsed intent
//! swapline-cli plan "fix the memory bar color"    # Show the build plan
//! swapline-cli catalog catalog.json               # Validate and list a catalog
//! swapline-cli config show                        # Effective configuration
//! ```

pub mod catalog_cmd;
pub mod config_cmd;
pub mod parse_cmd;

use crate::config::{self, Config};
use crate::intent::{IntentParser, Vocabulary};

/// Exit code for success.
pub const EXIT_OK: i32 = 0;
/// Exit code for a failed check or an input needing clarification.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for configuration or input file errors.
pub const EXIT_CONFIG: i32 = 2;

/// Load config for a command, reporting errors on stderr.
pub(crate) fn load_config() -> Result<Config, i32> {
    config::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        EXIT_CONFIG
    })
}

/// Parser over the configured vocabulary, or the built-in one.
pub(crate) fn build_parser(config: &Config) -> Result<IntentParser, i32> {
    let vocabulary = match &config.vocabulary_path {
        Some(path) => Vocabulary::load(path),
        None => Ok(Vocabulary::system_health()),
    };
    vocabulary.and_then(IntentParser::new).map_err(|e| {
        eprintln!("Vocabulary error: {}", e);
        EXIT_CONFIG
    })
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("systemHealth.memory", 6), "system");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("mémoire", 2), "mé");
    }

    #[test]
    fn test_builtin_parser_without_vocabulary_file() {
        let parser = build_parser(&Config::default()).unwrap();
        assert!(!parser.vocabulary().keywords().is_empty());
    }
}
