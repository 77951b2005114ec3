// Copyright 2024-2026 Swapline Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.

use crate::cli::{load_config, EXIT_FAILURE, EXIT_OK};
use crate::config::{Config, EffectiveConfig};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() -> i32 {
    match load_config() {
        Ok(cfg) => {
            print_config(&cfg.effective_config());
            EXIT_OK
        }
        Err(code) => code,
    }
}

/// Print default config values (no file, no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&Config::default().effective_config());
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if it cannot load.
pub fn run_validate() -> i32 {
    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(code) => return code,
    };
    let warnings = validate(&cfg);
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }
    if warnings.is_empty() {
        println!("Configuration is valid.");
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}

/// Misconfigurations worth reporting.
pub fn validate(cfg: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if cfg.compiler.is_none() {
        warnings.push("SWAPLINE_COMPILER is not set; changes cannot be built".to_string());
    }
    if cfg.test_runner.is_none() {
        warnings.push("SWAPLINE_TEST_RUNNER is not set; builds cannot be tested".to_string());
    }
    if cfg.build.source_root == cfg.build.artifact_dir {
        warnings.push(format!(
            "SWAPLINE_ARTIFACT_DIR equals SWAPLINE_SOURCE_ROOT ({})",
            cfg.build.artifact_dir.display()
        ));
    }
    for (key, path) in [
        ("SWAPLINE_CATALOG", &cfg.catalog_path),
        ("SWAPLINE_INDEX", &cfg.index_path),
        ("SWAPLINE_VOCABULARY", &cfg.vocabulary_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                warnings.push(format!("{} points at a missing file: {}", key, path.display()));
            }
        }
    }
    let d = &cfg.durations;
    let tiers = [
        d.property_secs,
        d.widget_secs,
        d.component_secs,
        d.feature_secs,
        d.submodule_secs,
        d.module_secs,
        d.system_secs,
    ];
    if tiers.windows(2).any(|w| w[0] > w[1]) {
        warnings.push("SWAPLINE_DURATION_* estimates decrease with a larger scope".to_string());
    }

    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    for (key, value) in cfg.entries() {
        println!("{}={}", key, value);
    }
}
