// Copyright 2024-2026 Swapline Contributors
// SPDX-License-Identifier: Apache-2.0

//! Catalog CLI subcommand: validate and list a JSON catalog.

use crate::cli::{truncate, EXIT_CONFIG, EXIT_OK};
use crate::component::{CatalogProvider, JsonCatalog, ModuleMetadata};

/// Run `catalog <FILE>`.
///
/// Returns exit code: 0 when the catalog is valid, 2 otherwise.
pub fn run_catalog(path: &str) -> i32 {
    match JsonCatalog::new(path).discover() {
        Ok(entries) => {
            print_catalog(&entries);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Invalid catalog: {}", e);
            EXIT_CONFIG
        }
    }
}

/// Format and print catalog entries to stdout, sorted by identifier.
pub fn print_catalog(entries: &[ModuleMetadata]) {
    if entries.is_empty() {
        println!("Catalog is empty.");
        return;
    }

    let mut sorted: Vec<&ModuleMetadata> = entries.iter().collect();
    sorted.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    println!("{:<36} {:<12} {:>8} {:>6} {:>8}", "IDENTIFIER", "LATEST", "VERSIONS", "DEPS", "CHILDREN");
    println!("{}", "-".repeat(74));
    for entry in sorted {
        let latest = entry
            .available_versions
            .iter()
            .max()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} {:<12} {:>8} {:>6} {:>8}",
            truncate(entry.identifier.as_str(), 35),
            truncate(&latest, 11),
            entry.available_versions.len(),
            entry.dependencies.len(),
            entry.children.len(),
        );
    }
    println!("{}", "-".repeat(74));
    println!("{} catalog entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}
