// Copyright 2024-2026 Swapline Contributors
// SPDX-License-Identifier: Apache-2.0

//! swapline-cli entry point.
//!
//! ## CLI Subcommands
//!
//! - `swapline-cli parse <TEXT>` - Show the intent parsed from text
//! - `swapline-cli plan <TEXT>` - Show the build plan for text
//! - `swapline-cli catalog <FILE>` - Validate and list a JSON catalog
//! - `swapline-cli config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;

use swapline::cli::{catalog_cmd, config_cmd, parse_cmd, EXIT_FAILURE};
use swapline::telemetry;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    if let Ok(config) = swapline::config::load() {
        // Logs go to stderr or the configured file; stdout stays for output.
        let _ = telemetry::init_logging(&config.log);
    }

    let code = match command {
        "parse" => {
            let (text, flags) = text_and_flags(&args[2..]);
            match text {
                Some(text) => parse_cmd::run_parse(&text, flags.json),
                None => usage_error("parse"),
            }
        }
        "plan" => {
            let (text, flags) = text_and_flags(&args[2..]);
            match text {
                Some(text) => parse_cmd::run_plan(&text, flags.index.as_deref(), flags.json),
                None => usage_error("plan"),
            }
        }
        "catalog" => match args.get(2) {
            Some(path) => catalog_cmd::run_catalog(path),
            None => usage_error("catalog"),
        },
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => config_cmd::run_show(),
                "defaults" => {
                    config_cmd::run_defaults();
                    0
                }
                "validate" => config_cmd::run_validate(),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    EXIT_FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            match args.get(2) {
                Some(subcommand) => print_command_help(subcommand),
                None => print_usage(),
            }
            0
        }
        "version" | "--version" | "-V" => {
            println!("swapline-cli {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            EXIT_FAILURE
        }
    };
    ExitCode::from(code as u8)
}

#[derive(Debug, Default)]
struct Flags {
    json: bool,
    index: Option<String>,
}

/// Split arguments into free text (joined with spaces) and flags.
fn text_and_flags(args: &[String]) -> (Option<String>, Flags) {
    let mut flags = Flags::default();
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => flags.json = true,
            "--index" => flags.index = iter.next().cloned(),
            _ => words.push(arg.as_str()),
        }
    }
    let text = words.join(" ");
    let text = if text.trim().is_empty() { None } else { Some(text) };
    (text, flags)
}

fn usage_error(command: &str) -> i32 {
    eprintln!("Missing argument for `{}`.", command);
    print_command_help(command);
    EXIT_FAILURE
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "swapline-cli - component hot-swap runtime tools v{}

USAGE:
    swapline-cli [COMMAND] [OPTIONS]

COMMANDS:
    parse        Show the change intent parsed from text
    plan         Show the build plan for a change described in text
    catalog      Validate and list a JSON component catalog
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    swapline-cli parse \"fix the memory bar color\"
    swapline-cli plan \"add a cpu gauge threshold\" --index index.json
    swapline-cli catalog catalog.json
    swapline-cli config validate

ENVIRONMENT:
    SWAPLINE_CONFIG      TOML configuration file
    SWAPLINE_VOCABULARY  Vocabulary JSON (built-in system health tree if unset)
    SWAPLINE_INDEX       Component index JSON (derived from the vocabulary if unset)
    SWAPLINE_LOG_LEVEL   Log filter (debug, info, warn, error)

EXIT CODES:
    0  Success
    1  Failure / needs clarification
    2  Configuration or input file error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "parse" => eprintln!(
            "swapline-cli parse - Parse a change description

USAGE:
    swapline-cli parse <TEXT> [--json]

DESCRIPTION:
    Matches the text against the component vocabulary and prints the
    target path, build level, action and matched keywords. Exits 1 when
    nothing matched and the request needs clarification.
"
        ),
        "plan" => eprintln!(
            "swapline-cli plan - Plan a change described in text

USAGE:
    swapline-cli plan <TEXT> [--index FILE] [--json]

DESCRIPTION:
    Parses the text, then lists the affected components, tests, files and
    the estimated build time from the component index.
"
        ),
        "catalog" => eprintln!(
            "swapline-cli catalog - Validate a component catalog

USAGE:
    swapline-cli catalog <FILE>

EXIT CODES:
    0  Catalog is valid
    2  Catalog cannot be read or is invalid
"
        ),
        "config" => eprintln!(
            "swapline-cli config - Inspect configuration

USAGE:
    swapline-cli config show       Print effective values
    swapline-cli config defaults   Print defaults
    swapline-cli config validate   Report misconfigurations (exit 1 on warnings)
"
        ),
        _ => print_usage(),
    }
}
