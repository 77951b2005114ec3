//! Runtime configuration from environment variables and an optional TOML file.
//!
//! Values come from `SWAPLINE_*` environment variables with sensible
//! defaults. When `SWAPLINE_CONFIG` names a TOML file, its values replace the
//! defaults and environment variables still override the file. Invalid
//! environment values fall back without crashing; an unreadable or malformed
//! config file is an error.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SWAPLINE_CONFIG` | unset | TOML config file |
//! | `SWAPLINE_BUILD_TIMEOUT` | 300 | Compile and per-test timeout (secs) |
//! | `SWAPLINE_MAX_BUILDS` | CPU count | Max concurrent builds |
//! | `SWAPLINE_SOURCE_ROOT` | `.` | Root that plan files are relative to |
//! | `SWAPLINE_ARTIFACT_DIR` | `artifacts` | Where artifacts are written |
//! | `SWAPLINE_HISTORY_PATH` | unset | Version history JSON file |
//! | `SWAPLINE_CATALOG` | unset | JSON catalog file |
//! | `SWAPLINE_INDEX` | unset | JSON component index file |
//! | `SWAPLINE_VOCABULARY` | unset | JSON vocabulary file |
//! | `SWAPLINE_COMPILER` | unset | Compiler program |
//! | `SWAPLINE_COMPILER_ARGS` | empty | Compiler arguments (whitespace separated) |
//! | `SWAPLINE_TEST_RUNNER` | unset | Test runner program |
//! | `SWAPLINE_TEST_RUNNER_ARGS` | empty | Test runner arguments |
//! | `SWAPLINE_DURATION_<LEVEL>` | 15..300 | Build estimate per level (secs) |
//! | `SWAPLINE_LOG_LEVEL` | `info` | Log filter directive |
//! | `SWAPLINE_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `SWAPLINE_LOG_FILE` | unset | Log file (stderr when unset) |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::build::{BuildConfig, CommandCompiler, CommandTestRunner};
use crate::scope::DurationTable;
use crate::telemetry::{LogConfig, LogFormat};

pub const CONFIG_ENV: &str = "SWAPLINE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// An external program with fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// All runtime configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub build: BuildConfig,
    pub durations: DurationTable,
    pub compiler: Option<CommandSpec>,
    pub test_runner: Option<CommandSpec>,
    pub history_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub index_path: Option<PathBuf>,
    pub vocabulary_path: Option<PathBuf>,
    pub log: LogConfig,
}

impl Config {
    pub fn command_compiler(&self) -> Option<CommandCompiler> {
        self.compiler
            .as_ref()
            .map(|spec| CommandCompiler::new(&spec.program).with_args(spec.args.clone()))
    }

    pub fn command_test_runner(&self) -> Option<CommandTestRunner> {
        self.test_runner
            .as_ref()
            .map(|spec| CommandTestRunner::new(&spec.program).with_args(spec.args.clone()))
    }

    /// Flat summary of every effective value.
    pub fn effective_config(&self) -> EffectiveConfig {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        let command = |c: &Option<CommandSpec>| {
            c.as_ref()
                .map(|c| {
                    let mut parts = vec![c.program.clone()];
                    parts.extend(c.args.iter().cloned());
                    parts.join(" ")
                })
                .unwrap_or_default()
        };
        EffectiveConfig {
            build_timeout_secs: self.build.timeout.as_secs(),
            max_concurrent_builds: self.build.max_concurrent_builds,
            source_root: self.build.source_root.display().to_string(),
            artifact_dir: self.build.artifact_dir.display().to_string(),
            history_path: path(&self.history_path),
            catalog_path: path(&self.catalog_path),
            index_path: path(&self.index_path),
            vocabulary_path: path(&self.vocabulary_path),
            compiler: command(&self.compiler),
            test_runner: command(&self.test_runner),
            durations: self.durations,
            log_level: self.log.level.clone(),
            log_format: self.log.format,
            log_file: path(&self.log.output_path),
        }
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub build_timeout_secs: u64,
    pub max_concurrent_builds: usize,
    pub source_root: String,
    pub artifact_dir: String,
    pub history_path: String,
    pub catalog_path: String,
    pub index_path: String,
    pub vocabulary_path: String,
    pub compiler: String,
    pub test_runner: String,
    pub durations: DurationTable,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: String,
}

impl EffectiveConfig {
    /// `(ENV_VAR, value)` pairs in documentation order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let d = &self.durations;
        vec![
            ("SWAPLINE_BUILD_TIMEOUT", self.build_timeout_secs.to_string()),
            ("SWAPLINE_MAX_BUILDS", self.max_concurrent_builds.to_string()),
            ("SWAPLINE_SOURCE_ROOT", self.source_root.clone()),
            ("SWAPLINE_ARTIFACT_DIR", self.artifact_dir.clone()),
            ("SWAPLINE_HISTORY_PATH", self.history_path.clone()),
            ("SWAPLINE_CATALOG", self.catalog_path.clone()),
            ("SWAPLINE_INDEX", self.index_path.clone()),
            ("SWAPLINE_VOCABULARY", self.vocabulary_path.clone()),
            ("SWAPLINE_COMPILER", self.compiler.clone()),
            ("SWAPLINE_TEST_RUNNER", self.test_runner.clone()),
            ("SWAPLINE_DURATION_PROPERTY", d.property_secs.to_string()),
            ("SWAPLINE_DURATION_WIDGET", d.widget_secs.to_string()),
            ("SWAPLINE_DURATION_COMPONENT", d.component_secs.to_string()),
            ("SWAPLINE_DURATION_FEATURE", d.feature_secs.to_string()),
            ("SWAPLINE_DURATION_SUBMODULE", d.submodule_secs.to_string()),
            ("SWAPLINE_DURATION_MODULE", d.module_secs.to_string()),
            ("SWAPLINE_DURATION_SYSTEM", d.system_secs.to_string()),
            ("SWAPLINE_LOG_LEVEL", self.log_level.clone()),
            (
                "SWAPLINE_LOG_FORMAT",
                match self.log_format {
                    LogFormat::Json => "json".to_string(),
                    LogFormat::Pretty => "pretty".to_string(),
                    LogFormat::Compact => "compact".to_string(),
                },
            ),
            ("SWAPLINE_LOG_FILE", self.log_file.clone()),
        ]
    }
}

// ----------------------------------------------------------------------
// TOML file layer
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub build: FileBuild,
    pub paths: FilePaths,
    pub compiler: Option<CommandSpec>,
    pub test_runner: Option<CommandSpec>,
    pub durations: Option<DurationTable>,
    pub logging: FileLogging,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileBuild {
    pub timeout_secs: Option<u64>,
    pub max_concurrent_builds: Option<usize>,
    pub source_root: Option<PathBuf>,
    pub artifact_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilePaths {
    pub history: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub index: Option<PathBuf>,
    pub vocabulary: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLogging {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    pub file: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }
}

// ----------------------------------------------------------------------
// Environment layer
// ----------------------------------------------------------------------

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Non-empty string env var.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_path(key: &str, default: Option<PathBuf>) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from).or(default)
}

fn env_command(program_key: &str, args_key: &str, default: Option<CommandSpec>) -> Option<CommandSpec> {
    let mut spec = match env_string(program_key) {
        Some(program) => Some(CommandSpec {
            program,
            args: Vec::new(),
        }),
        None => default,
    }?;
    if let Some(args) = env_string(args_key) {
        spec.args = args.split_whitespace().map(str::to_string).collect();
    }
    Some(spec)
}

fn load_build_config(file: &FileBuild) -> BuildConfig {
    let defaults = BuildConfig::default();
    let timeout = parse_u64(
        "SWAPLINE_BUILD_TIMEOUT",
        file.timeout_secs.unwrap_or(defaults.timeout.as_secs()),
    );
    let max_builds = parse_usize(
        "SWAPLINE_MAX_BUILDS",
        file.max_concurrent_builds.unwrap_or(defaults.max_concurrent_builds),
    );
    BuildConfig {
        timeout: Duration::from_secs(timeout.max(1)),
        max_concurrent_builds: max_builds.max(1),
        source_root: env_path("SWAPLINE_SOURCE_ROOT", file.source_root.clone()).unwrap_or(defaults.source_root),
        artifact_dir: env_path("SWAPLINE_ARTIFACT_DIR", file.artifact_dir.clone()).unwrap_or(defaults.artifact_dir),
    }
}

fn load_durations(file: Option<DurationTable>) -> DurationTable {
    let base = file.unwrap_or_default();
    DurationTable {
        property_secs: parse_u64("SWAPLINE_DURATION_PROPERTY", base.property_secs),
        widget_secs: parse_u64("SWAPLINE_DURATION_WIDGET", base.widget_secs),
        component_secs: parse_u64("SWAPLINE_DURATION_COMPONENT", base.component_secs),
        feature_secs: parse_u64("SWAPLINE_DURATION_FEATURE", base.feature_secs),
        submodule_secs: parse_u64("SWAPLINE_DURATION_SUBMODULE", base.submodule_secs),
        module_secs: parse_u64("SWAPLINE_DURATION_MODULE", base.module_secs),
        system_secs: parse_u64("SWAPLINE_DURATION_SYSTEM", base.system_secs),
    }
}

fn load_log_config(file: &FileLogging) -> LogConfig {
    let defaults = LogConfig::default();
    let format = env_string("SWAPLINE_LOG_FORMAT")
        .and_then(|v| v.parse::<LogFormat>().ok())
        .or(file.format)
        .unwrap_or(defaults.format);
    LogConfig {
        format,
        level: env_string("SWAPLINE_LOG_LEVEL")
            .or_else(|| file.level.clone())
            .unwrap_or(defaults.level),
        output_path: env_path("SWAPLINE_LOG_FILE", file.file.clone()),
    }
}

/// Overlay environment variables on top of `file`.
pub fn from_file_and_env(file: FileConfig) -> Config {
    Config {
        build: load_build_config(&file.build),
        durations: load_durations(file.durations),
        compiler: env_command("SWAPLINE_COMPILER", "SWAPLINE_COMPILER_ARGS", file.compiler),
        test_runner: env_command("SWAPLINE_TEST_RUNNER", "SWAPLINE_TEST_RUNNER_ARGS", file.test_runner),
        history_path: env_path("SWAPLINE_HISTORY_PATH", file.paths.history),
        catalog_path: env_path("SWAPLINE_CATALOG", file.paths.catalog),
        index_path: env_path("SWAPLINE_INDEX", file.paths.index),
        vocabulary_path: env_path("SWAPLINE_VOCABULARY", file.paths.vocabulary),
        log: load_log_config(&file.logging),
    }
}

/// Load configuration: defaults, then `SWAPLINE_CONFIG`, then env vars.
pub fn load() -> Result<Config, ConfigError> {
    let file = match env_string(CONFIG_ENV) {
        Some(path) => FileConfig::read(Path::new(&path))?,
        None => FileConfig::default(),
    };
    Ok(from_file_and_env(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "SWAPLINE_CONFIG",
        "SWAPLINE_BUILD_TIMEOUT",
        "SWAPLINE_MAX_BUILDS",
        "SWAPLINE_SOURCE_ROOT",
        "SWAPLINE_ARTIFACT_DIR",
        "SWAPLINE_HISTORY_PATH",
        "SWAPLINE_CATALOG",
        "SWAPLINE_INDEX",
        "SWAPLINE_VOCABULARY",
        "SWAPLINE_COMPILER",
        "SWAPLINE_COMPILER_ARGS",
        "SWAPLINE_TEST_RUNNER",
        "SWAPLINE_TEST_RUNNER_ARGS",
        "SWAPLINE_DURATION_PROPERTY",
        "SWAPLINE_DURATION_WIDGET",
        "SWAPLINE_DURATION_COMPONENT",
        "SWAPLINE_DURATION_FEATURE",
        "SWAPLINE_DURATION_SUBMODULE",
        "SWAPLINE_DURATION_MODULE",
        "SWAPLINE_DURATION_SYSTEM",
        "SWAPLINE_LOG_LEVEL",
        "SWAPLINE_LOG_FORMAT",
        "SWAPLINE_LOG_FILE",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load().unwrap();
        assert_eq!(cfg.build.timeout.as_secs(), 300);
        assert_eq!(cfg.build.max_concurrent_builds, num_cpus::get().max(1));
        assert_eq!(cfg.build.artifact_dir, PathBuf::from("artifacts"));
        assert_eq!(cfg.durations, DurationTable::default());
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert!(cfg.compiler.is_none());
        assert!(cfg.history_path.is_none());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SWAPLINE_BUILD_TIMEOUT", "60");
        std::env::set_var("SWAPLINE_MAX_BUILDS", "3");
        std::env::set_var("SWAPLINE_DURATION_MODULE", "240");
        std::env::set_var("SWAPLINE_COMPILER", "make");
        std::env::set_var("SWAPLINE_COMPILER_ARGS", "-s component");
        std::env::set_var("SWAPLINE_LOG_FORMAT", "pretty");
        let cfg = load().unwrap();
        assert_eq!(cfg.build.timeout.as_secs(), 60);
        assert_eq!(cfg.build.max_concurrent_builds, 3);
        assert_eq!(cfg.durations.module_secs, 240);
        assert_eq!(
            cfg.compiler,
            Some(CommandSpec {
                program: "make".into(),
                args: vec!["-s".into(), "component".into()]
            })
        );
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SWAPLINE_BUILD_TIMEOUT", "soon");
        std::env::set_var("SWAPLINE_MAX_BUILDS", "0");
        std::env::set_var("SWAPLINE_LOG_FORMAT", "xml");
        let cfg = load().unwrap();
        assert_eq!(cfg.build.timeout.as_secs(), 300);
        assert_eq!(cfg.build.max_concurrent_builds, 1, "max builds has a floor of one");
        assert_eq!(cfg.log.format, LogFormat::Json);
        clear_env_vars();
    }

    #[test]
    fn test_env_overrides_file() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swapline.toml");
        std::fs::write(
            &path,
            r#"
[build]
timeout_secs = 90
artifact_dir = "/var/lib/swapline/artifacts"

[paths]
history = "/var/lib/swapline/history.json"

[compiler]
program = "cargo"
args = ["build", "--release"]

[durations]
property_secs = 5

[logging]
level = "debug"
"#,
        )
        .unwrap();
        std::env::set_var("SWAPLINE_CONFIG", &path);
        std::env::set_var("SWAPLINE_BUILD_TIMEOUT", "45");

        let cfg = load().unwrap();
        assert_eq!(cfg.build.timeout.as_secs(), 45);
        assert_eq!(cfg.build.artifact_dir, PathBuf::from("/var/lib/swapline/artifacts"));
        assert_eq!(cfg.history_path, Some(PathBuf::from("/var/lib/swapline/history.json")));
        assert_eq!(cfg.compiler.as_ref().map(|c| c.args.len()), Some(2));
        assert_eq!(cfg.durations.property_secs, 5);
        assert_eq!(cfg.durations.module_secs, 180);
        assert_eq!(cfg.log.level, "debug");
        clear_env_vars();
    }

    #[test]
    fn test_malformed_file_is_error() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[build]\ntimeout = \"long\"\n").unwrap();
        std::env::set_var("SWAPLINE_CONFIG", &path);
        assert!(matches!(load(), Err(ConfigError::Parse { .. })));

        std::env::set_var("SWAPLINE_CONFIG", dir.path().join("absent.toml"));
        assert!(matches!(load(), Err(ConfigError::Io { .. })));
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_lists_every_key() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().unwrap().effective_config();
        let entries = eff.entries();
        assert_eq!(entries.len(), ENV_KEYS.len() - 3);
        assert!(entries.iter().all(|(k, _)| ENV_KEYS.contains(k)));
    }
}
