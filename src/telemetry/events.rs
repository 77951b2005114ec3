//! Lifecycle audit log.
//!
//! Every load, unload, swap and rejected change is emitted as a structured
//! event under the `swapline::lifecycle` target so hosts can route it apart
//! from ordinary diagnostics.

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Loaded,
    LoadFailed,
    Unloaded,
    UnloadRejected,
    Swapped,
    SwapRejected,
    CycleDetected,
    BuildFailed,
    TestsFailed,
    RolledBack,
}

impl LifecycleEvent {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Loaded | Self::Unloaded | Self::Swapped => Severity::Info,
            Self::RolledBack => Severity::Warning,
            Self::UnloadRejected | Self::SwapRejected => Severity::Warning,
            Self::LoadFailed | Self::CycleDetected => Severity::Error,
            Self::BuildFailed | Self::TestsFailed => Severity::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::LoadFailed => "load_failed",
            Self::Unloaded => "unloaded",
            Self::UnloadRejected => "unload_rejected",
            Self::Swapped => "swapped",
            Self::SwapRejected => "swap_rejected",
            Self::CycleDetected => "cycle_detected",
            Self::BuildFailed => "build_failed",
            Self::TestsFailed => "tests_failed",
            Self::RolledBack => "rolled_back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Emit one lifecycle event with structured details.
///
/// ```
/// use swapline::telemetry::{log_lifecycle_event, LifecycleEvent};
///
/// log_lifecycle_event(
///     LifecycleEvent::Swapped,
///     "systemHealth.memory",
///     "component hot-swapped",
///     &[("from", "1.0.0"), ("to", "1.0.1")],
/// );
/// ```
pub fn log_lifecycle_event(event: LifecycleEvent, component: &str, message: &str, details: &[(&str, &str)]) {
    let details = details
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    let event_type = event.as_str();

    match event.severity() {
        Severity::Debug => debug!(target: "swapline::lifecycle", event = event_type, component, details = %details, "{}", message),
        Severity::Info => info!(target: "swapline::lifecycle", event = event_type, component, details = %details, "{}", message),
        Severity::Warning => warn!(target: "swapline::lifecycle", event = event_type, component, details = %details, "{}", message),
        Severity::Error => error!(target: "swapline::lifecycle", event = event_type, component, details = %details, "{}", message),
    }
}
