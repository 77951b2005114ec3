//! Build plans and duration estimates.

use std::path::PathBuf;
use std::time::Duration;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::component::{BuildLevel, ComponentId, ComponentPath};
use crate::intent::ChangeAction;

/// Estimated build time per level, used as a scheduling hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationTable {
    pub property_secs: u64,
    pub widget_secs: u64,
    pub component_secs: u64,
    pub feature_secs: u64,
    pub submodule_secs: u64,
    pub module_secs: u64,
    pub system_secs: u64,
}

impl Default for DurationTable {
    fn default() -> Self {
        Self {
            property_secs: 15,
            widget_secs: 30,
            component_secs: 45,
            feature_secs: 90,
            submodule_secs: 120,
            module_secs: 180,
            system_secs: 300,
        }
    }
}

impl DurationTable {
    pub fn estimate(&self, level: BuildLevel) -> Duration {
        let secs = match level {
            BuildLevel::Property => self.property_secs,
            BuildLevel::Widget => self.widget_secs,
            BuildLevel::Component => self.component_secs,
            BuildLevel::Feature => self.feature_secs,
            BuildLevel::Submodule => self.submodule_secs,
            BuildLevel::Module => self.module_secs,
            BuildLevel::System => self.system_secs,
            BuildLevel::Unknown => 0,
        };
        Duration::from_secs(secs)
    }
}

/// What to rebuild for one change, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub target_path: ComponentPath,
    pub level: BuildLevel,
    pub action: ChangeAction,
    /// Ancestors root-first, then the target, then dependents.
    pub affected_components: Vec<ComponentPath>,
    #[serde(with = "duration_secs")]
    pub estimated_duration: Duration,
    pub hot_swappable: bool,
    pub tests_to_run: Vec<String>,
    /// Source files staged for the build, relative to the source root.
    pub files: Vec<PathBuf>,
    /// Registry identifier of the target, when the target is indexed.
    pub component: Option<ComponentId>,
    /// Version running when the plan was made.
    pub base_version: Option<Version>,
}

impl BuildPlan {
    /// Plan for a target that is not in the index.
    pub fn empty(target_path: ComponentPath, action: ChangeAction) -> Self {
        Self {
            target_path,
            level: BuildLevel::Unknown,
            action,
            affected_components: Vec::new(),
            estimated_duration: Duration::ZERO,
            hot_swappable: false,
            tests_to_run: Vec::new(),
            files: Vec::new(),
            component: None,
            base_version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.affected_components.is_empty()
    }

    pub fn with_base_version(mut self, version: Option<Version>) -> Self {
        self.base_version = version;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_estimates_grow_with_level() {
        let table = DurationTable::default();
        let levels = [
            BuildLevel::Property,
            BuildLevel::Widget,
            BuildLevel::Component,
            BuildLevel::Feature,
            BuildLevel::Submodule,
            BuildLevel::Module,
            BuildLevel::System,
        ];
        let estimates: Vec<Duration> = levels.iter().map(|l| table.estimate(*l)).collect();
        assert!(estimates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.estimate(BuildLevel::Property), Duration::from_secs(15));
        assert_eq!(table.estimate(BuildLevel::System), Duration::from_secs(300));
    }

    #[test]
    fn test_empty_plan() {
        let plan = BuildPlan::empty(ComponentPath::parse("unknown").unwrap(), ChangeAction::Fix);
        assert!(plan.is_empty());
        assert_eq!(plan.level, BuildLevel::Unknown);
    }
}
