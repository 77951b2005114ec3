//! Hierarchy and build levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Nesting level of a component, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    Property,
    Widget,
    Component,
    Feature,
    Submodule,
    Module,
    System,
    App,
}

impl HierarchyLevel {
    pub const ALL: [HierarchyLevel; 8] = [
        Self::Property,
        Self::Widget,
        Self::Component,
        Self::Feature,
        Self::Submodule,
        Self::Module,
        Self::System,
        Self::App,
    ];

    /// Level implied by a path depth: 1 module, 2 feature, 3 component,
    /// 4 widget, 5 and deeper property.
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            0 => None,
            1 => Some(Self::Module),
            2 => Some(Self::Feature),
            3 => Some(Self::Component),
            4 => Some(Self::Widget),
            _ => Some(Self::Property),
        }
    }

    /// System and app components require a full host restart.
    pub fn is_hot_swappable_by_default(&self) -> bool {
        !matches!(self, Self::System | Self::App)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Widget => "widget",
            Self::Component => "component",
            Self::Feature => "feature",
            Self::Submodule => "submodule",
            Self::Module => "module",
            Self::System => "system",
            Self::App => "app",
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown hierarchy level: {}", s))
    }
}

/// Granularity at which a change is isolated for rebuilding.
///
/// `Unknown` is produced for targets that are absent from the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildLevel {
    Property,
    Widget,
    Component,
    Feature,
    Submodule,
    Module,
    System,
    Unknown,
}

impl BuildLevel {
    pub fn from_depth(depth: usize) -> Self {
        HierarchyLevel::from_depth(depth)
            .map(Self::from)
            .unwrap_or(Self::Unknown)
    }

    /// Rank with 0 as the finest level. `None` for `Unknown`.
    pub fn granularity(&self) -> Option<u8> {
        match self {
            Self::Property => Some(0),
            Self::Widget => Some(1),
            Self::Component => Some(2),
            Self::Feature => Some(3),
            Self::Submodule => Some(4),
            Self::Module => Some(5),
            Self::System => Some(6),
            Self::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Widget => "widget",
            Self::Component => "component",
            Self::Feature => "feature",
            Self::Submodule => "submodule",
            Self::Module => "module",
            Self::System => "system",
            Self::Unknown => "unknown",
        }
    }
}

impl From<HierarchyLevel> for BuildLevel {
    fn from(level: HierarchyLevel) -> Self {
        match level {
            HierarchyLevel::Property => Self::Property,
            HierarchyLevel::Widget => Self::Widget,
            HierarchyLevel::Component => Self::Component,
            HierarchyLevel::Feature => Self::Feature,
            HierarchyLevel::Submodule => Self::Submodule,
            HierarchyLevel::Module => Self::Module,
            HierarchyLevel::System | HierarchyLevel::App => Self::System,
        }
    }
}

impl fmt::Display for BuildLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_mapping_is_monotonic() {
        let mut previous = u8::MAX;
        for depth in 1..10 {
            let rank = BuildLevel::from_depth(depth).granularity().unwrap();
            assert!(rank <= previous, "depth {} got coarser", depth);
            previous = rank;
        }
        assert_eq!(BuildLevel::from_depth(0), BuildLevel::Unknown);
    }

    #[test]
    fn test_hierarchy_order_is_nesting_depth() {
        assert!(HierarchyLevel::Property < HierarchyLevel::Widget);
        assert!(HierarchyLevel::Module < HierarchyLevel::System);
        assert!(!HierarchyLevel::System.is_hot_swappable_by_default());
        assert!(HierarchyLevel::Module.is_hot_swappable_by_default());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("Widget".parse::<HierarchyLevel>(), Ok(HierarchyLevel::Widget));
        assert!("galaxy".parse::<HierarchyLevel>().is_err());
    }
}
