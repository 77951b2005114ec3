//! Level-to-strategy dispatch.

use serde::{Deserialize, Serialize};

use super::error::BuildError;
use crate::component::BuildLevel;

/// How much of the tree one compile covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Property, widget or component: compile the one component.
    SingleComponent,
    /// Feature or submodule: compile the subtree and package it.
    SubTree,
    /// Module: compile the whole module.
    WholeModule,
}

impl BuildStrategy {
    pub fn for_level(level: BuildLevel, target: &str) -> Result<Self, BuildError> {
        match level {
            BuildLevel::Property | BuildLevel::Widget | BuildLevel::Component => Ok(Self::SingleComponent),
            BuildLevel::Feature | BuildLevel::Submodule => Ok(Self::SubTree),
            BuildLevel::Module => Ok(Self::WholeModule),
            BuildLevel::System => Err(BuildError::NotSupported(level)),
            BuildLevel::Unknown => Err(BuildError::EmptyPlan(target.to_string())),
        }
    }

    /// Whether the compiled output is bundled into a package.
    pub fn packages(&self) -> bool {
        matches!(self, Self::SubTree | Self::WholeModule)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleComponent => "single_component",
            Self::SubTree => "sub_tree",
            Self::WholeModule => "whole_module",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        assert_eq!(BuildStrategy::for_level(BuildLevel::Widget, "w"), Ok(BuildStrategy::SingleComponent));
        assert_eq!(BuildStrategy::for_level(BuildLevel::Submodule, "s"), Ok(BuildStrategy::SubTree));
        assert_eq!(BuildStrategy::for_level(BuildLevel::Module, "m"), Ok(BuildStrategy::WholeModule));
        assert_eq!(
            BuildStrategy::for_level(BuildLevel::System, "k"),
            Err(BuildError::NotSupported(BuildLevel::System))
        );
        assert!(matches!(
            BuildStrategy::for_level(BuildLevel::Unknown, "x"),
            Err(BuildError::EmptyPlan(_))
        ));
    }
}
