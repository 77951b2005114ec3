//! Maps a target path to the smallest build plan that covers it.

use std::sync::Arc;

use tracing::debug;

use super::index::ComponentIndex;
use super::plan::{BuildPlan, DurationTable};
use crate::component::{BuildLevel, ComponentId, ComponentPath};
use crate::intent::{ChangeAction, ChangeRequest, Intent};

#[derive(Debug, Clone)]
pub struct ScopeAnalyzer {
    index: Arc<ComponentIndex>,
    durations: DurationTable,
}

impl ScopeAnalyzer {
    pub fn new(index: Arc<ComponentIndex>, durations: DurationTable) -> Self {
        Self { index, durations }
    }

    pub fn index(&self) -> &Arc<ComponentIndex> {
        &self.index
    }

    pub fn analyze(&self, target: &ComponentPath, action: ChangeAction) -> BuildPlan {
        let Some(node) = self.index.get(target) else {
            debug!(target = %target, "target not indexed; empty plan");
            return BuildPlan::empty(target.clone(), action);
        };

        let level = node.level.unwrap_or_else(|| BuildLevel::from_depth(target.depth()));

        let mut affected = target.ancestors();
        affected.push(target.clone());
        for dependent in self.index.dependents_of(target) {
            if !affected.contains(&dependent) {
                affected.push(dependent);
            }
        }

        let hot_swappable = affected
            .iter()
            .all(|path| self.index.is_hot_swappable(path).unwrap_or(true));

        let files = match level {
            BuildLevel::Feature | BuildLevel::Submodule | BuildLevel::Module => node.subtree_files(),
            _ => node.files.clone(),
        };

        let plan = BuildPlan {
            target_path: target.clone(),
            level,
            action,
            tests_to_run: affected.iter().map(ToString::to_string).collect(),
            affected_components: affected,
            estimated_duration: self.durations.estimate(level),
            hot_swappable,
            files,
            component: Some(
                node.component
                    .clone()
                    .unwrap_or_else(|| ComponentId::from(target)),
            ),
            base_version: None,
        };
        debug!(
            target = %target,
            level = %plan.level,
            affected = plan.affected_components.len(),
            hot_swappable = plan.hot_swappable,
            "build plan computed"
        );
        plan
    }

    pub fn plan_request(&self, request: &ChangeRequest) -> BuildPlan {
        self.analyze(&request.target_path, request.action)
    }

    /// Plan for a parsed intent; `None` when the intent needs clarification.
    pub fn plan_intent(&self, intent: &Intent) -> Option<BuildPlan> {
        intent.to_request().map(|request| self.plan_request(&request))
    }
}
