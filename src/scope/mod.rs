//! Scope analysis: from a target path to the minimal build plan.

mod analyzer;
mod index;
mod plan;

pub use analyzer::ScopeAnalyzer;
pub use index::{ComponentIndex, IndexError, IndexNode};
pub use plan::{BuildPlan, DurationTable};
