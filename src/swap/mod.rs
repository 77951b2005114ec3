//! Hot-swap coordination: deploy a tested build into the running registry.

mod coordinator;
mod error;

pub use coordinator::{HotSwapCoordinator, SwapOutcome};
pub use error::SwapError;
