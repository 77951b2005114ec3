//! Component registry: the serialized lifecycle manager.
//!
//! Owns the catalog and the set of loaded components, performs load, unload,
//! reload and hot-swap, and resolves dependencies transitively.

mod arena;
mod error;
pub mod history;
mod registry;
mod resolver;

pub use error::{RegistryError, UnloadBlocker};
pub use history::{HistoryEntry, HistoryError, VersionHistory, VersionSource};
pub use registry::ComponentRegistry;
