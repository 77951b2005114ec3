use thiserror::Error;

use crate::build::BuildError;
use crate::component::{ComponentId, ComponentPath};
use crate::registry::{HistoryError, RegistryError};

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Build is not deployable: {0}")]
    Build(#[from] BuildError),

    #[error("{0} is not hot-swappable")]
    NotSupported(ComponentPath),

    #[error("A swap of {0} is already in progress")]
    InProgress(ComponentId),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Version history not saved: {0}")]
    History(#[from] HistoryError),
}
