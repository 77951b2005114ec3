//! Crate-level error aggregating every module's failures.

use thiserror::Error;

use crate::build::BuildError;
use crate::config::ConfigError;
use crate::intent::VocabularyError;
use crate::registry::{HistoryError, RegistryError};
use crate::scope::IndexError;
use crate::swap::SwapError;
use crate::telemetry::LogError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot tell what to change in {text:?}; please name the component")]
    ClarificationNeeded { text: String },

    #[error("No {0} configured")]
    MissingCapability(&'static str),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Log(#[from] LogError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Failing test names, wherever in the pipeline they surfaced.
    pub fn failed_tests(&self) -> Option<&[String]> {
        match self {
            Self::Build(BuildError::TestsFailed { failed })
            | Self::Swap(SwapError::Build(BuildError::TestsFailed { failed })) => Some(failed.as_slice()),
            _ => None,
        }
    }
}
