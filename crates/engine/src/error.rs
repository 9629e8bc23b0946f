//! Shared error types for the engine crate.

use thiserror::Error;

use backend::BackendError;
use drill_core::model::{AttemptError, GroupError, SelectionError, SummaryError};

use crate::interactive::SurfaceError;

/// Errors emitted by session drivers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("no questions available for this topic")]
    Empty,

    #[error("session already completed")]
    Completed,

    #[error("current question is not resolved yet")]
    Unresolved,

    #[error("current question is already resolved")]
    AlreadyResolved,

    #[error("current question is not interactive")]
    NotInteractive,

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
