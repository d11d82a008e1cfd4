//! Error types for the damage record store

use surveyor_types::{ResponseError, ValidationError};
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("Damage not found: {0}")]
    UnknownDamage(String),

    #[error("{what} upload failed: {source}")]
    Upload {
        what: &'static str,
        source: BackendError,
    },
}

impl StoreError {
    /// True when nothing was sent because the input was invalid
    pub fn is_local(&self) -> bool {
        matches!(self, StoreError::Validation(_) | StoreError::UnknownDamage(_))
    }
}
