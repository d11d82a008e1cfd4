//! Validation and response errors shared across the workspace

use thiserror::Error;

/// Local input failures, rejected before any network call is made
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Please select an image file (got {0})")]
    NotAnImage(String),

    #[error("File size must be less than 10MB")]
    TooLarge { size: u64 },

    #[error("File is empty")]
    EmptyFile,

    #[error("Please upload all 3 photos from different angles")]
    IncompletePhotos,

    #[error("Please select damage type and part")]
    IncompleteMarker,

    #[error("Position out of range: ({x}, {y})")]
    PositionOutOfRange { x: f64, y: f64 },
}

/// A well-formed reply from the inference service that still cannot be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// The service declined the request (bad photo quality, unknown damage, ...)
    #[error("{0}")]
    Rejected(String),

    #[error("Response is missing `{0}`")]
    MissingField(&'static str),
}
