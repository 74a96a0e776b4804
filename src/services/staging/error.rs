use thiserror::Error;

use crate::utils::validation::ValidationError;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("No file uploaded")]
    EmptyUpload,

    #[error("Field identifier is not provided for the current file upload")]
    MissingField,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
