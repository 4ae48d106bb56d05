use std::io;

use thiserror::Error;

use annmat_core::errors::MatrixError;

/// Error type for annmat-io operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error occurred during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The stored object violates a model invariant.
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// A stored file could not be parsed.
    #[error("Parse error in {path}: {reason}")]
    Parse { path: String, reason: String },

    /// The path does not hold a stored matrix.
    #[error("Not a stored matrix directory: {0}")]
    InvalidStore(String),
}

/// Result type alias for annmat-io operations.
pub type Result<T> = std::result::Result<T, StoreError>;
