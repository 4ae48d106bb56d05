use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Duplicate label on {axis} axis: {label}")]
    DuplicateLabel { axis: String, label: String },

    #[error("Invalid axis: {0}. Expected \"row\" or \"column\"")]
    InvalidAxis(String),

    #[error("Key field not found in annotation table: {0}")]
    MissingKeyField(String),

    #[error("Required column not found in table: {0}")]
    MissingColumn(String),

    #[error("One-to-many merge expansion on key(s): {0}")]
    CartesianProduct(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for annmat-core operations.
pub type Result<T> = std::result::Result<T, MatrixError>;
