//! Error types for the model

use thiserror::Error;

/// Invalid position construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("Position path cannot be empty")]
    EmptyPath,

    #[error("You cannot make a position before root")]
    BeforeRoot,

    #[error("You cannot make a position after root")]
    AfterRoot,

    #[error("Positions are in different roots: {0} and {1}")]
    DifferentRoots(String, String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("No such root: {0}")]
    NoSuchRoot(String),

    #[error("Root already exists: {0}")]
    RootExists(String),

    #[error("Invalid path {path:?} in root {root}")]
    InvalidPath { root: String, path: Vec<usize> },

    #[error("Offset {offset} is out of bounds (max offset {max})")]
    OffsetOutOfBounds { offset: usize, max: usize },

    #[error("Operation base version {actual} does not match document version {expected}")]
    OperationVersion { expected: u64, actual: u64 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Range start is after range end")]
    InvalidRange,

    #[error("Range is not flat")]
    RangeNotFlat,

    #[error("Marker already exists: {0}")]
    MarkerExists(String),

    #[error("Marker does not exist: {0}")]
    MarkerNotFound(String),

    #[error("Schema item is already registered: {0}")]
    SchemaItemExists(String),

    #[error("Unknown schema item: {0}")]
    UnknownSchemaItem(String),

    #[error("Schema does not allow {child} in {parent}")]
    NotAllowed { parent: String, child: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    pub fn invalid_path(root: &str, path: &[usize]) -> Self {
        ModelError::InvalidPath {
            root: root.to_string(),
            path: path.to_vec(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ModelError::InvalidOperation(message.into())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Serialization(e.to_string())
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
