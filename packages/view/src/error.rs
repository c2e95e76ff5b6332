//! Error types for the view

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("No such view root: {0}")]
    NoSuchRoot(String),

    #[error("View root already exists: {0}")]
    RootExists(String),

    #[error("Invalid view path {path:?} in root {root}")]
    InvalidPath { root: String, path: Vec<usize> },

    #[error("No view element with id {0}")]
    UnknownElement(u64),

    #[error("Range start and end are not in the same container")]
    InvalidRangeContainer,

    #[error("Range start is after range end")]
    InvalidRange,

    #[error("Cannot break an element of kind {0}")]
    CannotBreak(&'static str),

    #[error("Cannot insert into an element of kind {0}")]
    CannotInsert(&'static str),

    #[error("Wrapper must be an attribute element")]
    InvalidWrapper,

    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    #[error("Malformed markup at {position}: {message}")]
    Markup { position: usize, message: String },
}

impl ViewError {
    pub fn invalid_path(root: &str, path: &[usize]) -> Self {
        ViewError::InvalidPath {
            root: root.to_string(),
            path: path.to_vec(),
        }
    }
}

pub type ViewResult<T> = Result<T, ViewError>;
