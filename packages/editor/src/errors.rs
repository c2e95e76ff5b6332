//! Error types for the editor

use folio_conversion::ConversionError;
use folio_model::ModelError;
use folio_view::ViewError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Editor is read-only")]
    ReadOnly,

    #[error("No such root: {0}")]
    NoSuchRoot(String),
}

pub type EditorResult<T> = Result<T, EditorError>;
