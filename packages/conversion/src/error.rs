//! Error types for conversion

use folio_model::{ModelError, NodeId};
use folio_view::{ViewError, ViewNodeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("Model root {0} is not bound to a view root")]
    UnmappedRoot(String),

    #[error("Model element {0} has no view element")]
    UnmappedModelElement(NodeId),

    #[error("View element {0:?} has no model element")]
    UnmappedViewElement(ViewNodeId),

    #[error("Cannot map position {position} to the view")]
    UnmappedPosition { position: String },
}

pub type ConversionResult<T> = Result<T, ConversionError>;
