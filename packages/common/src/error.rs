use thiserror::Error;

/// Error type shared by the event and observable helpers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Unknown priority name: {0}")]
    UnknownPriority(String),
}
