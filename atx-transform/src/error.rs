use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemapError {
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),
}
