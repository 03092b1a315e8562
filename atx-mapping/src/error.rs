use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Duplicate namespace: {0}")]
    DuplicateNamespace(String),

    #[error("A mapping tree needs at least one namespace")]
    NoNamespaces,

    #[error("Expected {expected} names (one per namespace), got {found}")]
    NameCountMismatch { expected: usize, found: usize },

    #[error("Class {0} is already mapped")]
    DuplicateClass(String),

    #[error("Class id {0} does not belong to this tree")]
    InvalidClassId(usize),
}
