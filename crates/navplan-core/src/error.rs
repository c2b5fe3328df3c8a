//! Error types surfaced by the editing engine.

use crate::model::{NodeId, RouteNode};
use crate::storage::StorageError;
use thiserror::Error;

/// A draft failed validation. Names the first invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Coarse classification of an [`EditorError`], for presentation by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Persistence,
    NotFound,
    InvalidState,
}

/// Errors returned by the connectivity service and the editor session.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StorageError),
    /// The node was persisted but the edge to `target` could not be established.
    #[error("node created but not connected to {target}: {source}")]
    Unlinked {
        node: Box<RouteNode>,
        target: NodeId,
        #[source]
        source: StorageError,
    },
    #[error("{0}")]
    InvalidState(String),
}

impl EditorError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        EditorError::InvalidState(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EditorError::Validation(_) => ErrorKind::Validation,
            EditorError::Store(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            EditorError::Store(_) | EditorError::Unlinked { .. } => ErrorKind::Persistence,
            EditorError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether earlier steps of the failed operation may already have taken effect.
    pub fn may_be_partial(&self) -> bool {
        matches!(self, EditorError::Store(_) | EditorError::Unlinked { .. })
    }
}

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[test]
    fn test_error_kinds() {
        let e: EditorError = ValidationError::new("name", "must not be empty").into();
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert_eq!(e.message(), "invalid name: must not be empty");

        let e: EditorError = StorageError::not_found(EntityKind::Node, 4).into();
        assert_eq!(e.kind(), ErrorKind::NotFound);

        let e: EditorError = StorageError::Rejected("nope".into()).into();
        assert_eq!(e.kind(), ErrorKind::Persistence);
        assert!(e.may_be_partial());

        assert_eq!(EditorError::invalid_state("busy").kind(), ErrorKind::InvalidState);
    }
}
