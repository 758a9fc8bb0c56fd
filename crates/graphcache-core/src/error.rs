//! Error types for the cache engine.
//!
//! Errors are split by when they can occur:
//! - [`QueryError`]: the query document itself is unusable (raised while
//!   parsing, before any graph is touched).
//! - [`CacheError`]: everything that can go wrong during a read, write,
//!   transaction, restore or migration.
//!
//! Consistency errors are internal invariant violations; callers can tell
//! them apart from user-caused errors with [`CacheError::is_bug`].

use thiserror::Error;

use crate::schema::{NodeId, PathSegment};

/// Renders a path as `a.b.0.c`, or `[]` for the empty path.
pub fn pretty_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "[]".to_string();
    }
    path.iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Errors raised while turning a query document into a parsed operation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// Two selections of the same response key disagree.
    #[error("Conflicting field definitions: {message} at {}", pretty_path(path))]
    ConflictingFields {
        message: String,
        path: Vec<PathSegment>,
    },

    /// A fragment spread names a fragment that is not in the document.
    #[error("Expected fragment {name} to be defined at {}", pretty_path(path))]
    UnknownFragment {
        name: String,
        path: Vec<PathSegment>,
    },

    /// A variable is referenced but no value (or default) was supplied.
    #[error("Expected variable ${name} to exist for query")]
    MissingVariable { name: String },

    /// The operation's variable declarations do not match its usage.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// The selection set resolved to no fields.
    #[error("Parsed a query, but found no fields present; it may use unsupported GraphQL features")]
    EmptySelection,

    /// The document has no operation (or named fragment) to execute.
    #[error("document does not contain an operation")]
    MissingOperation,

    /// The document has more than one operation.
    #[error("document contains {count} operations; expected exactly one")]
    AmbiguousOperation { count: usize },

    /// The source text could not be parsed.
    #[error("failed to parse query document: {message}")]
    Parse { message: String },
}

impl QueryError {
    /// Create a new ConflictingFields error.
    pub fn conflicting_fields(message: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self::ConflictingFields {
            message: message.into(),
            path,
        }
    }

    /// Create a new UnknownFragment error.
    pub fn unknown_fragment(name: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self::UnknownFragment {
            name: name.into(),
            path,
        }
    }

    /// Create a new MissingVariable error.
    pub fn missing_variable(name: impl Into<String>) -> Self {
        Self::MissingVariable { name: name.into() }
    }

    /// Create a new InvalidOperation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

/// Errors raised by cache operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The query could not be parsed or expanded.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The payload contradicts the query, or flips entity identity.
    #[error("{message} at {} (node {node_id})", pretty_path(&join_paths(prefix_path, path)))]
    InvalidPayload {
        message: String,
        prefix_path: Vec<PathSegment>,
        node_id: NodeId,
        path: Vec<PathSegment>,
    },

    /// The cache does not hold enough data to satisfy a query.
    #[error("{message}")]
    UnsatisfiedCache { message: String },

    /// An internal invariant was violated.
    #[error("BUG: {message}")]
    Consistency { message: String },

    /// A user-supplied callback (updater, migration) failed.
    #[error("callback failed: {message}")]
    Callback { message: String },
}

impl CacheError {
    /// Create a new InvalidPayload error.
    pub fn invalid_payload(
        message: impl Into<String>,
        prefix_path: &[PathSegment],
        node_id: impl Into<NodeId>,
        path: &[PathSegment],
    ) -> Self {
        Self::InvalidPayload {
            message: message.into(),
            prefix_path: prefix_path.to_vec(),
            node_id: node_id.into(),
            path: path.to_vec(),
        }
    }

    /// Create a new UnsatisfiedCache error.
    pub fn unsatisfied(message: impl Into<String>) -> Self {
        Self::UnsatisfiedCache {
            message: message.into(),
        }
    }

    /// Create a new Consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Create a new Callback error.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
        }
    }

    /// Whether this error stems from a cache bug rather than caller input.
    pub fn is_bug(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

fn join_paths(prefix: &[PathSegment], path: &[PathSegment]) -> Vec<PathSegment> {
    prefix.iter().chain(path).cloned().collect()
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_path() {
        assert_eq!(pretty_path(&[]), "[]");
        assert_eq!(
            pretty_path(&[PathSegment::from("list"), PathSegment::from(2), "id".into()]),
            "list.2.id"
        );
    }

    #[test]
    fn test_invalid_payload_display() {
        let err = CacheError::invalid_payload(
            "Unsupported transition from a non-entity value to an entity",
            &["viewer".into()],
            "ROOT_QUERY",
            &["friend".into()],
        );
        let message = err.to_string();
        assert!(message.contains("viewer.friend"));
        assert!(message.contains("(node ROOT_QUERY)"));
        assert!(!err.is_bug());
    }

    #[test]
    fn test_consistency_is_bug() {
        let err = CacheError::consistency("missing inbound reference");
        assert!(err.is_bug());
        assert_eq!(err.to_string(), "BUG: missing inbound reference");
    }

    #[test]
    fn test_query_error_converts() {
        let err: CacheError = QueryError::missing_variable("id").into();
        assert_eq!(err.to_string(), "Expected variable $id to exist for query");
    }
}
