//! Structured failures raised by parse and serialize operations.
//!
//! An [`Error`] always carries its [`ErrorKind`], the direction it happened in
//! and the [`Path`] from the root of the input to the offending value.
use std::fmt;

use serde_json::Value;

use crate::literal::Literal;
use crate::path::{Path, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Parsing,
    Serializing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Parsing => f.write_str("parsing"),
            Direction::Serializing => f.write_str("serializing"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The value has the wrong shape or primitive type.
    #[error("Expected {expected}, received {}", describe_received(.received))]
    InvalidType { expected: String, received: Value },

    /// The value is not the expected constant.
    #[error("Expected {expected}, received {}", describe_received(.received))]
    InvalidLiteral { expected: Literal, received: Value },

    #[error("Expected Tuple with {expected} items, received {received}")]
    InvalidTupleSize { expected: usize, received: usize },

    /// A strict object received a key it does not declare.
    #[error("Encountered disallowed excess key {0:?} on an object")]
    ExcessField(String),

    /// Every union member failed; one error per member, in declaration order.
    #[error("Invalid union with following errors{}", describe_union(.0))]
    InvalidUnion(Vec<Error>),

    #[error("{0}")]
    Refinement(String),

    /// Raised by a user-supplied parser, serializer or validator.
    #[error("{0}")]
    Custom(String),

    #[error("{0}")]
    OperationFailed(String),

    /// The schema cannot run in this direction (missing handler, dangling
    /// recursive reference).
    #[error("{0}")]
    InvalidOperation(String),

    #[error("Encountered unexpected asynchronous transform or refine. Use parse_async instead")]
    UnexpectedAsync,
}

fn describe_received(value: &Value) -> String {
    const MAX: usize = 64;
    let text = value.to_string();
    if text.chars().count() > MAX {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    } else {
        text
    }
}

fn describe_union(errors: &[Error]) -> String {
    let mut lines: Vec<String> = errors
        .iter()
        .map(|e| format!("\n- {}", if e.path.is_root() { e.kind.to_string() } else { format!("At {}: {}", e.path, e.kind) }))
        .collect();
    lines.dedup();
    lines.concat()
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Failed {operation} at {path}. Reason: {kind}")]
pub struct Error {
    pub kind: ErrorKind,
    pub operation: Direction,
    pub path: Path,
}

impl Error {
    pub fn new(kind: ErrorKind, operation: Direction) -> Self {
        Error { kind, operation, path: Path::root() }
    }

    pub fn parsing(kind: ErrorKind) -> Self { Self::new(kind, Direction::Parsing) }

    pub fn serializing(kind: ErrorKind) -> Self { Self::new(kind, Direction::Serializing) }

    pub(crate) fn invalid_type(operation: Direction, expected: impl Into<String>, received: &Value) -> Self {
        Self::new(ErrorKind::InvalidType { expected: expected.into(), received: received.clone() }, operation)
    }

    /// The same error, one level further out.
    pub fn prepend(mut self, segment: impl Into<Segment>) -> Self {
        self.path = self.path.prepended(segment);
        self
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = path;
        self
    }

    /// Human-readable reason without the location prefix.
    pub fn reason(&self) -> String { self.kind.to_string() }

    /// Errors aggregated by a union, empty for every other kind.
    pub fn union_errors(&self) -> &[Error] {
        match &self.kind {
            ErrorKind::InvalidUnion(errors) => errors,
            _ => &[],
        }
    }

    /// Convert a failure coming out of a user closure. A crate error travelling
    /// through `anyhow` keeps its kind and path.
    pub(crate) fn from_user(error: anyhow::Error, operation: Direction) -> Self {
        match error.downcast::<Error>() {
            Ok(error) => error,
            Err(other) => Self::new(ErrorKind::Custom(other.to_string()), operation),
        }
    }
}

/// Mistakes in a schema definition itself, caught while constructing it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("A union schema requires at least one member")]
    EmptyUnion,

    #[error("The field {0:?} is defined multiple times")]
    DuplicateField(String),

    /// `inline` met a node built around a closure or a recursive reference.
    #[error("The {0} schema can't be rendered as source")]
    NotInlinable(String),
}
