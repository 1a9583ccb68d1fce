//! DSL error types

/// Errors that can occur during DSL parsing, validation, or compilation
#[derive(Debug, thiserror::Error)]
pub enum DslError {
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Unexpected token at line {line}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("Unexpected end of input: expected {0}")]
    UnexpectedEof(String),

    #[error("Unknown keyword: '{0}'")]
    UnknownKeyword(String),

    #[error("Unknown node type: '{0}'")]
    UnknownNodeType(String),

    #[error("Unknown logic operator: '{0}' (expected 'and' or 'or')")]
    UnknownOperator(String),

    #[error("Duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Graph integrity error: {0}")]
    Integrity(#[from] wkf_types::GraphIntegrityError),
}

/// Result type alias for DSL operations
pub type DslResult<T> = Result<T, DslError>;
