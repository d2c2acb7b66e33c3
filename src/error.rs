//! Error types for feedguard.

use thiserror::Error;

/// Error type for feedguard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Selector string outside the supported subset
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Operation on a post that has no state record
    #[error("post has no recorded modification")]
    UnknownPost,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The storage collaborator rejected or failed a request
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for feedguard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for rule compilation.
///
/// Every variant is recoverable: the rule is treated as inert.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Pattern is empty after splitting and trimming
    #[error("empty rule pattern")]
    EmptyPattern,

    /// Semantic rules have no matcher
    #[error("semantic rules are not supported")]
    SemanticUnsupported,

    /// The constructed expression was rejected by the regex engine
    #[error("invalid expression: {0}")]
    InvalidExpression(#[from] regex::Error),
}
