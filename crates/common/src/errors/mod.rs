//! Error types for Herald
//!
//! Provides the error taxonomy shared by every crate:
//! - Ingestion errors that reject a single record or edge
//! - Configuration errors that are fatal at startup
//! - Query errors returned to the caller
//! - Machine-readable error codes for reporting

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using RankingError
pub type Result<T> = std::result::Result<T, RankingError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Ingestion errors (1xxx)
    DuplicateArticle,
    UnknownArticle,
    SelfCitation,
    MalformedRecord,
    PendingOverflow,

    // Configuration errors (2xxx)
    InvalidWeight,
    InvalidConfiguration,
    ConfigurationSource,

    // Query errors (3xxx)
    EmptyWindow,
    NotFound,

    // Internal errors (9xxx)
    SerializationError,
    IoError,
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Ingestion (1xxx)
            ErrorCode::DuplicateArticle => 1001,
            ErrorCode::UnknownArticle => 1002,
            ErrorCode::SelfCitation => 1003,
            ErrorCode::MalformedRecord => 1004,
            ErrorCode::PendingOverflow => 1005,

            // Configuration (2xxx)
            ErrorCode::InvalidWeight => 2001,
            ErrorCode::InvalidConfiguration => 2002,
            ErrorCode::ConfigurationSource => 2003,

            // Query (3xxx)
            ErrorCode::EmptyWindow => 3001,
            ErrorCode::NotFound => 3002,

            // Internal (9xxx)
            ErrorCode::SerializationError => 9001,
            ErrorCode::IoError => 9002,
            ErrorCode::InternalError => 9003,
        }
    }

    /// Metric label for this code
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateArticle => "duplicate_article",
            ErrorCode::UnknownArticle => "unknown_article",
            ErrorCode::SelfCitation => "self_citation",
            ErrorCode::MalformedRecord => "malformed_record",
            ErrorCode::PendingOverflow => "pending_overflow",
            ErrorCode::InvalidWeight => "invalid_weight",
            ErrorCode::InvalidConfiguration => "invalid_configuration",
            ErrorCode::ConfigurationSource => "configuration_source",
            ErrorCode::EmptyWindow => "empty_window",
            ErrorCode::NotFound => "not_found",
            ErrorCode::SerializationError => "serialization",
            ErrorCode::IoError => "io",
            ErrorCode::InternalError => "internal",
        }
    }
}

/// Broad error category, used to decide how an error is surfaced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejects one record or edge; ingestion continues
    Ingestion,
    /// Fatal at startup
    Configuration,
    /// Returned to the caller of a query
    Query,
    /// Unexpected failure
    Internal,
}

/// Ranking engine error types
#[derive(Error, Debug)]
pub enum RankingError {
    // Ingestion errors
    #[error("Duplicate article {id}: {message}")]
    DuplicateArticle { id: String, message: String },

    #[error("Unknown article: {id}")]
    UnknownArticle { id: String },

    #[error("Article {id} cannot cite itself")]
    SelfCitation { id: String },

    #[error("Malformed record: {message}")]
    MalformedRecord {
        message: String,
        field: Option<String>,
    },

    #[error("Pending citation buffer full, dropped {from} -> {to}")]
    PendingOverflow { from: String, to: String },

    // Configuration errors
    #[error("Invalid blend weights: {message}")]
    InvalidWeight { message: String },

    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfiguration { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Query errors
    #[error("Inverted time window: {start} is after {end}")]
    EmptyWindow { start: String, end: String },

    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Internal errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RankingError {
    /// Shorthand for an unknown article
    pub fn not_found(resource_type: &str, id: impl Into<String>) -> Self {
        RankingError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.into(),
        }
    }

    /// Shorthand for a malformed record missing a required field
    pub fn missing_field(field: &str) -> Self {
        RankingError::MalformedRecord {
            message: format!("required field `{}` is missing or empty", field),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            RankingError::DuplicateArticle { .. } => ErrorCode::DuplicateArticle,
            RankingError::UnknownArticle { .. } => ErrorCode::UnknownArticle,
            RankingError::SelfCitation { .. } => ErrorCode::SelfCitation,
            RankingError::MalformedRecord { .. } => ErrorCode::MalformedRecord,
            RankingError::PendingOverflow { .. } => ErrorCode::PendingOverflow,
            RankingError::InvalidWeight { .. } => ErrorCode::InvalidWeight,
            RankingError::InvalidConfiguration { .. } => ErrorCode::InvalidConfiguration,
            RankingError::Config(_) => ErrorCode::ConfigurationSource,
            RankingError::EmptyWindow { .. } => ErrorCode::EmptyWindow,
            RankingError::NotFound { .. } => ErrorCode::NotFound,
            RankingError::Serialization(_) => ErrorCode::SerializationError,
            RankingError::Io(_) => ErrorCode::IoError,
            RankingError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            RankingError::DuplicateArticle { .. }
            | RankingError::UnknownArticle { .. }
            | RankingError::SelfCitation { .. }
            | RankingError::MalformedRecord { .. }
            | RankingError::PendingOverflow { .. } => ErrorCategory::Ingestion,

            RankingError::InvalidWeight { .. }
            | RankingError::InvalidConfiguration { .. }
            | RankingError::Config(_) => ErrorCategory::Configuration,

            RankingError::EmptyWindow { .. } | RankingError::NotFound { .. } => ErrorCategory::Query,

            RankingError::Serialization(_)
            | RankingError::Io(_)
            | RankingError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Whether the caller can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Ingestion | ErrorCategory::Query
        )
    }
}

/// Non-fatal warning emitted when propagation hits its iteration cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    /// Graph version the propagation ran against
    pub graph_version: u64,

    /// Iterations performed (equals the cap)
    pub iterations: usize,

    /// L1 norm of the last score delta
    pub residual: f64,

    /// Configured convergence threshold
    pub epsilon: f64,
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "propagation at version {} did not converge after {} iterations (residual {:.3e} > epsilon {:.3e})",
            self.graph_version, self.iterations, self.residual, self.epsilon
        )
    }
}

/// Structured error report, used by ingestion reports and CLI output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl From<&RankingError> for ErrorDetails {
    fn from(err: &RankingError) -> Self {
        let subject = match err {
            RankingError::DuplicateArticle { id, .. }
            | RankingError::UnknownArticle { id }
            | RankingError::SelfCitation { id }
            | RankingError::NotFound { id, .. } => Some(id.clone()),
            RankingError::MalformedRecord { field, .. } => field.clone(),
            _ => None,
        };

        ErrorDetails {
            code: err.code(),
            message: err.to_string(),
            subject,
        }
    }
}
