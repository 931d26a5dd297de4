//! Herald Common Library
//!
//! Shared code for the Herald ranking crates including:
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod telemetry;

// Re-export commonly used types
pub use config::{BlendWeights, RankingConfig};
pub use errors::{ConvergenceWarning, ErrorCode, RankingError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
