//! Configuration management for Herald
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with HERALD__)
//! - Configuration files (config/default, config/{env}, config/local)
//! - Default values
//!
//! Every loaded configuration is validated before the engine starts;
//! invalid combinations fail fast.

use crate::errors::{RankingError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that blend weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Main ranking engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Influence propagation parameters
    #[serde(default)]
    pub propagation: PropagationConfig,

    /// Recency decay parameters
    #[serde(default)]
    pub decay: DecayConfig,

    /// Composite score weights
    #[serde(default)]
    pub blend: BlendWeights,

    /// Query limits
    #[serde(default)]
    pub query: QueryConfig,

    /// Ingestion boundary settings
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropagationConfig {
    /// Fraction of score propagated along citation edges
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// L1 convergence threshold
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecayConfig {
    /// Days after which recency weight halves.
    /// Shorter favours "hot" work, longer favours established work.
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
}

/// Weights of the three composite score signals
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BlendWeights {
    #[serde(default = "default_base_weight")]
    pub base: f64,

    #[serde(default = "default_decay_weight")]
    pub decay: f64,

    #[serde(default = "default_author_weight")]
    pub author: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Result count when a query does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound on requested result count
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Citations waiting for their target article
    #[serde(default = "default_max_pending")]
    pub max_pending_citations: usize,

    /// Records per batch when replaying a stream
    #[serde(default = "default_replay_batch_size")]
    pub replay_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_damping() -> f64 { 0.85 }
fn default_epsilon() -> f64 { 1e-6 }
fn default_max_iterations() -> usize { 100 }
fn default_half_life_days() -> f64 { 730.0 }
fn default_base_weight() -> f64 { 0.5 }
fn default_decay_weight() -> f64 { 0.3 }
fn default_author_weight() -> f64 { 0.2 }
fn default_top_k() -> usize { 10 }
fn default_max_top_k() -> usize { 1000 }
fn default_max_pending() -> usize { 10_000 }
fn default_replay_batch_size() -> usize { 500 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "herald".to_string() }

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            epsilon: default_epsilon(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
        }
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            base: default_base_weight(),
            decay: default_decay_weight(),
            author: default_author_weight(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_pending_citations: default_max_pending(),
            replay_batch_size: default_replay_batch_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl BlendWeights {
    /// Create weights from the three components
    pub fn new(base: f64, decay: f64, author: f64) -> Self {
        Self { base, decay, author }
    }

    /// Weights must be finite, non-negative and sum to one
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("base", self.base), ("decay", self.decay), ("author", self.author)] {
            if !value.is_finite() || value < 0.0 {
                return Err(RankingError::InvalidWeight {
                    message: format!("{} weight must be a non-negative number, got {}", name, value),
                });
            }
        }

        let sum = self.base + self.decay + self.author;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RankingError::InvalidWeight {
                message: format!("weights must sum to 1, got {}", sum),
            });
        }

        Ok(())
    }

    /// Parse `base:0.5,decay:0.3,author:0.2`; omitted keys are zero
    pub fn parse(input: &str) -> Result<Self> {
        let mut weights = BlendWeights::new(0.0, 0.0, 0.0);

        for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once(':').ok_or_else(|| RankingError::InvalidWeight {
                message: format!("expected key:value, got `{}`", pair),
            })?;
            let value: f64 = value.trim().parse().map_err(|_| RankingError::InvalidWeight {
                message: format!("`{}` is not a number", value.trim()),
            })?;

            match key.trim() {
                "base" => weights.base = value,
                "decay" | "recency" => weights.decay = value,
                "author" => weights.author = value,
                other => {
                    return Err(RankingError::InvalidWeight {
                        message: format!("unknown weight `{}`", other),
                    })
                }
            }
        }

        weights.validate()?;
        Ok(weights)
    }
}

impl RankingConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let env = std::env::var("HERALD_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with HERALD__ prefix
            // e.g., HERALD__PROPAGATION__DAMPING=0.9
            .add_source(
                Environment::with_prefix("HERALD")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file, with environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("HERALD")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse an inline TOML document, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter; any violation is fatal
    pub fn validate(&self) -> Result<()> {
        let p = &self.propagation;
        if !(p.damping > 0.0 && p.damping < 1.0) {
            return Err(invalid("propagation.damping", format!("must be in (0, 1), got {}", p.damping)));
        }
        if !(p.epsilon.is_finite() && p.epsilon > 0.0) {
            return Err(invalid("propagation.epsilon", format!("must be positive, got {}", p.epsilon)));
        }
        if p.max_iterations == 0 {
            return Err(invalid("propagation.max_iterations", "must be at least 1"));
        }

        let half_life = self.decay.half_life_days;
        if !(half_life.is_finite() && half_life > 0.0) {
            return Err(invalid("decay.half_life_days", format!("must be positive, got {}", half_life)));
        }

        self.blend.validate()?;

        let q = &self.query;
        if q.max_top_k == 0 {
            return Err(invalid("query.max_top_k", "must be at least 1"));
        }
        if q.default_top_k > q.max_top_k {
            return Err(invalid(
                "query.default_top_k",
                format!("{} exceeds max_top_k {}", q.default_top_k, q.max_top_k),
            ));
        }

        if self.ingestion.max_pending_citations == 0 {
            return Err(invalid("ingestion.max_pending_citations", "must be at least 1"));
        }
        if self.ingestion.replay_batch_size == 0 {
            return Err(invalid("ingestion.replay_batch_size", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> RankingError {
    RankingError::InvalidConfiguration {
        field: field.to_string(),
        message: message.into(),
    }
}
