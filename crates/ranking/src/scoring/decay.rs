//! Exponential recency decay

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Recency weight in (0, 1]: `2^(-age_days / half_life_days)`.
///
/// Articles published after `reference` are treated as maximally fresh.
/// `half_life_days` must be positive; configuration validation guarantees it.
pub fn decay_weight(published_at: DateTime<Utc>, reference: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_secs = (reference - published_at).num_seconds().max(0) as f64;
    let age_days = age_secs / SECONDS_PER_DAY;

    // Very old articles underflow towards zero; keep the weight strictly positive
    (-age_days / half_life_days).exp2().max(f64::MIN_POSITIVE)
}
