//! Composite score blending
//!
//! Combines normalized base influence, recency decay and normalized author
//! influence into one score. Normalization is computed once per graph version
//! for the whole article set; decay is evaluated per read against the
//! requested reference time.

use super::{decay_weight, AuthorTable};
use crate::citation::{CitationGraph, Propagation};
use crate::snapshot::{ArticleScores, PropagationSummary, ScoreRecord, ScoreSnapshot};
use chrono::{DateTime, Utc};
use herald_common::config::{BlendWeights, DecayConfig};

/// Relative spread below which all values are treated as tied
const TIE_TOLERANCE: f64 = 1e-9;

/// Linearly rescale `value` into [0, 1] relative to `[min, max]`.
///
/// A degenerate range (all values tied) maps every positive value to 1.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range <= TIE_TOLERANCE * max.abs().max(1.0) {
        return if max > 0.0 { 1.0 } else { 0.0 };
    }
    ((value - min) / range).clamp(0.0, 1.0)
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Blends propagation and author signals into scores
#[derive(Debug, Clone)]
pub struct ScoreBlender {
    half_life_days: f64,
}

impl ScoreBlender {
    pub fn new(decay: &DecayConfig) -> Self {
        Self {
            half_life_days: decay.half_life_days,
        }
    }

    pub fn half_life_days(&self) -> f64 {
        self.half_life_days
    }

    /// Build the complete snapshot for the graph version `graph` is at.
    ///
    /// Either every article gets an entry for this version or no snapshot is
    /// produced at all; there is no partial update path.
    pub fn blend(&self, graph: &CitationGraph, propagation: &Propagation, authors: AuthorTable) -> ScoreSnapshot {
        let author_signal: Vec<f64> = graph
            .articles()
            .iter()
            .map(|a| authors.max_influence(&a.authors))
            .collect();

        let (base_min, base_max) = bounds(propagation.scores.iter().copied());
        let (author_min, author_max) = bounds(author_signal.iter().copied());

        let entries = graph
            .articles()
            .iter()
            .enumerate()
            .map(|(idx, article)| {
                let base = propagation.scores[idx];
                let author = author_signal[idx];
                ArticleScores {
                    article_id: article.id.clone(),
                    published_at: article.published_at,
                    source: article.source.clone(),
                    topics: article.topics.clone(),
                    withdrawn: article.withdrawn,
                    base_influence: base,
                    author_influence: author,
                    normalized_base: normalize(base, base_min, base_max),
                    normalized_author: normalize(author, author_min, author_max),
                }
            })
            .collect();

        ScoreSnapshot::new(
            graph.version(),
            entries,
            authors,
            PropagationSummary {
                iterations: propagation.iterations,
                residual: propagation.residual,
                converged: propagation.converged,
            },
            propagation.warning.clone(),
        )
    }

    /// Composite score of one entry at `as_of` under `weights`
    pub fn score(
        &self,
        entry: &ArticleScores,
        version: u64,
        as_of: DateTime<Utc>,
        weights: &BlendWeights,
    ) -> ScoreRecord {
        let decay = decay_weight(entry.published_at, as_of, self.half_life_days);
        let composite = weights.base * entry.normalized_base
            + weights.decay * decay
            + weights.author * entry.normalized_author;

        ScoreRecord {
            article_id: entry.article_id.clone(),
            base_influence: entry.base_influence,
            author_influence: entry.author_influence,
            decay_weight: decay,
            composite_score: composite.max(0.0),
            computed_at_version: version,
        }
    }
}
