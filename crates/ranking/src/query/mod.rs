//! Ranking queries over a published snapshot
//!
//! A query selects articles published within a time window, applies source,
//! topic and withdrawal filters, evaluates the composite score at the query's
//! reference time and returns the top K in a deterministic total order.

use crate::scoring::ScoreBlender;
use crate::snapshot::{ArticleScores, ScoreRecord, ScoreSnapshot};
use chrono::{DateTime, Utc};
use herald_common::config::{BlendWeights, QueryConfig};
use herald_common::errors::{RankingError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Instant;

/// Inclusive publication time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Every representable instant
    pub fn all() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(RankingError::EmptyWindow {
                start: self.start.to_rfc3339(),
                end: self.end.to_rfc3339(),
            });
        }
        Ok(())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Metadata filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankFilters {
    /// Accepted sources; empty accepts all
    #[serde(default)]
    pub sources: BTreeSet<String>,

    /// Accepted topics; an article matches if it has any of them. Empty accepts all.
    #[serde(default)]
    pub topics: BTreeSet<String>,

    /// Include withdrawn articles
    #[serde(default)]
    pub include_withdrawn: bool,
}

impl RankFilters {
    pub fn matches(&self, entry: &ArticleScores) -> bool {
        if entry.withdrawn && !self.include_withdrawn {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&entry.source) {
            return false;
        }
        if !self.topics.is_empty() && self.topics.is_disjoint(&entry.topics) {
            return false;
        }
        true
    }
}

/// Ranking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankQuery {
    pub window: TimeWindow,

    #[serde(default)]
    pub filters: RankFilters,

    /// Maximum results; the configured default when absent
    pub top_k: Option<usize>,

    /// Overrides the configured blend weights
    pub weights: Option<BlendWeights>,

    /// Decay reference time; the end of the window when absent
    pub as_of: Option<DateTime<Utc>>,
}

impl RankQuery {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            filters: RankFilters::default(),
            top_k: None,
            weights: None,
            as_of: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn weights(mut self, weights: BlendWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn filters(mut self, filters: RankFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    pub article_id: String,
    pub composite_score: f64,

    /// 1-based position
    pub rank_position: usize,

    pub published_at: DateTime<Utc>,

    /// Full score breakdown
    pub score: ScoreRecord,
}

/// Answers ranking queries against snapshots
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: QueryConfig,
    blender: ScoreBlender,
    default_weights: BlendWeights,
}

impl QueryEngine {
    pub fn new(config: QueryConfig, blender: ScoreBlender, default_weights: BlendWeights) -> Self {
        Self {
            config,
            blender,
            default_weights,
        }
    }

    /// Rank the snapshot's articles for `query`.
    ///
    /// An inverted window is an error; an empty result is not.
    pub fn rank(&self, snapshot: &ScoreSnapshot, query: &RankQuery) -> Result<Vec<RankedArticle>> {
        let started = Instant::now();

        query.window.validate()?;
        let weights = match &query.weights {
            Some(weights) => {
                weights.validate()?;
                weights
            }
            None => &self.default_weights,
        };
        let top_k = query
            .top_k
            .unwrap_or(self.config.default_top_k)
            .min(self.config.max_top_k);
        let as_of = query.as_of.unwrap_or(query.window.end);

        let mut scored: Vec<(ScoreRecord, DateTime<Utc>)> = snapshot
            .window(query.window.start, query.window.end)
            .iter()
            .filter(|entry| query.filters.matches(entry))
            .map(|entry| {
                let record = self.blender.score(entry, snapshot.version(), as_of, weights);
                (record, entry.published_at)
            })
            .collect();

        scored.sort_by(|(a, a_at), (b, b_at)| rank_order(a, *a_at, b, *b_at));
        scored.truncate(top_k);

        let results: Vec<RankedArticle> = scored
            .into_iter()
            .enumerate()
            .map(|(pos, (record, published_at))| RankedArticle {
                article_id: record.article_id.clone(),
                composite_score: record.composite_score,
                rank_position: pos + 1,
                published_at,
                score: record,
            })
            .collect();

        herald_common::metrics::record_query(started.elapsed().as_secs_f64(), results.len());
        Ok(results)
    }

    /// Score of one article at `as_of` with the configured weights
    pub fn score(&self, snapshot: &ScoreSnapshot, article_id: &str, as_of: DateTime<Utc>) -> Result<ScoreRecord> {
        let entry = snapshot
            .get(article_id)
            .ok_or_else(|| RankingError::not_found("article", article_id))?;
        Ok(self
            .blender
            .score(entry, snapshot.version(), as_of, &self.default_weights))
    }
}

/// Composite score descending, then newer first, then id ascending
fn rank_order(a: &ScoreRecord, a_at: DateTime<Utc>, b: &ScoreRecord, b_at: DateTime<Utc>) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| b_at.cmp(&a_at))
        .then_with(|| a.article_id.cmp(&b.article_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::{CitationGraph, InfluencePropagator, NewArticle};
    use crate::scoring::AuthorTable;
    use chrono::{Duration, TimeZone};
    use herald_common::config::{DecayConfig, PropagationConfig};
    use herald_common::ErrorCode;

    fn t(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn snapshot() -> ScoreSnapshot {
        let mut graph = CitationGraph::new();
        graph
            .add_article(NewArticle::new("old", t(0), "arxiv").with_topics(["cs.lg"]))
            .unwrap();
        graph
            .add_article(NewArticle::new("mid", t(10), "pubmed").with_topics(["q-bio"]))
            .unwrap();
        graph
            .add_article(NewArticle::new("new", t(20), "arxiv").with_topics(["cs.lg", "stat.ml"]))
            .unwrap();
        graph.add_citation("new", "old", t(20)).unwrap();
        graph.add_citation("mid", "old", t(20)).unwrap();
        graph.mark_withdrawn("mid").unwrap();

        let propagation = InfluencePropagator::new(PropagationConfig::default()).compute(&graph);
        let authors = AuthorTable::aggregate(&graph, &propagation.scores);
        ScoreBlender::new(&DecayConfig { half_life_days: 10.0 }).blend(&graph, &propagation, authors)
    }

    fn engine(weights: BlendWeights) -> QueryEngine {
        QueryEngine::new(
            QueryConfig::default(),
            ScoreBlender::new(&DecayConfig { half_life_days: 10.0 }),
            weights,
        )
    }

    fn ids(results: &[RankedArticle]) -> Vec<&str> {
        results.iter().map(|r| r.article_id.as_str()).collect()
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err = TimeWindow::new(t(5), t(1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyWindow);

        let query = RankQuery::new(TimeWindow { start: t(5), end: t(1) });
        let err = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyWindow);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = TimeWindow::new(t(0), t(10)).unwrap();
        assert!(window.contains(t(0)));
        assert!(window.contains(t(10)));
        assert!(!window.contains(t(11)));
        assert!(TimeWindow::all().contains(t(-10_000)));

        // Ranked results fall inside the window, endpoints included
        let query = RankQuery::new(window);
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();
        assert_eq!(ids(&results).len(), 1);
        assert!(results.iter().all(|r| window.contains(r.published_at)));
    }

    #[test]
    fn test_empty_window_is_not_an_error() {
        let query = RankQuery::new(TimeWindow::new(t(100), t(200)).unwrap());
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_base_influence_order() {
        let query = RankQuery::new(TimeWindow::all()).weights(BlendWeights::new(1.0, 0.0, 0.0));
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();

        // Withdrawn "mid" excluded; "old" is cited twice
        assert_eq!(ids(&results), vec!["old", "new"]);
        assert_eq!(results[0].rank_position, 1);
        assert_eq!(results[1].rank_position, 2);
    }

    #[test]
    fn test_decay_evaluated_at_as_of() {
        let query = RankQuery::new(TimeWindow::all())
            .weights(BlendWeights::new(0.0, 1.0, 0.0))
            .as_of(t(30));
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();

        assert_eq!(ids(&results), vec!["new", "old"]);
        assert!((results[0].composite_score - 0.5).abs() < 1e-12);
        assert!((results[1].composite_score - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_filters() {
        let mut filters = RankFilters::default();
        filters.topics.insert("stat.ml".to_string());
        let query = RankQuery::new(TimeWindow::all()).filters(filters);
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();
        assert_eq!(ids(&results), vec!["new"]);

        let mut filters = RankFilters::default();
        filters.sources.insert("pubmed".to_string());
        filters.include_withdrawn = true;
        let query = RankQuery::new(TimeWindow::all()).filters(filters);
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();
        assert_eq!(ids(&results), vec!["mid"]);
    }

    #[test]
    fn test_top_k_and_invalid_weights() {
        let query = RankQuery::new(TimeWindow::all()).top_k(1);
        let results = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap();
        assert_eq!(results.len(), 1);

        let query = RankQuery::new(TimeWindow::all()).weights(BlendWeights::new(1.0, 1.0, 0.0));
        let err = engine(BlendWeights::default()).rank(&snapshot(), &query).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidWeight);
    }

    #[test]
    fn test_ties_broken_by_recency_then_id() {
        // Zero weight on everything but decay with as_of before all publications: all tie at 1.0
        let query = RankQuery::new(TimeWindow::all())
            .weights(BlendWeights::new(0.0, 1.0, 0.0))
            .as_of(t(-1));
        let mut filters = RankFilters::default();
        filters.include_withdrawn = true;
        let results = engine(BlendWeights::default())
            .rank(&snapshot(), &query.filters(filters))
            .unwrap();
        assert_eq!(ids(&results), vec!["new", "mid", "old"]);
    }
}
