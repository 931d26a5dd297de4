//! Immutable score snapshots
//!
//! A snapshot holds every article's scores for exactly one graph version.
//! Snapshots are never mutated after construction; publication swaps the
//! whole `Arc<ScoreSnapshot>` so readers see either the old or the new set.

use crate::scoring::{AuthorProfile, AuthorTable};
use chrono::{DateTime, Utc};
use herald_common::errors::ConvergenceWarning;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Version-invariant scores of one article
#[derive(Debug, Clone, Serialize)]
pub struct ArticleScores {
    pub article_id: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub topics: BTreeSet<String>,
    pub withdrawn: bool,

    /// Raw propagated influence (sums to N across the snapshot)
    pub base_influence: f64,

    /// Strongest author influence among the article's authors
    pub author_influence: f64,

    /// `base_influence` rescaled into [0, 1] over the snapshot
    pub normalized_base: f64,

    /// `author_influence` rescaled into [0, 1] over the snapshot
    pub normalized_author: f64,
}

/// Score of one article as seen by a reader, with decay evaluated at a reference time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub article_id: String,
    pub base_influence: f64,
    pub author_influence: f64,
    pub decay_weight: f64,
    pub composite_score: f64,
    pub computed_at_version: u64,
}

/// Convergence facts of the propagation run behind a snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropagationSummary {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

/// All scores for one graph version
#[derive(Debug, Clone)]
pub struct ScoreSnapshot {
    version: u64,
    computed_at: DateTime<Utc>,

    /// Sorted by publication time, then article id
    entries: Vec<ArticleScores>,

    /// Article id -> position in `entries`
    index: HashMap<String, usize>,

    authors: AuthorTable,
    summary: PropagationSummary,
    warning: Option<ConvergenceWarning>,
}

impl ScoreSnapshot {
    /// Snapshot served before the first recomputation
    pub fn empty() -> Self {
        Self {
            version: 0,
            computed_at: Utc::now(),
            entries: Vec::new(),
            index: HashMap::new(),
            authors: AuthorTable::default(),
            summary: PropagationSummary {
                converged: true,
                ..Default::default()
            },
            warning: None,
        }
    }

    pub(crate) fn new(
        version: u64,
        mut entries: Vec<ArticleScores>,
        authors: AuthorTable,
        summary: PropagationSummary,
        warning: Option<ConvergenceWarning>,
    ) -> Self {
        entries.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });

        let index = entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.article_id.clone(), pos))
            .collect();

        Self {
            version,
            computed_at: Utc::now(),
            entries,
            index,
            authors,
            summary,
            warning,
        }
    }

    /// Graph version these scores were computed from
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn get(&self, article_id: &str) -> Option<&ArticleScores> {
        self.index.get(article_id).map(|&pos| &self.entries[pos])
    }

    /// Entries published within `[start, end]`, oldest first
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[ArticleScores] {
        let lo = self.entries.partition_point(|e| e.published_at < start);
        let hi = self.entries.partition_point(|e| e.published_at <= end);
        if lo >= hi {
            &[]
        } else {
            &self.entries[lo..hi]
        }
    }

    pub fn entries(&self) -> &[ArticleScores] {
        &self.entries
    }

    pub fn author(&self, author_id: &str) -> Option<&AuthorProfile> {
        self.authors.get(author_id)
    }

    pub fn summary(&self) -> &PropagationSummary {
        &self.summary
    }

    pub fn warning(&self) -> Option<&ConvergenceWarning> {
        self.warning.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, day: u32) -> ArticleScores {
        ArticleScores {
            article_id: id.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            source: "arxiv".to_string(),
            topics: BTreeSet::new(),
            withdrawn: false,
            base_influence: 1.0,
            author_influence: 0.0,
            normalized_base: 1.0,
            normalized_author: 0.0,
        }
    }

    #[test]
    fn test_window_is_inclusive() {
        let snapshot = ScoreSnapshot::new(
            3,
            vec![entry("c", 20), entry("a", 1), entry("b", 10)],
            AuthorTable::default(),
            PropagationSummary::default(),
            None,
        );

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let ids: Vec<_> = snapshot.window(start, end).iter().map(|e| e.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let late = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(snapshot.window(late, late).is_empty());
        assert!(snapshot.window(end, start).is_empty());
        assert_eq!(snapshot.get("c").unwrap().article_id, "c");
    }

    #[test]
    fn test_empty_snapshot() {
        let before = Utc::now();
        let snapshot = ScoreSnapshot::empty();
        assert!(snapshot.computed_at() >= before);
        assert_eq!(snapshot.version(), 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.summary().converged);
    }
}
