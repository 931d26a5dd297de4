//! Herald Ranking Engine
//!
//! Ranks scientific articles by citation influence, author influence and
//! recency:
//! - Citation graph with incremental, idempotent insertion
//! - PageRank-style influence propagation
//! - Credit-split author influence
//! - Composite score blending with per-query recency decay
//! - Snapshot-consistent top-K queries over time windows

pub mod citation;
pub mod engine;
pub mod query;
pub mod scoring;
pub mod snapshot;

pub use citation::{CitationGraph, Direction, Insertion, NewArticle};
pub use engine::{CitationCounts, GraphStats, RankingEngine, RecomputeOutcome};
pub use query::{RankFilters, RankQuery, RankedArticle, TimeWindow};
pub use scoring::{decay_weight, AuthorProfile};
pub use snapshot::{ScoreRecord, ScoreSnapshot};
