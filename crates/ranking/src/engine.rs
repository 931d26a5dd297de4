//! Ranking engine
//!
//! Single-writer/multi-reader facade over the citation graph and the
//! published score snapshot. Writers mutate the graph under a write lock;
//! recomputation clones the graph at a version, propagates and blends off
//! the lock, then publishes the finished snapshot with one atomic swap.
//! A recomputation whose version has been overtaken is discarded.

use crate::citation::{CitationGraph, Direction, InfluencePropagator, Insertion, NewArticle};
use crate::query::{QueryEngine, RankQuery, RankedArticle};
use crate::scoring::{AuthorProfile, AuthorTable, ScoreBlender};
use crate::snapshot::{ScoreRecord, ScoreSnapshot};
use chrono::{DateTime, Utc};
use herald_common::config::RankingConfig;
use herald_common::errors::{ConvergenceWarning, RankingError, Result};
use herald_common::metrics;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What a recomputation did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecomputeOutcome {
    /// A new snapshot was published
    Published {
        version: u64,
        iterations: usize,
        converged: bool,
        warning: Option<ConvergenceWarning>,
    },
    /// The published snapshot already matches the graph
    UpToDate { version: u64 },
    /// The graph advanced mid-computation; the result was discarded
    Abandoned { version: u64, latest: u64 },
}

/// Graph size and version counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub version: u64,
    pub articles: usize,
    pub citations: usize,
    pub snapshot_version: u64,
}

/// Edge counts of one article in the live graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CitationCounts {
    /// Articles citing it
    pub citations: usize,
    /// Articles it cites
    pub references: usize,
}

/// Citation ranking engine
pub struct RankingEngine {
    config: RankingConfig,
    graph: RwLock<CitationGraph>,

    /// Mirror of the graph version, readable without the lock
    latest_version: AtomicU64,

    /// Published snapshot; `send_replace` is the atomic swap
    snapshot: watch::Sender<Arc<ScoreSnapshot>>,

    /// Serializes recomputations
    recompute_lock: Mutex<()>,

    propagator: InfluencePropagator,
    blender: ScoreBlender,
    query: QueryEngine,

    #[cfg(test)]
    commit_delay: Mutex<Option<std::time::Duration>>,
}

impl RankingEngine {
    /// Create an engine; the configuration is validated first
    pub fn new(config: RankingConfig) -> Result<Self> {
        config.validate()?;

        let blender = ScoreBlender::new(&config.decay);
        let query = QueryEngine::new(config.query.clone(), blender.clone(), config.blend);
        let (snapshot, _) = watch::channel(Arc::new(ScoreSnapshot::empty()));

        info!(
            damping = config.propagation.damping,
            epsilon = config.propagation.epsilon,
            max_iterations = config.propagation.max_iterations,
            half_life_days = config.decay.half_life_days,
            "Ranking engine initialized"
        );

        Ok(Self {
            propagator: InfluencePropagator::new(config.propagation.clone()),
            blender,
            query,
            config,
            graph: RwLock::new(CitationGraph::new()),
            latest_version: AtomicU64::new(0),
            snapshot,
            recompute_lock: Mutex::new(()),
            #[cfg(test)]
            commit_delay: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Writers
    // ---------------------------------------------------------------

    /// Add an article to the graph
    pub fn add_article(&self, article: NewArticle) -> Result<Insertion> {
        let id = article.id.clone();
        self.mutate(|graph| graph.add_article(article))
            .inspect(|outcome| {
                if *outcome == Insertion::Inserted {
                    metrics::record_ingestion("article");
                    debug!(article_id = %id, "Article added");
                }
            })
    }

    /// Add a citation observed now
    pub fn add_citation(&self, from: &str, to: &str) -> Result<Insertion> {
        self.add_citation_at(from, to, Utc::now())
    }

    /// Add a citation with an explicit observation time
    pub fn add_citation_at(&self, from: &str, to: &str, observed_at: DateTime<Utc>) -> Result<Insertion> {
        self.mutate(|graph| graph.add_citation(from, to, observed_at))
            .inspect(|outcome| {
                if *outcome == Insertion::Inserted {
                    metrics::record_ingestion("citation");
                    debug!(from, to, "Citation added");
                }
            })
    }

    /// Flag an article as withdrawn; it stays in the graph
    pub fn mark_withdrawn(&self, id: &str) -> Result<Insertion> {
        self.mutate(|graph| graph.mark_withdrawn(id))
            .inspect(|outcome| {
                if *outcome == Insertion::Inserted {
                    info!(article_id = id, "Article withdrawn");
                }
            })
    }

    fn mutate<F>(&self, op: F) -> Result<Insertion>
    where
        F: FnOnce(&mut CitationGraph) -> Result<Insertion>,
    {
        let mut graph = self.graph.write();
        let outcome = op(&mut graph)?;
        self.latest_version.store(graph.version(), Ordering::Release);
        Ok(outcome)
    }

    // ---------------------------------------------------------------
    // Recomputation
    // ---------------------------------------------------------------

    /// Recompute all scores from scratch and publish them.
    ///
    /// Runs on the calling thread; see [`spawn_recompute`](Self::spawn_recompute)
    /// for the background variant.
    #[instrument(skip(self))]
    pub fn recompute(&self) -> Result<RecomputeOutcome> {
        let _serial = self.recompute_lock.lock();

        let graph = self.graph.read().clone();
        let version = graph.version();

        if self.snapshot.borrow().version() == version {
            return Ok(RecomputeOutcome::UpToDate { version });
        }

        let started = Instant::now();
        let propagation = match self
            .propagator
            .compute_cancellable(&graph, || self.latest_version.load(Ordering::Acquire) != version)
        {
            Some(propagation) => propagation,
            None => return Ok(self.abandon(version)),
        };

        let authors = AuthorTable::aggregate(&graph, &propagation.scores);
        let snapshot = self.blender.blend(&graph, &propagation, authors);
        drop(graph);

        self.before_commit();

        // Holding the read lock keeps writers out between the check and the swap
        let live = self.graph.read();
        if live.version() != version {
            let latest = live.version();
            drop(live);
            return Ok(self.abandon_at(version, latest));
        }

        let articles = snapshot.len();
        let outcome = RecomputeOutcome::Published {
            version,
            iterations: propagation.iterations,
            converged: propagation.converged,
            warning: propagation.warning,
        };
        self.snapshot.send_replace(Arc::new(snapshot));
        drop(live);

        metrics::record_snapshot(version, articles);
        info!(
            version,
            articles,
            iterations = propagation.iterations,
            converged = propagation.converged,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Score snapshot published"
        );

        Ok(outcome)
    }

    fn abandon(&self, version: u64) -> RecomputeOutcome {
        let latest = self.latest_version.load(Ordering::Acquire);
        self.abandon_at(version, latest)
    }

    fn abandon_at(&self, version: u64, latest: u64) -> RecomputeOutcome {
        metrics::record_abandoned_recompute();
        warn!(version, latest, "Recomputation abandoned, graph advanced");
        RecomputeOutcome::Abandoned { version, latest }
    }

    /// Run [`recompute`](Self::recompute) on the blocking pool
    pub fn spawn_recompute(self: &Arc<Self>) -> JoinHandle<Result<RecomputeOutcome>> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.recompute())
    }

    /// Wait until a snapshot at or beyond `version` is published
    pub async fn wait_for_version(&self, version: u64) -> Result<Arc<ScoreSnapshot>> {
        let mut rx = self.snapshot.subscribe();
        let snapshot = rx
            .wait_for(|s| s.version() >= version)
            .await
            .map_err(|e| RankingError::Internal {
                message: format!("snapshot channel closed: {}", e),
            })?;
        Ok(Arc::clone(&snapshot))
    }

    // ---------------------------------------------------------------
    // Readers
    // ---------------------------------------------------------------

    /// Current published snapshot
    pub fn snapshot(&self) -> Arc<ScoreSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Top-K articles for a query, all from one snapshot
    pub fn rank(&self, query: &RankQuery) -> Result<Vec<RankedArticle>> {
        let snapshot = self.snapshot();
        self.query.rank(&snapshot, query)
    }

    /// Score of one article with decay evaluated now
    pub fn article_score(&self, article_id: &str) -> Result<ScoreRecord> {
        self.article_score_at(article_id, Utc::now())
    }

    /// Score of one article with decay evaluated at `as_of`
    pub fn article_score_at(&self, article_id: &str, as_of: DateTime<Utc>) -> Result<ScoreRecord> {
        let snapshot = self.snapshot();
        self.query.score(&snapshot, article_id, as_of)
    }

    /// Author projection from the current snapshot
    pub fn author(&self, author_id: &str) -> Result<AuthorProfile> {
        self.snapshot()
            .author(author_id)
            .cloned()
            .ok_or_else(|| RankingError::not_found("author", author_id))
    }

    /// Neighbor ids from the live graph
    pub fn neighbors(&self, article_id: &str, direction: Direction) -> Result<Vec<String>> {
        let graph = self.graph.read();
        Ok(graph
            .neighbors(article_id, direction)?
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    pub fn citation_counts(&self, article_id: &str) -> Result<CitationCounts> {
        let graph = self.graph.read();
        if graph.index_of(article_id).is_none() {
            return Err(RankingError::not_found("article", article_id));
        }
        Ok(CitationCounts {
            citations: graph.citation_count(article_id),
            references: graph.reference_count(article_id),
        })
    }

    pub fn contains(&self, article_id: &str) -> bool {
        self.graph.read().index_of(article_id).is_some()
    }

    /// Current graph version
    pub fn graph_version(&self) -> u64 {
        self.latest_version.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> GraphStats {
        let graph = self.graph.read();
        GraphStats {
            version: graph.version(),
            articles: graph.node_count(),
            citations: graph.edge_count(),
            snapshot_version: self.snapshot.borrow().version(),
        }
    }

    #[cfg(test)]
    fn before_commit(&self) {
        if let Some(delay) = *self.commit_delay.lock() {
            std::thread::sleep(delay);
        }
    }

    #[cfg(not(test))]
    fn before_commit(&self) {}

    #[cfg(test)]
    fn set_commit_delay(&self, delay: Option<std::time::Duration>) {
        *self.commit_delay.lock() = delay;
    }
}
