//! Batch ingestion processor
//!
//! Feeds validated records into the ranking engine in two phases: every
//! article of a batch first, then every citation, so references between
//! articles of the same batch resolve regardless of order. Citations whose
//! target has not been seen yet wait in a bounded buffer and are retried on
//! each later batch.

use crate::record::ArticleRecord;
use chrono::{DateTime, Utc};
use herald_common::errors::{ErrorDetails, RankingError, Result};
use herald_common::metrics;
use herald_ranking::{Insertion, RankingEngine, RecomputeOutcome};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Citation waiting for its target article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingCitation {
    pub from: String,
    pub to: String,
    pub observed_at: DateTime<Utc>,
}

/// A record or edge that was not applied
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Record position in the batch (line number for replays); absent for buffer overflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    pub error: ErrorDetails,
}

/// Outcome of one or more ingestion batches
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub records: usize,
    pub articles_added: usize,
    pub articles_unchanged: usize,
    pub citations_added: usize,
    pub citations_unchanged: usize,

    /// Citations newly parked for an unknown target
    pub citations_deferred: usize,

    /// Parked citations applied in this batch
    pub pending_resolved: usize,

    /// Buffer size after the batch
    pub pending: usize,

    pub rejections: Vec<Rejection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recompute: Option<RecomputeOutcome>,

    pub graph_version: u64,
}

impl IngestionReport {
    /// Fold a later report into this one
    pub fn merge(&mut self, other: IngestionReport) {
        self.records += other.records;
        self.articles_added += other.articles_added;
        self.articles_unchanged += other.articles_unchanged;
        self.citations_added += other.citations_added;
        self.citations_unchanged += other.citations_unchanged;
        self.citations_deferred += other.citations_deferred;
        self.pending_resolved += other.pending_resolved;
        self.pending = other.pending;
        self.rejections.extend(other.rejections);
        if other.recompute.is_some() {
            self.recompute = other.recompute;
        }
        self.graph_version = self.graph_version.max(other.graph_version);
    }

    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }

    pub(crate) fn reject(&mut self, position: Option<usize>, record_id: Option<String>, err: &RankingError) {
        metrics::record_rejection(err.code());
        debug!(?position, record_id = ?record_id, error = %err, "Rejected");
        self.rejections.push(Rejection {
            position,
            record_id,
            error: ErrorDetails::from(err),
        });
    }
}

/// Applies article records to a ranking engine
pub struct IngestionProcessor {
    engine: Arc<RankingEngine>,
    pending: VecDeque<PendingCitation>,

    /// `(from, to)` of every entry in `pending`
    pending_keys: HashSet<(String, String)>,

    max_pending: usize,
    auto_recompute: bool,
}

impl IngestionProcessor {
    pub fn new(engine: Arc<RankingEngine>) -> Self {
        let max_pending = engine.config().ingestion.max_pending_citations;
        Self {
            engine,
            pending: VecDeque::new(),
            pending_keys: HashSet::new(),
            max_pending,
            auto_recompute: true,
        }
    }

    /// Whether a batch that changed the graph triggers a recomputation (default on)
    pub fn with_auto_recompute(mut self, enabled: bool) -> Self {
        self.auto_recompute = enabled;
        self
    }

    pub fn engine(&self) -> &Arc<RankingEngine> {
        &self.engine
    }

    pub fn auto_recompute(&self) -> bool {
        self.auto_recompute
    }

    /// Citations still waiting for their target
    pub fn pending(&self) -> impl Iterator<Item = &PendingCitation> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ingest a batch; positions in the report are indexes into `records`
    pub fn ingest_batch(&mut self, records: Vec<ArticleRecord>) -> Result<IngestionReport> {
        let positioned = records.into_iter().enumerate().collect();
        self.ingest_positioned(positioned, self.auto_recompute)
    }

    /// Ingest records tagged with caller-chosen positions.
    ///
    /// Only an engine failure during recomputation is an error; rejected
    /// records are listed in the report.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn ingest_positioned(
        &mut self,
        records: Vec<(usize, ArticleRecord)>,
        recompute: bool,
    ) -> Result<IngestionReport> {
        let start_version = self.engine.graph_version();
        let mut report = IngestionReport {
            records: records.len(),
            ..Default::default()
        };

        // Phase 1: articles
        let mut accepted = Vec::with_capacity(records.len());
        for (position, record) in records {
            let validated = match record.validate() {
                Ok(validated) => validated,
                Err(e) => {
                    report.reject(Some(position), record.id.clone(), &e);
                    continue;
                }
            };

            let id = validated.article.id.clone();
            let published_at = validated.article.published_at;
            match self.engine.add_article(validated.article) {
                Ok(Insertion::Inserted) => report.articles_added += 1,
                Ok(Insertion::Unchanged) => report.articles_unchanged += 1,
                Err(e) => {
                    report.reject(Some(position), Some(id), &e);
                    continue;
                }
            }
            accepted.push((position, id, published_at, validated.cited_ids));
        }

        // Parked citations may resolve against this batch's articles
        let parked = std::mem::take(&mut self.pending);
        self.pending_keys.clear();
        for citation in parked {
            self.apply_citation(citation, None, true, &mut report);
        }

        // Phase 2: citations
        for (position, from, observed_at, cited_ids) in accepted {
            for to in cited_ids {
                let citation = PendingCitation {
                    from: from.clone(),
                    to,
                    observed_at,
                };
                self.apply_citation(citation, Some(position), false, &mut report);
            }
        }

        report.pending = self.pending.len();
        metrics::record_pending(report.pending);

        if recompute && self.engine.graph_version() != start_version {
            report.recompute = Some(self.engine.recompute()?);
        }
        report.graph_version = self.engine.graph_version();

        info!(
            articles_added = report.articles_added,
            citations_added = report.citations_added,
            deferred = report.citations_deferred,
            pending = report.pending,
            rejected = report.rejections.len(),
            graph_version = report.graph_version,
            "Batch ingested"
        );

        Ok(report)
    }

    fn apply_citation(
        &mut self,
        citation: PendingCitation,
        position: Option<usize>,
        retry: bool,
        report: &mut IngestionReport,
    ) {
        match self
            .engine
            .add_citation_at(&citation.from, &citation.to, citation.observed_at)
        {
            Ok(Insertion::Inserted) => {
                report.citations_added += 1;
                if retry {
                    report.pending_resolved += 1;
                }
            }
            Ok(Insertion::Unchanged) => {
                report.citations_unchanged += 1;
                if retry {
                    report.pending_resolved += 1;
                }
            }
            Err(RankingError::UnknownArticle { id }) if id == citation.to => {
                if retry {
                    self.park(citation, report);
                } else if !self.is_pending(&citation) {
                    report.citations_deferred += 1;
                    self.park(citation, report);
                }
            }
            Err(e) => report.reject(position, Some(citation.from), &e),
        }
    }

    fn is_pending(&self, citation: &PendingCitation) -> bool {
        self.pending_keys
            .contains(&(citation.from.clone(), citation.to.clone()))
    }

    fn park(&mut self, citation: PendingCitation, report: &mut IngestionReport) {
        self.pending_keys
            .insert((citation.from.clone(), citation.to.clone()));
        self.pending.push_back(citation);
        while self.pending.len() > self.max_pending {
            if let Some(dropped) = self.pending.pop_front() {
                self.pending_keys
                    .remove(&(dropped.from.clone(), dropped.to.clone()));
                warn!(from = %dropped.from, to = %dropped.to, "Pending citation buffer full, dropping oldest");
                let err = RankingError::PendingOverflow {
                    from: dropped.from.clone(),
                    to: dropped.to,
                };
                report.reject(None, Some(dropped.from), &err);
            }
        }
    }

    /// Recompute now if the published snapshot lags the graph
    pub fn recompute(&self) -> Result<RecomputeOutcome> {
        self.engine.recompute()
    }
}
