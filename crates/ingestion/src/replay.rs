//! JSON-lines replay
//!
//! Streams records out of an exported article store, one JSON object per
//! line, and ingests them in batches of `ingestion.replay_batch_size`.
//! Report positions are 1-based line numbers.

use crate::processor::{IngestionProcessor, IngestionReport};
use crate::record::ArticleRecord;
use herald_common::errors::{RankingError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Replay every record read from `reader`.
///
/// Lines that are blank are skipped; lines that are not valid records are
/// reported as `MalformedRecord`. When the processor recomputes
/// automatically, one recomputation runs after the last batch.
pub fn replay_jsonl<R: BufRead>(processor: &mut IngestionProcessor, reader: R) -> Result<IngestionReport> {
    let batch_size = processor.engine().config().ingestion.replay_batch_size;
    let mut report = IngestionReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ArticleRecord>(&line) {
            Ok(record) => batch.push((line_no, record)),
            Err(e) => {
                report.records += 1;
                let err = RankingError::MalformedRecord {
                    message: format!("line {}: {}", line_no, e),
                    field: None,
                };
                report.reject(Some(line_no), None, &err);
            }
        }

        if batch.len() >= batch_size {
            debug!(line = line_no, "Flushing replay batch");
            report.merge(processor.ingest_positioned(std::mem::take(&mut batch), false)?);
        }
    }

    if !batch.is_empty() {
        report.merge(processor.ingest_positioned(batch, false)?);
    }

    if processor.auto_recompute() {
        report.recompute = Some(processor.recompute()?);
    }
    report.graph_version = processor.engine().graph_version();

    info!(
        records = report.records,
        articles_added = report.articles_added,
        citations_added = report.citations_added,
        pending = report.pending,
        rejected = report.rejections.len(),
        "Replay finished"
    );

    Ok(report)
}

/// Replay a JSON-lines file
#[instrument(skip(processor, path), fields(path = %path.as_ref().display()))]
pub fn replay_file(processor: &mut IngestionProcessor, path: impl AsRef<Path>) -> Result<IngestionReport> {
    let file = File::open(path.as_ref())?;
    replay_jsonl(processor, BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_common::config::RankingConfig;
    use herald_common::ErrorCode;
    use herald_ranking::{RankingEngine, RecomputeOutcome};
    use std::io::Cursor;
    use std::sync::Arc;

    fn processor(batch_size: usize) -> IngestionProcessor {
        let mut config = RankingConfig::default();
        config.ingestion.replay_batch_size = batch_size;
        IngestionProcessor::new(Arc::new(RankingEngine::new(config).unwrap()))
    }

    #[test]
    fn test_bad_lines_are_reported_and_skipped() {
        let input = [
            r#"{"id": "a", "timestamp": "2024-01-01", "cited_ids": ["b"]}"#,
            "",
            "{not json",
            r#"{"id": "b", "timestamp": "2024-01-02"}"#,
        ]
        .join("\n");

        let mut processor = processor(100);
        let report = replay_jsonl(&mut processor, Cursor::new(input)).unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.articles_added, 2);
        assert_eq!(report.citations_added, 1);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].position, Some(3));
        assert_eq!(report.rejections[0].error.code, ErrorCode::MalformedRecord);
    }

    #[test]
    fn test_citations_resolve_across_batches() {
        // Batch size 1: the citation of "a" waits until "b" arrives
        let input = concat!(
            r#"{"id": "a", "timestamp": 1704067200, "citedIds": ["b"]}"#,
            "\n",
            r#"{"id": "b", "timestamp": 1704153600}"#,
            "\n",
        );

        let mut processor = processor(1);
        let report = replay_jsonl(&mut processor, Cursor::new(input)).unwrap();

        assert_eq!(report.citations_deferred, 1);
        assert_eq!(report.pending_resolved, 1);
        assert_eq!(report.pending, 0);
        assert!(matches!(
            report.recompute,
            Some(RecomputeOutcome::Published { version: 3, converged: true, .. })
        ));
    }
}
