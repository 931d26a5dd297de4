//! Herald Ingestion
//!
//! Boundary between the external article store and the ranking engine:
//! - Record parsing and validation
//! - Batch ingestion with deferred citations
//! - JSON-lines replay

pub mod processor;
pub mod record;
pub mod replay;

pub use processor::{IngestionProcessor, IngestionReport, Rejection};
pub use record::{ArticleRecord, RecordTimestamp, ValidatedRecord};
pub use replay::{replay_file, replay_jsonl};
