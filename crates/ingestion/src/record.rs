//! Article records as delivered by the external store
//!
//! Records are loosely typed: every field may be absent and timestamps come
//! either as epoch seconds or as text. Validation turns a record into a
//! [`NewArticle`] plus its outgoing citations, or a `MalformedRecord` error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use herald_common::errors::{RankingError, Result};
use herald_ranking::NewArticle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Source label for records that carry none
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Publication timestamp in one of the accepted encodings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordTimestamp {
    /// Seconds since the Unix epoch
    Seconds(i64),
    /// RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) or `YYYY-MM-DD`
    Text(String),
}

impl RecordTimestamp {
    pub fn to_utc(&self) -> Result<DateTime<Utc>> {
        match self {
            RecordTimestamp::Seconds(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| malformed_timestamp(format!("{} is out of range", secs))),
            RecordTimestamp::Text(text) => parse_timestamp(text),
        }
    }
}

/// Parse a textual timestamp; naive forms are taken as UTC
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(malformed_timestamp(format!("unrecognized timestamp `{}`", text)))
}

fn malformed_timestamp(message: String) -> RankingError {
    RankingError::MalformedRecord {
        message,
        field: Some("timestamp".to_string()),
    }
}

/// One article as stored externally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, alias = "published_at", alias = "publishedAt")]
    pub timestamp: Option<RecordTimestamp>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    /// Ids of the articles this one cites
    #[serde(default, alias = "citedIds")]
    pub cited_ids: Vec<String>,

    #[serde(default, alias = "categories")]
    pub topics: Vec<String>,
}

/// A record that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub article: NewArticle,

    /// Trimmed, non-empty and deduplicated, in record order
    pub cited_ids: Vec<String>,
}

impl ArticleRecord {
    pub fn new(id: impl Into<String>, timestamp: RecordTimestamp) -> Self {
        Self {
            id: Some(id.into()),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn citing<I, S>(mut self, cited: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cited_ids = cited.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Check required fields and normalize the rest
    pub fn validate(&self) -> Result<ValidatedRecord> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RankingError::missing_field("id"))?;

        let published_at = self
            .timestamp
            .as_ref()
            .ok_or_else(|| RankingError::missing_field("timestamp"))?
            .to_utc()?;

        let source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SOURCE);

        let topics = self
            .topics
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let article = NewArticle::new(id, published_at, source)
            .with_authors(clean(&self.authors))
            .with_topics(topics);

        Ok(ValidatedRecord {
            article,
            cited_ids: clean(&self.cited_ids),
        })
    }
}

fn clean(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .map(str::to_string)
        .collect()
}
