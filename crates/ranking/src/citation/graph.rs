//! Citation graph representation
//!
//! Index-based adjacency over articles. The graph owns every node and edge;
//! cycles need no special handling. Every structural mutation bumps the
//! graph version exactly once.

use chrono::{DateTime, Utc};
use herald_common::errors::{RankingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Article as supplied by the ingestion boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    /// Globally unique identifier
    pub id: String,

    /// Publication timestamp
    pub published_at: DateTime<Utc>,

    /// Source identifier (e.g. "arxiv")
    pub source: String,

    /// Ordered author identifiers
    pub authors: Vec<String>,

    /// Topic labels
    pub topics: BTreeSet<String>,
}

impl NewArticle {
    /// Article without authors or topics
    pub fn new(id: impl Into<String>, published_at: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            published_at,
            source: source.into(),
            authors: Vec::new(),
            topics: BTreeSet::new(),
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
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
}

/// Article node stored in the graph
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub authors: Vec<String>,
    pub topics: BTreeSet<String>,

    /// Withdrawn articles stay in the graph for historical scoring
    pub withdrawn: bool,
}

impl Article {
    /// Name of the first immutable field that differs, if any
    fn conflicting_field(&self, record: &NewArticle) -> Option<&'static str> {
        if self.published_at != record.published_at {
            Some("timestamp")
        } else if self.source != record.source {
            Some("source")
        } else if self.authors != record.authors {
            Some("authors")
        } else if self.topics != record.topics {
            Some("topics")
        } else {
            None
        }
    }
}

/// Edge in the citation graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationEdge {
    /// Citing article ID
    pub citing: String,

    /// Cited article ID
    pub cited: String,

    /// When the edge was first observed
    pub observed_at: DateTime<Utc>,
}

/// Result of an idempotent insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insertion {
    /// New node or edge recorded, version bumped
    Inserted,
    /// Identical data already present, nothing changed
    Unchanged,
}

/// Direction for neighbor lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Articles this article cites
    Cited,
    /// Articles citing this article
    Citing,
    /// Both directions
    Both,
}

/// In-memory citation graph
#[derive(Debug, Clone, Default)]
pub struct CitationGraph {
    /// Nodes in insertion order; the position is the node index
    articles: Vec<Article>,

    /// Article id -> node index
    index: HashMap<String, usize>,

    /// Adjacency list: node -> nodes it cites
    outgoing: Vec<Vec<usize>>,

    /// Reverse adjacency: node -> nodes citing it
    incoming: Vec<Vec<usize>>,

    /// (citing, cited) -> first observation time
    edges: HashMap<(usize, usize), DateTime<Utc>>,

    /// Monotonic structural version
    version: u64,
}

impl CitationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an article node.
    ///
    /// Re-adding identical data is a no-op; a conflicting record under an
    /// existing id is rejected without touching the graph.
    pub fn add_article(&mut self, mut record: NewArticle) -> Result<Insertion> {
        if record.id.trim().is_empty() {
            return Err(RankingError::missing_field("id"));
        }

        // An author listed twice would receive double credit
        let mut seen = HashSet::new();
        record.authors.retain(|a| seen.insert(a.clone()));

        if let Some(&idx) = self.index.get(&record.id) {
            return match self.articles[idx].conflicting_field(&record) {
                None => Ok(Insertion::Unchanged),
                Some(field) => Err(RankingError::DuplicateArticle {
                    id: record.id,
                    message: format!("already present with a different {}", field),
                }),
            };
        }

        let idx = self.articles.len();
        self.index.insert(record.id.clone(), idx);
        self.articles.push(Article {
            id: record.id,
            published_at: record.published_at,
            source: record.source,
            authors: record.authors,
            topics: record.topics,
            withdrawn: false,
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.version += 1;

        Ok(Insertion::Inserted)
    }

    /// Add a citation edge `from` cites `to`
    pub fn add_citation(&mut self, from: &str, to: &str, observed_at: DateTime<Utc>) -> Result<Insertion> {
        if from == to {
            return Err(RankingError::SelfCitation { id: from.to_string() });
        }

        let citing = self.require(from)?;
        let cited = self.require(to)?;

        if self.edges.contains_key(&(citing, cited)) {
            return Ok(Insertion::Unchanged);
        }

        self.edges.insert((citing, cited), observed_at);
        self.outgoing[citing].push(cited);
        self.incoming[cited].push(citing);
        self.version += 1;

        Ok(Insertion::Inserted)
    }

    /// Flag an article as withdrawn
    pub fn mark_withdrawn(&mut self, id: &str) -> Result<Insertion> {
        let idx = self
            .index
            .get(id)
            .copied()
            .ok_or_else(|| RankingError::not_found("article", id))?;

        let article = &mut self.articles[idx];
        if article.withdrawn {
            return Ok(Insertion::Unchanged);
        }

        article.withdrawn = true;
        self.version += 1;
        Ok(Insertion::Inserted)
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| RankingError::UnknownArticle { id: id.to_string() })
    }

    /// Node index of an article
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Article by id
    pub fn get(&self, id: &str) -> Option<&Article> {
        self.index_of(id).map(|idx| &self.articles[idx])
    }

    /// Article by node index
    pub fn article(&self, idx: usize) -> &Article {
        &self.articles[idx]
    }

    /// All articles in node order
    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    /// Neighbor article ids in the given direction
    pub fn neighbors(&self, id: &str, direction: Direction) -> Result<Vec<&str>> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| RankingError::not_found("article", id))?;

        let mut nodes: Vec<usize> = match direction {
            Direction::Cited => self.outgoing[idx].clone(),
            Direction::Citing => self.incoming[idx].clone(),
            Direction::Both => {
                let mut both = self.outgoing[idx].clone();
                both.extend_from_slice(&self.incoming[idx]);
                both
            }
        };
        nodes.sort_unstable();
        nodes.dedup();

        Ok(nodes.into_iter().map(|n| self.articles[n].id.as_str()).collect())
    }

    /// Node indices cited by a node
    pub fn references_of(&self, idx: usize) -> &[usize] {
        &self.outgoing[idx]
    }

    /// Recorded edge between two articles
    pub fn edge(&self, from: &str, to: &str) -> Option<CitationEdge> {
        let citing = self.index_of(from)?;
        let cited = self.index_of(to)?;
        self.edges.get(&(citing, cited)).map(|&observed_at| CitationEdge {
            citing: from.to_string(),
            cited: to.to_string(),
            observed_at,
        })
    }

    /// Get citation count (incoming edges)
    pub fn citation_count(&self, id: &str) -> usize {
        self.index_of(id).map(|idx| self.incoming[idx].len()).unwrap_or(0)
    }

    /// Get reference count (outgoing edges)
    pub fn reference_count(&self, id: &str) -> usize {
        self.index_of(id).map(|idx| self.outgoing[idx].len()).unwrap_or(0)
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.articles.len()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Current structural version
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use herald_common::ErrorCode;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn article(id: &str, day: u32) -> NewArticle {
        NewArticle::new(id, ts(day), "arxiv").with_authors([format!("{}-author", id)])
    }

    #[test]
    fn test_graph_construction() {
        let mut graph = CitationGraph::new();

        graph.add_article(article("a", 1)).unwrap();
        graph.add_article(article("b", 2)).unwrap();
        graph.add_article(article("c", 3)).unwrap();

        // A cites B, B cites C
        graph.add_citation("a", "b", ts(5)).unwrap();
        graph.add_citation("b", "c", ts(5)).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbors("a", Direction::Cited).unwrap(), vec!["b"]);
        assert_eq!(graph.neighbors("b", Direction::Citing).unwrap(), vec!["a"]);
        assert_eq!(graph.neighbors("b", Direction::Both).unwrap(), vec!["a", "c"]);
        assert_eq!(graph.version(), 5);
    }

    #[test]
    fn test_citation_counts() {
        let mut graph = CitationGraph::new();
        for (id, day) in [("a", 1), ("b", 2), ("c", 3)] {
            graph.add_article(article(id, day)).unwrap();
        }

        // Both A and C cite B
        graph.add_citation("a", "b", ts(5)).unwrap();
        graph.add_citation("c", "b", ts(6)).unwrap();

        assert_eq!(graph.citation_count("b"), 2);
        assert_eq!(graph.reference_count("a"), 1);
        assert_eq!(graph.citation_count("missing"), 0);
        assert_eq!(graph.edge("c", "b").unwrap().observed_at, ts(6));
    }

    #[test]
    fn test_reingestion_is_idempotent() {
        let mut graph = CitationGraph::new();
        graph.add_article(article("a", 1)).unwrap();
        graph.add_article(article("b", 2)).unwrap();
        graph.add_citation("a", "b", ts(5)).unwrap();
        let version = graph.version();

        assert_eq!(graph.add_article(article("a", 1)).unwrap(), Insertion::Unchanged);
        assert_eq!(graph.add_citation("a", "b", ts(9)).unwrap(), Insertion::Unchanged);
        assert_eq!(graph.version(), version);
        assert_eq!(graph.edge_count(), 1);
        // First observation wins
        assert_eq!(graph.edge("a", "b").unwrap().observed_at, ts(5));
    }

    #[test]
    fn test_conflicting_article_rejected() {
        let mut graph = CitationGraph::new();
        graph.add_article(article("a", 1)).unwrap();

        let err = graph.add_article(article("a", 2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateArticle);

        let other_source = NewArticle::new("a", ts(1), "pubmed").with_authors(["a-author"]);
        assert!(graph.add_article(other_source).is_err());
        assert_eq!(graph.version(), 1);
    }

    #[test]
    fn test_invalid_citations() {
        let mut graph = CitationGraph::new();
        graph.add_article(article("a", 1)).unwrap();

        let err = graph.add_citation("a", "a", ts(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SelfCitation);

        let err = graph.add_citation("a", "ghost", ts(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownArticle);

        let err = graph.add_citation("ghost", "a", ts(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownArticle);

        assert_eq!(graph.version(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_withdrawal_bumps_version_once() {
        let mut graph = CitationGraph::new();
        graph.add_article(article("a", 1)).unwrap();

        assert_eq!(graph.mark_withdrawn("a").unwrap(), Insertion::Inserted);
        assert_eq!(graph.mark_withdrawn("a").unwrap(), Insertion::Unchanged);
        assert_eq!(graph.version(), 2);
        assert!(graph.get("a").unwrap().withdrawn);

        let err = graph.mark_withdrawn("ghost").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
