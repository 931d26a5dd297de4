//! Author influence aggregation
//!
//! Authors are a projection over articles: each article's base influence is
//! split equally among its co-authors and summed per author. Nothing here is
//! stored outside the snapshot it is computed for.

use crate::citation::CitationGraph;
use serde::Serialize;
use std::collections::HashMap;

/// Aggregated author view at one graph version
#[derive(Debug, Clone, Serialize)]
pub struct AuthorProfile {
    pub author_id: String,

    /// Articles authored, in graph insertion order
    pub article_ids: Vec<String>,

    /// Sum of credit-split base influence
    pub influence: f64,
}

/// Author influence table for one propagation result
#[derive(Debug, Clone, Default)]
pub struct AuthorTable {
    profiles: HashMap<String, AuthorProfile>,
}

impl AuthorTable {
    /// Aggregate author influence from base influence per node index
    pub fn aggregate(graph: &CitationGraph, base: &[f64]) -> Self {
        let mut profiles: HashMap<String, AuthorProfile> = HashMap::new();

        for (idx, article) in graph.articles().iter().enumerate() {
            if article.authors.is_empty() {
                continue;
            }
            let credit = base[idx] / article.authors.len() as f64;

            for author in &article.authors {
                let profile = profiles.entry(author.clone()).or_insert_with(|| AuthorProfile {
                    author_id: author.clone(),
                    article_ids: Vec::new(),
                    influence: 0.0,
                });
                profile.article_ids.push(article.id.clone());
                profile.influence += credit;
            }
        }

        Self { profiles }
    }

    /// Influence of one author, zero if unknown
    pub fn influence(&self, author_id: &str) -> f64 {
        self.profiles.get(author_id).map(|p| p.influence).unwrap_or(0.0)
    }

    /// Strongest author signal among an article's authors
    pub fn max_influence<'a, I>(&self, authors: I) -> f64
    where
        I: IntoIterator<Item = &'a String>,
    {
        authors
            .into_iter()
            .map(|a| self.influence(a))
            .fold(0.0, f64::max)
    }

    pub fn get(&self, author_id: &str) -> Option<&AuthorProfile> {
        self.profiles.get(author_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
