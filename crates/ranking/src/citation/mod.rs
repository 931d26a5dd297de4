//! Citation graph and influence propagation
//!
//! Stores articles and citation edges and implements the PageRank-family
//! fixed-point computation that yields per-article base influence.

mod graph;
mod pagerank;

pub use graph::{Article, CitationEdge, CitationGraph, Direction, Insertion, NewArticle};
pub use pagerank::{InfluencePropagator, Propagation};
