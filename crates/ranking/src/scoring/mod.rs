//! Score derivation
//!
//! - Exponential recency decay
//! - Author influence aggregation with credit splitting
//! - Composite score blending

mod authors;
mod blend;
mod decay;

pub use authors::{AuthorProfile, AuthorTable};
pub use blend::{normalize, ScoreBlender};
pub use decay::decay_weight;
