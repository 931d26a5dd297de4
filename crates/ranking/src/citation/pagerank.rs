//! PageRank-based influence propagation
//!
//! Scores are scaled so that they sum to the article count N: every article
//! starts at 1.0, the teleport term contributes (1 - d) to each article, and
//! the mass held by dangling articles is spread uniformly over all articles.

use super::CitationGraph;
use herald_common::config::PropagationConfig;
use herald_common::errors::ConvergenceWarning;
use std::convert::Infallible;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of one full propagation run
#[derive(Debug, Clone)]
pub struct Propagation {
    /// Base influence per node index
    pub scores: Vec<f64>,

    /// Iterations performed
    pub iterations: usize,

    /// L1 norm of the last score delta
    pub residual: f64,

    /// Whether the residual dropped below epsilon
    pub converged: bool,

    /// Set when the iteration cap was hit
    pub warning: Option<ConvergenceWarning>,
}

/// PageRank scorer for articles
#[derive(Debug, Clone)]
pub struct InfluencePropagator {
    config: PropagationConfig,
}

impl InfluencePropagator {
    /// Create a new propagator
    pub fn new(config: PropagationConfig) -> Self {
        Self { config }
    }

    /// Compute base influence for all articles
    pub fn compute(&self, graph: &CitationGraph) -> Propagation {
        match self.run(graph, || Ok::<(), Infallible>(())) {
            Ok(propagation) => propagation,
            Err(never) => match never {},
        }
    }

    /// Compute base influence, checking `should_abort` before every iteration.
    ///
    /// Returns `None` if the run was abandoned.
    pub fn compute_cancellable<F>(&self, graph: &CitationGraph, should_abort: F) -> Option<Propagation>
    where
        F: Fn() -> bool,
    {
        self.run(graph, || if should_abort() { Err(()) } else { Ok(()) })
            .ok()
    }

    fn run<E, F>(&self, graph: &CitationGraph, check: F) -> Result<Propagation, E>
    where
        F: Fn() -> Result<(), E>,
    {
        let n = graph.node_count();
        if n == 0 {
            return Ok(Propagation {
                scores: Vec::new(),
                iterations: 0,
                residual: 0.0,
                converged: true,
                warning: None,
            });
        }

        let started = Instant::now();
        let n_f64 = n as f64;
        let damping = self.config.damping;
        let teleport = 1.0 - damping;

        let mut scores = vec![1.0; n];
        let mut next = vec![0.0; n];
        let mut residual = f64::INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            if let Err(aborted) = check() {
                debug!(iterations, "Propagation abandoned");
                return Err(aborted);
            }

            // Mass parked on dangling articles is spread uniformly
            let dangling: f64 = (0..n)
                .filter(|&i| graph.references_of(i).is_empty())
                .map(|i| scores[i])
                .sum();

            next.fill(teleport + damping * dangling / n_f64);

            for (i, &score) in scores.iter().enumerate() {
                let refs = graph.references_of(i);
                if refs.is_empty() {
                    continue;
                }
                let share = damping * score / refs.len() as f64;
                for &cited in refs {
                    next[cited] += share;
                }
            }

            residual = scores.iter().zip(&next).map(|(old, new)| (new - old).abs()).sum();
            std::mem::swap(&mut scores, &mut next);
            iterations += 1;

            debug!(iteration = iterations, residual, "Propagation step");

            if residual < self.config.epsilon {
                converged = true;
                break;
            }
        }

        // Remove floating-point drift so the total is exactly N
        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            let scale = n_f64 / total;
            scores.iter_mut().for_each(|s| *s *= scale);
        }

        let warning = (!converged).then(|| ConvergenceWarning {
            graph_version: graph.version(),
            iterations,
            residual,
            epsilon: self.config.epsilon,
        });

        if let Some(warning) = &warning {
            warn!(
                graph_version = warning.graph_version,
                iterations = warning.iterations,
                residual = warning.residual,
                "{}",
                warning
            );
        }

        herald_common::metrics::record_propagation(
            started.elapsed().as_secs_f64(),
            iterations,
            converged,
        );

        Ok(Propagation {
            scores,
            iterations,
            residual,
            converged,
            warning,
        })
    }
}
