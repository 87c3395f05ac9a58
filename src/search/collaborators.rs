//! Contracts the search core consumes from its host.

use crate::schema::{SearchProgress, SearchStats};

use super::candidate::Candidate;
use super::clock::Deadline;
use super::goal::GoalSet;

/// Produces new tests. Variation operators live behind this seam.
pub trait Breeder<T> {
    /// Fresh tests for the first generation.
    fn initial_population(&mut self, size: usize) -> Vec<T>;

    /// `count` offspring bred from `parents`. `parents` is never empty.
    fn breed(&mut self, parents: &[Candidate<T>], count: usize) -> Vec<T>;
}

/// Computes per-goal fitness of a test. Must be callable from several
/// threads at once.
pub trait Evaluator<T>: Sync {
    /// One finite, non-negative value per goal in `goals`; 0 means covered.
    fn evaluate(&self, test: &T, goals: &GoalSet) -> Vec<f64>;
}

/// Directed generator failure. The round is discarded, never the search.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("Trace collection failed: {0}")]
    TraceCollection(String),
    #[error("Test synthesis failed: {0}")]
    Synthesis(String),
}

/// Fallback generator invoked when evolutionary progress stalls.
///
/// Both phases receive a deadline they are expected to poll.
pub trait DirectedGenerator<T> {
    /// Execute `seeds` and prime internal state for synthesis.
    fn collect_traces(
        &mut self,
        seeds: &[Candidate<T>],
        deadline: &Deadline<'_>,
    ) -> Result<(), GeneratorError>;

    /// Next synthesized test, or `None` when nothing more can be produced.
    fn synthesize_one(&mut self, deadline: &Deadline<'_>) -> Result<Option<T>, GeneratorError>;
}

/// Fire-and-forget progress notifications.
pub trait SearchObserver {
    fn on_iteration_complete(&mut self, _progress: &SearchProgress) {}

    fn on_search_finished(&mut self, _stats: &SearchStats) {}
}
