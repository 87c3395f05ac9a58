//! Progress and statistics types for observers and reports.

use serde::{Deserialize, Serialize};

/// Whether the last generation ran the directed fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Evolutionary,
    Directed,
}

/// Snapshot of search progress, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Generations completed.
    pub generation: usize,
    /// Goals covered so far.
    pub covered_goals: usize,
    /// Goals in the active frontier.
    pub current_goals: usize,
    /// Goals not yet covered.
    pub uncovered_goals: usize,
    /// Total goals.
    pub total_goals: usize,
    /// Seconds since the search started.
    pub elapsed_seconds: f64,
    /// Consecutive generations without proxy improvement.
    pub stall_count: usize,
    /// Stall count that triggers the next directed round.
    pub stall_threshold: usize,
    /// Directed rounds fired.
    pub directed_rounds: usize,
    /// Directed rounds that improved the coverage proxy.
    pub improving_directed_rounds: usize,
    /// Mode of the last generation.
    pub mode: SearchMode,
    /// Current population size.
    pub population_size: usize,
}

/// Coverage history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchHistory {
    /// Covered goals after each generation.
    pub covered_goals: Vec<usize>,
    /// Frontier size after each generation.
    pub current_goals: Vec<usize>,
    /// Coverage proxy after each generation.
    pub proxy_coverage: Vec<usize>,
    /// Generations that ran a directed round.
    pub directed_generations: Vec<usize>,
}

/// Statistics from a finished search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Total generations run.
    pub generations: usize,
    /// Fitness evaluations performed.
    pub evaluations: u64,
    /// Goals covered.
    pub covered_goals: usize,
    /// Total goals.
    pub total_goals: usize,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Directed rounds fired.
    pub directed_rounds: usize,
    /// Directed rounds that improved the coverage proxy.
    pub improving_directed_rounds: usize,
    /// Reason for stopping.
    pub stop_reason: StopReason,
    /// Full history for analysis.
    pub history: SearchHistory,
}

impl SearchStats {
    /// Covered fraction in `[0, 1]`; 1 for an empty goal set.
    pub fn coverage(&self) -> f64 {
        if self.total_goals == 0 {
            1.0
        } else {
            self.covered_goals as f64 / self.total_goals as f64
        }
    }
}

/// Reason the search stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Every goal is covered.
    AllGoalsCovered,
    /// Reached maximum generations.
    MaxGenerations,
    /// Wall-clock budget consumed.
    TimeBudget,
    /// User cancelled.
    Cancelled,
}
