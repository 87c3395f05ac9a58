//! Crowding-distance diversity within a front.

use super::candidate::{Candidate, TestCase};
use super::goal::GoalId;

/// Assigns crowding scores so that candidates in sparse regions of the
/// objective space win when a front must be truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiversityAssigner;

impl DiversityAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Score every member of `front` on the active `goals`.
    ///
    /// Per goal, the front is ordered by fitness; the two extremes get
    /// `f64::INFINITY` and interior members add the normalized gap between
    /// their neighbours. Goals on which the whole front agrees add nothing.
    ///
    /// # Panics
    ///
    /// Panics on an empty front.
    pub fn assign<T: TestCase>(&self, front: &mut [Candidate<T>], goals: &[GoalId]) {
        assert!(!front.is_empty(), "diversity assignment on an empty front");

        for candidate in front.iter_mut() {
            candidate.diversity = 0.0;
        }

        let n = front.len();

        for &goal in goals {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| front[a].fitness_for(goal).total_cmp(&front[b].fitness_for(goal)));

            let min = front[order[0]].fitness_for(goal);
            let max = front[order[n - 1]].fitness_for(goal);
            let range = max - min;
            if range <= 0.0 {
                continue;
            }

            front[order[0]].diversity = f64::INFINITY;
            front[order[n - 1]].diversity = f64::INFINITY;

            for k in 1..n.saturating_sub(1) {
                let gap = front[order[k + 1]].fitness_for(goal) - front[order[k - 1]].fitness_for(goal);
                front[order[k]].diversity += gap / range;
            }
        }
    }

    /// Stable sort by descending diversity; equal scores keep their order.
    pub fn sort_by_diversity<T>(&self, front: &mut [Candidate<T>]) {
        front.sort_by(|a, b| b.diversity.total_cmp(&a.diversity));
    }
}
