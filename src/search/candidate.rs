//! Candidate individuals of the population.

use std::sync::Arc;

use super::goal::GoalId;

/// Something the search can breed and archive: a test of some size.
pub trait TestCase: Clone + Send + Sync {
    /// Test length. Shorter tests win archive ties.
    fn size(&self) -> usize;
}

/// A candidate individual in the population.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    /// Unique identifier.
    pub id: u64,
    /// The test itself, shared between the population and the archive.
    pub test: Arc<T>,
    /// Fitness per goal, indexed by [`GoalId`]. Lower is better.
    pub fitness: Vec<f64>,
    /// Front index assigned by the last ranking pass.
    pub rank: usize,
    /// Crowding score assigned when the candidate's front was last scored.
    pub diversity: f64,
    /// Generation created.
    pub generation: usize,
}

impl<T: TestCase> Candidate<T> {
    /// Wrap an evaluated test.
    pub fn new(id: u64, test: T, fitness: Vec<f64>, generation: usize) -> Self {
        Self {
            id,
            test: Arc::new(test),
            fitness,
            rank: 0,
            diversity: 0.0,
            generation,
        }
    }

    /// Fitness on one goal. Goals outside the vector count as uncovered.
    pub fn fitness_for(&self, goal: GoalId) -> f64 {
        self.fitness.get(goal.index()).copied().unwrap_or(f64::MAX)
    }

    pub fn size(&self) -> usize {
        self.test.size()
    }
}

/// `a` dominates `b` iff it is no worse on every goal and strictly better on
/// at least one.
pub fn dominates<T: TestCase>(a: &Candidate<T>, b: &Candidate<T>, goals: &[GoalId]) -> bool {
    let mut strictly_better = false;
    for &goal in goals {
        let (fa, fb) = (a.fitness_for(goal), b.fitness_for(goal));
        if fa > fb {
            return false;
        }
        if fa < fb {
            strictly_better = true;
        }
    }
    strictly_better
}
