//! Dynamic target selection: frontier, coverage and archive bookkeeping.

use std::collections::{BTreeSet, VecDeque};

use super::archive::{Archive, ArchiveUpdate};
use super::candidate::{Candidate, TestCase};
use super::goal::{GoalId, GoalKind, GoalSet};

/// Owns the goal universe, the active frontier and the archive for one search.
///
/// Only goals whose predecessors are all covered sit in the frontier, so the
/// search pressure follows reachability order.
#[derive(Debug, Clone)]
pub struct GoalsManager<T> {
    goals: GoalSet,
    frontier: BTreeSet<GoalId>,
    covered: BTreeSet<GoalId>,
    archive: Archive<T>,
}

impl<T: TestCase> GoalsManager<T> {
    /// Start with the dependency roots as the frontier.
    pub fn new(goals: GoalSet) -> Self {
        let frontier = goals.roots().collect();
        Self {
            goals,
            frontier,
            covered: BTreeSet::new(),
            archive: Archive::new(),
        }
    }

    pub fn goal_set(&self) -> &GoalSet {
        &self.goals
    }

    /// Goals currently driving ranking and diversity.
    pub fn current_goals(&self) -> Vec<GoalId> {
        self.frontier.iter().copied().collect()
    }

    pub fn covered_goals(&self) -> Vec<GoalId> {
        self.covered.iter().copied().collect()
    }

    /// Every goal not yet covered, active or not.
    pub fn uncovered_goals(&self) -> Vec<GoalId> {
        self.goals
            .iter()
            .map(|g| g.id())
            .filter(|id| !self.covered.contains(id))
            .collect()
    }

    pub fn covered_count(&self) -> usize {
        self.covered.len()
    }

    pub fn uncovered_count(&self) -> usize {
        self.goals.len() - self.covered.len()
    }

    pub fn current_count(&self) -> usize {
        self.frontier.len()
    }

    /// Covered goals of `kind`, or of every kind when `None`.
    pub fn covered_count_of(&self, kind: Option<GoalKind>) -> usize {
        match kind {
            None => self.covered.len(),
            Some(kind) => self
                .covered
                .iter()
                .filter(|&&id| self.goals.get(id).is_some_and(|g| g.kind() == kind))
                .count(),
        }
    }

    /// Uncovered goals of `kind`, or of every kind when `None`.
    pub fn uncovered_count_of(&self, kind: Option<GoalKind>) -> usize {
        self.goals
            .iter()
            .filter(|g| kind.is_none_or(|k| g.kind() == k))
            .filter(|g| !self.covered.contains(&g.id()))
            .count()
    }

    pub fn is_covered(&self, goal: GoalId) -> bool {
        self.covered.contains(&goal)
    }

    pub fn archive(&self) -> &Archive<T> {
        &self.archive
    }

    /// Distinct archived candidates.
    pub fn solutions(&self) -> Vec<Candidate<T>> {
        self.archive.solutions()
    }

    /// Update coverage, frontier and archive after `candidate` was evaluated.
    ///
    /// Returns the goals newly covered by this candidate.
    pub fn update_on_evaluation(&mut self, candidate: &Candidate<T>) -> Vec<GoalId> {
        // Already covered goals may still get a smaller archived test.
        let satisfied: Vec<GoalId> = self
            .covered
            .iter()
            .copied()
            .filter(|&goal| self.is_satisfied(goal, candidate))
            .collect();
        for goal in satisfied {
            if self.archive.offer(goal, candidate) == ArchiveUpdate::Replaced {
                log::trace!("Archive entry for {} replaced by candidate {}", goal, candidate.id);
            }
        }

        let mut newly_covered = Vec::new();
        let mut worklist: VecDeque<GoalId> = self.frontier.iter().copied().collect();

        while let Some(goal) = worklist.pop_front() {
            if !self.frontier.contains(&goal) || !self.is_satisfied(goal, candidate) {
                continue;
            }

            self.frontier.remove(&goal);
            self.covered.insert(goal);
            self.archive.offer(goal, candidate);
            newly_covered.push(goal);

            for &child in self.goals.dependents(goal) {
                if self.covered.contains(&child) || self.frontier.contains(&child) {
                    continue;
                }
                let ready = self
                    .goals
                    .get(child)
                    .is_some_and(|g| g.dependencies().iter().all(|d| self.covered.contains(d)));
                if ready {
                    self.frontier.insert(child);
                    // The same candidate may already reach the promoted goal.
                    worklist.push_back(child);
                }
            }
        }

        newly_covered
    }

    fn is_satisfied(&self, goal: GoalId, candidate: &Candidate<T>) -> bool {
        self.goals
            .get(goal)
            .is_some_and(|g| g.is_satisfied_by(candidate.fitness_for(goal)))
    }
}
