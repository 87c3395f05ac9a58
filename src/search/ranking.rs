//! Preference sorting followed by non-dominated sorting.

use super::candidate::{Candidate, TestCase, dominates};
use super::goal::GoalId;

/// Fronts produced by one ranking pass, each holding candidates in insertion
/// order.
#[derive(Debug, Clone)]
pub struct Ranking<T> {
    fronts: Vec<Vec<Candidate<T>>>,
}

impl<T> Ranking<T> {
    pub fn number_of_fronts(&self) -> usize {
        self.fronts.len()
    }

    /// Front `index`, empty past the last front.
    pub fn front(&self, index: usize) -> &[Candidate<T>] {
        self.fronts.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fronts(&self) -> &[Vec<Candidate<T>>] {
        &self.fronts
    }

    pub fn into_fronts(self) -> Vec<Vec<Candidate<T>>> {
        self.fronts
    }
}

/// Partitions a population into ordered fronts on the active goals.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine;

impl RankingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rank `population` against the active `goals`.
    ///
    /// Front 0 holds one champion per active goal. The rest are split by
    /// non-dominated sorting on the active goals. Every candidate's `rank` is
    /// set to its front index.
    pub fn rank<T: TestCase>(&self, population: Vec<Candidate<T>>, goals: &[GoalId]) -> Ranking<T> {
        if population.is_empty() {
            return Ranking { fronts: Vec::new() };
        }
        if goals.is_empty() {
            return Ranking {
                fronts: vec![assign_rank(population, 0)],
            };
        }

        let champions = preference_sort(&population, goals);
        let mut slots: Vec<Option<Candidate<T>>> = population.into_iter().map(Some).collect();

        let mut fronts = Vec::new();
        let first: Vec<Candidate<T>> = champions
            .iter()
            .filter_map(|&i| slots[i].take())
            .collect();
        fronts.push(assign_rank(first, 0));

        let rest: Vec<Candidate<T>> = slots.into_iter().flatten().collect();
        for (offset, front) in non_dominated_sort(rest, goals).into_iter().enumerate() {
            fronts.push(assign_rank(front, offset + 1));
        }

        Ranking { fronts }
    }
}

/// Indices of the per-goal champions, ascending and de-duplicated.
///
/// Champion for a goal: lowest fitness on it, then lowest total fitness over
/// the active goals, then lexicographic fitness, then earliest position. The
/// tie-breaks keep every champion non-dominated.
fn preference_sort<T: TestCase>(population: &[Candidate<T>], goals: &[GoalId]) -> Vec<usize> {
    let totals: Vec<f64> = population
        .iter()
        .map(|c| goals.iter().map(|&g| c.fitness_for(g)).sum())
        .collect();

    let mut champions: Vec<usize> = goals
        .iter()
        .filter_map(|&goal| {
            (0..population.len()).min_by(|&a, &b| {
                population[a]
                    .fitness_for(goal)
                    .total_cmp(&population[b].fitness_for(goal))
                    .then(totals[a].total_cmp(&totals[b]))
                    .then_with(|| lexicographic(&population[a], &population[b], goals))
                    .then(a.cmp(&b))
            })
        })
        .collect();
    champions.sort_unstable();
    champions.dedup();
    champions
}

fn lexicographic<T: TestCase>(
    a: &Candidate<T>,
    b: &Candidate<T>,
    goals: &[GoalId],
) -> std::cmp::Ordering {
    goals
        .iter()
        .map(|&g| a.fitness_for(g).total_cmp(&b.fitness_for(g)))
        .find(|o| o.is_ne())
        .unwrap_or(std::cmp::Ordering::Equal)
}

/// Classic fast non-dominated sort, stable within each front.
fn non_dominated_sort<T: TestCase>(
    population: Vec<Candidate<T>>,
    goals: &[GoalId],
) -> Vec<Vec<Candidate<T>>> {
    let n = population.len();
    if n == 0 {
        return Vec::new();
    }

    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&population[i], &population[j], goals) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&population[j], &population[i], goals) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        layers.push(current);
        current = next;
    }

    let mut slots: Vec<Option<Candidate<T>>> = population.into_iter().map(Some).collect();
    layers
        .into_iter()
        .map(|layer| layer.into_iter().filter_map(|i| slots[i].take()).collect())
        .collect()
}

fn assign_rank<T>(mut front: Vec<Candidate<T>>, rank: usize) -> Vec<Candidate<T>> {
    for candidate in &mut front {
        candidate.rank = rank;
    }
    front
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::candidate::testing::{Probe, probe};
    use proptest::prelude::*;

    fn ids(front: &[Candidate<Probe>]) -> Vec<u64> {
        front.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_champions_form_first_front() {
        let goals = [GoalId(0), GoalId(1)];
        let population = vec![
            probe(0, &[0.5, 0.5]),
            probe(1, &[0.1, 0.9]),
            probe(2, &[0.9, 0.2]),
            probe(3, &[0.6, 0.6]),
        ];

        let ranking = RankingEngine::new().rank(population, &goals);
        assert_eq!(ids(ranking.front(0)), vec![1, 2]);
        assert_eq!(ids(ranking.front(1)), vec![0]);
        assert_eq!(ids(ranking.front(2)), vec![3]);
        assert_eq!(ranking.front(2)[0].rank, 2);
    }

    #[test]
    fn test_shared_champion_appears_once() {
        let goals = [GoalId(0), GoalId(1)];
        let population = vec![probe(0, &[0.5, 0.5]), probe(1, &[0.1, 0.1])];

        let ranking = RankingEngine::new().rank(population, &goals);
        assert_eq!(ids(ranking.front(0)), vec![1]);
        assert_eq!(ids(ranking.front(1)), vec![0]);
    }

    #[test]
    fn test_empty_goal_set_gives_single_front() {
        let population = vec![probe(0, &[0.5]), probe(1, &[0.1]), probe(2, &[0.3])];
        let ranking = RankingEngine::new().rank(population, &[]);
        assert_eq!(ranking.number_of_fronts(), 1);
        assert_eq!(ids(ranking.front(0)), vec![0, 1, 2]);
    }

    #[test]
    fn test_champion_tie_prefers_non_dominated() {
        let goals = [GoalId(0), GoalId(1)];
        // Both tie on goal 0; candidate 1 is better on goal 1.
        let population = vec![probe(0, &[0.0, 0.8]), probe(1, &[0.0, 0.3])];
        let ranking = RankingEngine::new().rank(population, &goals);
        assert_eq!(ids(ranking.front(0)), vec![1]);
    }

    #[test]
    fn test_non_dominated_ties_keep_insertion_order() {
        let goals = [GoalId(0)];
        let population = vec![
            probe(0, &[0.0]),
            probe(1, &[0.4]),
            probe(2, &[0.4]),
            probe(3, &[0.4]),
        ];
        let ranking = RankingEngine::new().rank(population, &goals);
        assert_eq!(ids(ranking.front(0)), vec![0]);
        assert_eq!(ids(ranking.front(1)), vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn prop_fronts_are_mutually_non_dominated(
            rows in prop::collection::vec(prop::collection::vec(0.0f64..4.0, 3), 1..30)
        ) {
            let goals = [GoalId(0), GoalId(1), GoalId(2)];
            let population: Vec<_> = rows
                .iter()
                .enumerate()
                .map(|(i, f)| probe(i as u64, f))
                .collect();
            let total = population.len();

            let ranking = RankingEngine::new().rank(population, &goals);
            let ranked: usize = ranking.fronts().iter().map(Vec::len).sum();
            prop_assert_eq!(ranked, total);

            for front in ranking.fronts() {
                for x in front {
                    for y in front {
                        prop_assert!(!dominates(x, y, &goals));
                    }
                }
            }
        }

        #[test]
        fn prop_later_fronts_are_dominated_by_earlier(
            rows in prop::collection::vec(prop::collection::vec(0.0f64..4.0, 2), 2..25)
        ) {
            let goals = [GoalId(0), GoalId(1)];
            let population: Vec<_> = rows
                .iter()
                .enumerate()
                .map(|(i, f)| probe(i as u64, f))
                .collect();

            let ranking = RankingEngine::new().rank(population, &goals);
            for k in 2..ranking.number_of_fronts() {
                for y in ranking.front(k) {
                    prop_assert!(ranking.front(k - 1).iter().any(|x| dominates(x, y, &goals)));
                }
            }
        }
    }
}
