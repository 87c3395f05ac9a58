//! Tournament breeding over ranked, diversity-scored parents.

use rand::prelude::*;

use crate::schema::BreedingConfig;

use super::candidate::Candidate;
use super::collaborators::Breeder;

/// Problem-specific variation operators.
pub trait Variation<T> {
    /// A fresh random test.
    fn random(&self, rng: &mut StdRng) -> T;

    /// Recombine two parents into two children.
    fn crossover(&self, first: &T, second: &T, rng: &mut StdRng) -> (T, T);

    /// Mutate a test in place.
    fn mutate(&self, test: &mut T, rng: &mut StdRng);
}

/// Binary-tournament breeder: lower rank wins, higher diversity breaks ties.
pub struct TournamentBreeder<V> {
    variation: V,
    config: BreedingConfig,
    rng: StdRng,
}

impl<V> TournamentBreeder<V> {
    /// Create from seed.
    pub fn new(variation: V, config: BreedingConfig, seed: u64) -> Self {
        Self {
            variation,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn from_entropy(variation: V, config: BreedingConfig) -> Self {
        Self {
            variation,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Select a parent index by tournament.
    fn select_index<T>(&mut self, parents: &[Candidate<T>]) -> usize {
        let mut best = self.rng.gen_range(0..parents.len());
        for _ in 1..self.config.tournament_size {
            let challenger = self.rng.gen_range(0..parents.len());
            if is_better(&parents[challenger], &parents[best]) {
                best = challenger;
            }
        }
        best
    }
}

/// Crowded comparison: lower front first, then larger diversity.
fn is_better<T>(a: &Candidate<T>, b: &Candidate<T>) -> bool {
    a.rank < b.rank || (a.rank == b.rank && a.diversity > b.diversity)
}

impl<T, V> Breeder<T> for TournamentBreeder<V>
where
    T: Clone,
    V: Variation<T>,
{
    fn initial_population(&mut self, size: usize) -> Vec<T> {
        (0..size)
            .map(|_| self.variation.random(&mut self.rng))
            .collect()
    }

    fn breed(&mut self, parents: &[Candidate<T>], count: usize) -> Vec<T> {
        let mut offspring = Vec::with_capacity(count + 1);
        if parents.is_empty() {
            return offspring;
        }

        while offspring.len() < count {
            let first = self.select_index(parents);
            let second = self.select_index(parents);

            let (mut a, mut b) = if self.rng.gen_bool(self.config.crossover_rate) {
                self.variation.crossover(
                    &parents[first].test,
                    &parents[second].test,
                    &mut self.rng,
                )
            } else {
                (
                    parents[first].test.as_ref().clone(),
                    parents[second].test.as_ref().clone(),
                )
            };

            if self.rng.gen_bool(self.config.mutation_rate) {
                self.variation.mutate(&mut a, &mut self.rng);
            }
            if self.rng.gen_bool(self.config.mutation_rate) {
                self.variation.mutate(&mut b, &mut self.rng);
            }

            offspring.push(a);
            if offspring.len() < count {
                offspring.push(b);
            }
        }

        offspring
    }
}
