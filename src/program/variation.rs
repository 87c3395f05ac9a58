//! Variation operators for integer input vectors.

use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::schema::InputVector;
use crate::search::Variation;

/// Random inputs, uniform crossover and Gaussian mutation within bounds.
#[derive(Debug, Clone)]
pub struct InputVariation {
    inputs: usize,
    bounds: (i64, i64),
    /// Coarse mutation step as a fraction of the bounds width.
    strength: f64,
    /// Standard deviation of the fine mutation step.
    fine_step: f64,
    /// Probability that a mutated input is reset to zero (if in bounds).
    zero_rate: f64,
}

impl InputVariation {
    pub fn new(inputs: usize, bounds: (i64, i64)) -> Self {
        Self {
            inputs,
            bounds,
            strength: 0.1,
            fine_step: 2.0,
            zero_rate: 0.05,
        }
    }

    fn clamp(&self, value: f64) -> i64 {
        let (min, max) = self.bounds;
        (value.round() as i64).clamp(min, max)
    }

    /// Gaussian step, coarse or fine with equal odds.
    fn gaussian_mutate(&self, value: i64, rng: &mut StdRng) -> i64 {
        let noise: f64 = rng.sample(StandardNormal);
        let width = self.bounds.1 as f64 - self.bounds.0 as f64;
        let scale = if rng.gen_bool(0.5) {
            self.strength * width
        } else {
            self.fine_step
        };
        let mutated = self.clamp(value as f64 + noise * scale.max(1.0));
        if mutated != value {
            return mutated;
        }

        // A mutated input always moves, unless the bounds pin it.
        let (min, max) = self.bounds;
        if value >= max {
            (value - 1).max(min)
        } else if value <= min || rng.gen_bool(0.5) {
            value + 1
        } else {
            value - 1
        }
    }
}

impl Variation<InputVector> for InputVariation {
    fn random(&self, rng: &mut StdRng) -> InputVector {
        InputVector(
            (0..self.inputs)
                .map(|_| rng.gen_range(self.bounds.0..=self.bounds.1))
                .collect(),
        )
    }

    fn crossover(
        &self,
        first: &InputVector,
        second: &InputVector,
        rng: &mut StdRng,
    ) -> (InputVector, InputVector) {
        let mut a = Vec::with_capacity(self.inputs);
        let mut b = Vec::with_capacity(self.inputs);
        for var in 0..self.inputs {
            let (x, y) = (first.get(var), second.get(var));
            if rng.gen_bool(0.5) {
                a.push(x);
                b.push(y);
            } else {
                a.push(y);
                b.push(x);
            }
        }
        (InputVector(a), InputVector(b))
    }

    fn mutate(&self, test: &mut InputVector, rng: &mut StdRng) {
        test.0.resize(self.inputs, 0);
        if test.0.is_empty() {
            return;
        }

        let rate = 1.0 / test.0.len() as f64;
        let forced = rng.gen_range(0..test.0.len());
        for var in 0..test.0.len() {
            if var != forced && !rng.gen_bool(rate) {
                continue;
            }
            let value = test.0[var];
            let zeroable = value != 0 && (self.bounds.0..=self.bounds.1).contains(&0);
            test.0[var] = if zeroable && rng.gen_bool(self.zero_rate) {
                0
            } else {
                self.gaussian_mutate(value, rng)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_within_bounds() {
        let variation = InputVariation::new(4, (-5, 5));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let input = variation.random(&mut rng);
            assert_eq!(input.0.len(), 4);
            assert!(input.0.iter().all(|v| (-5..=5).contains(v)));
        }
    }

    #[test]
    fn test_uniform_crossover_preserves_genes() {
        let variation = InputVariation::new(3, (-100, 100));
        let mut rng = StdRng::seed_from_u64(7);
        let first = InputVector(vec![1, 2, 3]);
        let second = InputVector(vec![-1, -2, -3]);

        let (a, b) = variation.crossover(&first, &second, &mut rng);
        for var in 0..3 {
            let mut pair = [a.0[var], b.0[var]];
            pair.sort();
            let mut expected = [first.0[var], second.0[var]];
            expected.sort();
            assert_eq!(pair, expected);
        }
    }

    #[test]
    fn test_mutation_changes_and_clamps() {
        let variation = InputVariation::new(2, (0, 10));
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let mut input = InputVector(vec![10, 0]);
            variation.mutate(&mut input, &mut rng);
            assert_ne!(input, InputVector(vec![10, 0]));
            assert!(input.0.iter().all(|v| (0..=10).contains(v)));
        }
    }

    #[test]
    fn test_mutation_repairs_length() {
        let variation = InputVariation::new(3, (-10, 10));
        let mut rng = StdRng::seed_from_u64(5);
        let mut input = InputVector(vec![4]);
        variation.mutate(&mut input, &mut rng);
        assert_eq!(input.0.len(), 3);
    }
}
