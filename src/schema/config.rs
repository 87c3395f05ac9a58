//! Configuration types for the many-objective coverage search.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::search::GoalKind;

/// Top-level configuration for a search run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Population and offspring sizes.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Termination budget.
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Stall detection and the directed-generation fallback.
    #[serde(default)]
    pub stagnation: StagnationConfig,
    /// Parameters for the built-in tournament breeder.
    #[serde(default)]
    pub breeding: BreedingConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Nominal population capacity.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Offspring bred per generation (None = population size).
    #[serde(default)]
    pub offspring_size: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            offspring_size: None,
        }
    }
}

impl PopulationConfig {
    /// Offspring count actually used.
    pub fn offspring(&self) -> usize {
        self.offspring_size.unwrap_or(self.size)
    }
}

fn default_population_size() -> usize {
    50
}

/// Global termination budget. The search also stops once every goal is covered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum number of generations.
    #[serde(default)]
    pub max_generations: Option<usize>,
    /// Wall-clock budget in milliseconds.
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: Option<u64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_generations: None,
            time_budget_ms: default_time_budget_ms(),
        }
    }
}

impl BudgetConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

fn default_time_budget_ms() -> Option<u64> {
    Some(60_000)
}

/// How directed candidates enter the union of the generation they were
/// produced in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DirectedMerge {
    /// Directed candidates replace the surviving population in the union.
    #[default]
    Substitute,
    /// Directed candidates are added next to the surviving population.
    Retain,
}

/// Stall detection and directed-generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagnationConfig {
    /// Whether stalls may trigger directed rounds at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Stalled generations tolerated before the first directed round.
    #[serde(default = "default_stall_threshold")]
    pub initial_stall_threshold: usize,
    /// Tests synthesized per directed round (None = until the generator or
    /// the budget runs out).
    #[serde(default = "default_max_directed_tests")]
    pub max_directed_tests: Option<usize>,
    /// Trace collection budget in milliseconds.
    #[serde(default = "default_phase_timeout_ms")]
    pub trace_timeout_ms: u64,
    /// Synthesis budget in milliseconds.
    #[serde(default = "default_phase_timeout_ms")]
    pub synthesis_timeout_ms: u64,
    /// Union policy for directed candidates.
    #[serde(default)]
    pub directed_merge: DirectedMerge,
    /// Goal kind whose coverage is the progress proxy (None = all goals).
    #[serde(default)]
    pub tracked_kind: Option<GoalKind>,
}

impl Default for StagnationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            initial_stall_threshold: default_stall_threshold(),
            max_directed_tests: default_max_directed_tests(),
            trace_timeout_ms: default_phase_timeout_ms(),
            synthesis_timeout_ms: default_phase_timeout_ms(),
            directed_merge: DirectedMerge::default(),
            tracked_kind: None,
        }
    }
}

impl StagnationConfig {
    pub fn trace_timeout(&self) -> Duration {
        Duration::from_millis(self.trace_timeout_ms)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }
}

fn default_enabled() -> bool {
    true
}
fn default_stall_threshold() -> usize {
    32
}
fn default_max_directed_tests() -> Option<usize> {
    Some(5)
}
fn default_phase_timeout_ms() -> u64 {
    5_000
}

/// Tournament breeder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreedingConfig {
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability that an offspring is mutated (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Tournament size for parent selection.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
}

impl Default for BreedingConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            tournament_size: default_tournament_size(),
        }
    }
}

fn default_crossover_rate() -> f64 {
    0.75
}
fn default_mutation_rate() -> f64 {
    0.8
}
fn default_tournament_size() -> usize {
    2
}

/// Search configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 1")]
    EmptyPopulation,
    #[error("Offspring size must be at least 1")]
    NoOffspring,
    #[error("No termination budget: set max_generations or time_budget_ms")]
    Unbounded,
    #[error("Tournament size must be at least 1")]
    InvalidTournament,
    #[error("Invalid probability for {name}: {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Directed rounds need max_directed_tests > 0 or unbounded")]
    NoDirectedTests,
}

impl SearchConfig {
    /// Validate search configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.population.offspring() == 0 {
            return Err(ConfigError::NoOffspring);
        }
        if self.budget.max_generations.is_none() && self.budget.time_budget_ms.is_none() {
            return Err(ConfigError::Unbounded);
        }
        if self.breeding.tournament_size == 0 {
            return Err(ConfigError::InvalidTournament);
        }

        let check_rate = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate { name, value })
            }
        };
        check_rate(self.breeding.crossover_rate, "crossover_rate")?;
        check_rate(self.breeding.mutation_rate, "mutation_rate")?;

        if self.stagnation.enabled && self.stagnation.max_directed_tests == Some(0) {
            return Err(ConfigError::NoDirectedTests);
        }

        Ok(())
    }
}
