//! The generational search loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::schema::{
    BudgetConfig, ConfigError, DirectedMerge, SearchConfig, SearchHistory, SearchMode,
    SearchProgress, SearchStats, StopReason,
};

use super::archive::Archive;
use super::candidate::{Candidate, TestCase};
use super::clock::{Clock, Deadline, SystemClock};
use super::collaborators::{Breeder, DirectedGenerator, Evaluator, SearchObserver};
use super::diversity::DiversityAssigner;
use super::goal::{GoalId, GoalSet};
use super::goals::GoalsManager;
use super::ranking::RankingEngine;
use super::stagnation::StagnationController;

/// Search failures. All of them are contract violations by a collaborator or
/// the caller; lack of progress is never an error.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Evaluator returned {actual} fitness values for {expected} goals")]
    FitnessArity { expected: usize, actual: usize },
    #[error("Evaluator returned invalid fitness {value} for goal {goal}")]
    InvalidFitness { goal: GoalId, value: f64 },
    #[error("Breeder produced an empty initial population")]
    EmptyInitialPopulation,
}

/// Final result of a search run.
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    /// Best covering test per covered goal.
    pub archive: Archive<T>,
    /// The goal universe the archive refers to.
    pub goals: GoalSet,
    /// Last population.
    pub population: Vec<Candidate<T>>,
    /// Statistics from the run.
    pub stats: SearchStats,
}

/// Many-objective search engine with dynamic goal selection and a directed
/// fallback for stalled progress.
pub struct SearchEngine<T> {
    config: SearchConfig,
    goals: GoalsManager<T>,
    population: Vec<Candidate<T>>,
    seed_tests: Vec<T>,
    stagnation: StagnationController,
    ranking: RankingEngine,
    diversity: DiversityAssigner,
    breeder: Box<dyn Breeder<T>>,
    evaluator: Box<dyn Evaluator<T>>,
    directed: Option<Box<dyn DirectedGenerator<T>>>,
    observers: Vec<Box<dyn SearchObserver>>,
    clock: Arc<dyn Clock>,
    /// Clock reading when the current run began.
    started: std::time::Duration,
    history: SearchHistory,
    generation: usize,
    evaluations: u64,
    next_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl<T: TestCase + 'static> SearchEngine<T> {
    /// Create a new search engine.
    pub fn new(
        config: SearchConfig,
        goals: GoalSet,
        breeder: impl Breeder<T> + 'static,
        evaluator: impl Evaluator<T> + 'static,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        let stagnation = StagnationController::disabled(&config.stagnation);

        Ok(Self {
            goals: GoalsManager::new(goals),
            population: Vec::new(),
            seed_tests: Vec::new(),
            stagnation,
            ranking: RankingEngine::new(),
            diversity: DiversityAssigner::new(),
            breeder: Box::new(breeder),
            evaluator: Box::new(evaluator),
            directed: None,
            observers: Vec::new(),
            clock: Arc::new(SystemClock::new()),
            started: std::time::Duration::ZERO,
            history: SearchHistory::default(),
            generation: 0,
            evaluations: 0,
            next_id: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Attach the fallback generator used when progress stalls.
    pub fn with_directed_generator(mut self, generator: impl DirectedGenerator<T> + 'static) -> Self {
        self.directed = Some(Box::new(generator));
        self
    }

    pub fn with_observer(mut self, observer: impl SearchObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Replace the wall clock, e.g. with a manual one.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start from these tests instead of asking the breeder.
    pub fn with_initial_population(mut self, tests: Vec<T>) -> Self {
        self.seed_tests = tests;
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn goals(&self) -> &GoalsManager<T> {
        &self.goals
    }

    pub fn population(&self) -> &[Candidate<T>] {
        &self.population
    }

    /// Build and evaluate the first population, then rank it so the first
    /// breeding step has selection pressure.
    pub fn initialize(&mut self) -> Result<(), SearchError> {
        self.stagnation = if self.directed.is_some() {
            StagnationController::new(&self.config.stagnation)
        } else {
            StagnationController::disabled(&self.config.stagnation)
        };

        log::info!(
            "Initial number of goals: {} / {}",
            self.goals.current_count(),
            self.goals.uncovered_count()
        );

        if self.population.is_empty() {
            let tests = if self.seed_tests.is_empty() {
                self.breeder.initial_population(self.config.population.size)
            } else {
                std::mem::take(&mut self.seed_tests)
            };
            if tests.is_empty() {
                return Err(SearchError::EmptyInitialPopulation);
            }
            self.population = self.evaluate_batch(tests)?;
        }

        let goals = self.goals.current_goals();
        let ranking = self.ranking.rank(std::mem::take(&mut self.population), &goals);
        for mut front in ranking.into_fronts() {
            self.diversity.assign(&mut front, &goals);
            self.population.extend(front);
        }

        Ok(())
    }

    /// Evaluate tests, in parallel, then apply goal updates in input order.
    fn evaluate_batch(&mut self, tests: Vec<T>) -> Result<Vec<Candidate<T>>, SearchError> {
        let goal_set = self.goals.goal_set();
        let evaluator = &self.evaluator;
        let fitness: Vec<Vec<f64>> = tests
            .par_iter()
            .map(|test| evaluator.evaluate(test, goal_set))
            .collect();

        let expected = goal_set.len();
        let mut candidates = Vec::with_capacity(tests.len());
        for (test, fitness) in tests.into_iter().zip(fitness) {
            if fitness.len() != expected {
                return Err(SearchError::FitnessArity {
                    expected,
                    actual: fitness.len(),
                });
            }
            if let Some((goal, &value)) = fitness
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
            {
                return Err(SearchError::InvalidFitness {
                    goal: GoalId(goal),
                    value,
                });
            }

            let candidate = Candidate::new(self.next_id, test, fitness, self.generation);
            self.next_id += 1;
            self.evaluations += 1;

            let newly_covered = self.goals.update_on_evaluation(&candidate);
            if !newly_covered.is_empty() {
                log::debug!(
                    "Candidate {} covered {} new goal(s)",
                    candidate.id,
                    newly_covered.len()
                );
            }
            candidates.push(candidate);
        }

        Ok(candidates)
    }

    /// Run one generation in the given mode.
    fn evolve(&mut self, mode: SearchMode) -> Result<(), SearchError> {
        let directed = if mode == SearchMode::Directed {
            self.directed_round()?
        } else {
            Vec::new()
        };

        let previous = std::mem::take(&mut self.population);
        let (carried, parents) = if directed.is_empty() {
            (Vec::new(), previous)
        } else {
            match self.config.stagnation.directed_merge {
                // Survivors of the previous generation are dropped for this round.
                DirectedMerge::Substitute => (Vec::new(), directed),
                DirectedMerge::Retain => (previous, directed),
            }
        };

        let offspring_tests = self
            .breeder
            .breed(&parents, self.config.population.offspring());
        let offspring = self.evaluate_batch(offspring_tests)?;

        let mut union = Vec::with_capacity(carried.len() + parents.len() + offspring.len());
        union.extend(carried);
        union.extend(parents);
        union.extend(offspring);
        log::debug!("Union size = {}", union.len());

        let goals = self.goals.current_goals();
        self.population = select_population(
            &self.ranking,
            &self.diversity,
            union,
            &goals,
            self.config.population.size,
        );

        self.generation += 1;
        log::debug!("Covered goals = {}", self.goals.covered_count());
        log::debug!("Current goals = {}", self.goals.current_count());
        log::debug!("Uncovered goals = {}", self.goals.uncovered_count());

        Ok(())
    }

    /// Hand off to the directed generator. Any generator failure discards the
    /// round; candidates already evaluated keep their archive effects.
    fn directed_round(&mut self) -> Result<Vec<Candidate<T>>, SearchError> {
        let Some(mut generator) = self.directed.take() else {
            return Ok(Vec::new());
        };
        log::info!("Progress stalled, running directed generation");
        let outcome = self.run_directed_phases(generator.as_mut());
        self.directed = Some(generator);
        outcome
    }

    fn run_directed_phases(
        &mut self,
        generator: &mut dyn DirectedGenerator<T>,
    ) -> Result<Vec<Candidate<T>>, SearchError> {
        let clock = Arc::clone(&self.clock);
        let seeds = self.goals.solutions();
        log::debug!("Current solutions: {}", seeds.len());

        let round_started = clock.now();
        let trace_deadline = Deadline::after(clock.as_ref(), self.config.stagnation.trace_timeout());
        if let Err(e) = generator.collect_traces(&seeds, &trace_deadline) {
            log::warn!("Discarding directed round: {}", e);
            return Ok(Vec::new());
        }
        let traced = clock.now();

        let synthesis_deadline =
            Deadline::after(clock.as_ref(), self.config.stagnation.synthesis_timeout());
        let limit = self.config.stagnation.max_directed_tests;
        let mut produced = Vec::new();

        while limit.is_none_or(|max| produced.len() < max)
            && !synthesis_deadline.is_expired()
            && !self.budget_exhausted()
        {
            match generator.synthesize_one(&synthesis_deadline) {
                Ok(Some(test)) => {
                    let mut evaluated = self.evaluate_batch(vec![test])?;
                    produced.append(&mut evaluated);
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Discarding directed round: {}", e);
                    produced.clear();
                    break;
                }
            }
        }

        let finished = clock.now();
        log::debug!("Directed tests generated: {}", produced.len());
        log::debug!("Directed trace time: {:?}", traced.saturating_sub(round_started));
        log::debug!("Directed synthesis time: {:?}", finished.saturating_sub(traced));

        Ok(produced)
    }

    /// Coverage proxy tracked for stall detection.
    fn proxy_coverage(&self) -> usize {
        self.goals
            .covered_count_of(self.config.stagnation.tracked_kind)
    }

    /// Time spent since the current run began.
    fn elapsed(&self) -> std::time::Duration {
        self.clock.now().saturating_sub(self.started)
    }

    /// Wall-clock budget consumed or cancelled.
    fn budget_exhausted(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self
                .config
                .budget
                .time_budget()
                .is_some_and(|budget| self.elapsed() >= budget)
    }

    /// Check if the search should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.goals.uncovered_count() == 0 {
            return Some(StopReason::AllGoalsCovered);
        }

        if let Some(max) = self.config.budget.max_generations
            && self.generation >= max
        {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(budget) = self.config.budget.time_budget()
            && self.elapsed() >= budget
        {
            return Some(StopReason::TimeBudget);
        }

        None
    }

    /// Get current progress.
    pub fn progress(&self) -> SearchProgress {
        SearchProgress {
            generation: self.generation,
            covered_goals: self.goals.covered_count(),
            current_goals: self.goals.current_count(),
            uncovered_goals: self.goals.uncovered_count(),
            total_goals: self.goals.goal_set().len(),
            elapsed_seconds: self.elapsed().as_secs_f64(),
            stall_count: self.stagnation.stall_count(),
            stall_threshold: self.stagnation.threshold(),
            directed_rounds: self.stagnation.directed_rounds(),
            improving_directed_rounds: self.stagnation.improving_rounds(),
            mode: self.stagnation.mode(),
            population_size: self.population.len(),
        }
    }

    /// Run the search with progress callback.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<SearchResult<T>, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        self.started = self.clock.now();
        self.initialize()?;
        callback(&self.progress());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            let before = self.proxy_coverage();
            let mode = self.stagnation.begin_generation();
            self.evolve(mode)?;
            let after = self.proxy_coverage();
            self.stagnation.end_generation(before, after);

            if mode == SearchMode::Directed {
                log::debug!("Directed round coverage: {} -> {}", before, after);
                self.history.directed_generations.push(self.generation - 1);
            }
            self.history.covered_goals.push(self.goals.covered_count());
            self.history.current_goals.push(self.goals.current_count());
            self.history.proxy_coverage.push(after);

            let progress = self.progress();
            callback(&progress);
            for observer in &mut self.observers {
                observer.on_iteration_complete(&progress);
            }
        };

        let stats = SearchStats {
            generations: self.generation,
            evaluations: self.evaluations,
            covered_goals: self.goals.covered_count(),
            total_goals: self.goals.goal_set().len(),
            elapsed_seconds: self.elapsed().as_secs_f64(),
            directed_rounds: self.stagnation.directed_rounds(),
            improving_directed_rounds: self.stagnation.improving_rounds(),
            stop_reason,
            history: self.history.clone(),
        };
        log::info!(
            "Search finished after {} generations: {}/{} goals covered ({:?})",
            stats.generations,
            stats.covered_goals,
            stats.total_goals,
            stats.stop_reason
        );
        for observer in &mut self.observers {
            observer.on_search_finished(&stats);
        }

        Ok(SearchResult {
            archive: self.goals.archive().clone(),
            goals: self.goals.goal_set().clone(),
            population: self.population.clone(),
            stats,
        })
    }

    /// Run the search (blocking).
    pub fn run(&mut self) -> Result<SearchResult<T>, SearchError> {
        self.run_with_callback(|_| {})
    }
}

/// Build the next population from a ranked union.
///
/// Fronts are taken whole while they fit; capacity is `max(size, |front 0|)`
/// so front 0 is never truncated. The first front that does not fit
/// contributes its most diverse members.
pub fn select_population<T: TestCase>(
    ranking: &RankingEngine,
    diversity: &DiversityAssigner,
    union: Vec<Candidate<T>>,
    goals: &[GoalId],
    size: usize,
) -> Vec<Candidate<T>> {
    let fronts = ranking.rank(union, goals).into_fronts();
    fill_from_fronts(diversity, fronts, goals, size)
}

fn fill_from_fronts<T: TestCase>(
    diversity: &DiversityAssigner,
    fronts: Vec<Vec<Candidate<T>>>,
    goals: &[GoalId],
    size: usize,
) -> Vec<Candidate<T>> {
    let mut remain = size.max(fronts.first().map_or(0, Vec::len));
    let mut next = Vec::with_capacity(remain);

    for mut front in fronts {
        if remain == 0 || front.is_empty() {
            break;
        }
        diversity.assign(&mut front, goals);
        if front.len() <= remain {
            remain -= front.len();
            next.extend(front);
        } else {
            diversity.sort_by_diversity(&mut front);
            next.extend(front.into_iter().take(remain));
            break;
        }
    }

    next
}

/// Run a complete search and return the final archive.
pub fn run_search<T, B, E>(
    initial_population: Vec<T>,
    goals: GoalSet,
    budget: BudgetConfig,
    breeder: B,
    evaluator: E,
) -> Result<Archive<T>, SearchError>
where
    T: TestCase + 'static,
    B: Breeder<T> + 'static,
    E: Evaluator<T> + 'static,
{
    let config = SearchConfig {
        budget,
        ..Default::default()
    };
    let mut engine = SearchEngine::new(config, goals, breeder, evaluator)?
        .with_initial_population(initial_population);
    Ok(engine.run()?.archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PopulationConfig, StagnationConfig};
    use crate::search::candidate::testing::probe;
    use crate::search::clock::ManualClock;
    use crate::search::collaborators::GeneratorError;
    use crate::search::goal::GoalKind;
    use rand::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// An integer test input.
    #[derive(Debug, Clone, PartialEq)]
    struct Num(i64);

    impl TestCase for Num {
        fn size(&self) -> usize {
            1
        }
    }

    /// Goals "x >= 10k" for k = 1..=levels, each depending on the previous,
    /// plus an optional "x == target" goal depending on the first one.
    fn ladder(levels: usize, target: Option<i64>) -> (GoalSet, Vec<i64>) {
        let mut builder = GoalSet::builder();
        let mut thresholds = Vec::new();
        let mut previous: Option<GoalId> = None;
        for k in 1..=levels {
            let deps = previous.into_iter().collect();
            previous = Some(builder.add(GoalKind::Line, format!("x >= {}", 10 * k), deps));
            thresholds.push(10 * k as i64);
        }
        if target.is_some() {
            builder.add(GoalKind::Branch, "x == target", vec![GoalId(0)]);
        }
        (builder.build().unwrap(), thresholds)
    }

    struct LadderEvaluator {
        thresholds: Vec<i64>,
        target: Option<i64>,
    }

    impl Evaluator<Num> for LadderEvaluator {
        fn evaluate(&self, test: &Num, _goals: &GoalSet) -> Vec<f64> {
            let norm = |d: f64| d / (d + 1.0);
            let mut fitness: Vec<f64> = self
                .thresholds
                .iter()
                .map(|&t| norm((t - test.0).max(0) as f64))
                .collect();
            if let Some(target) = self.target {
                fitness.push(norm((target - test.0).abs() as f64));
            }
            fitness
        }
    }

    /// Small random steps around the parents.
    struct StepBreeder {
        rng: StdRng,
        parents_seen: Rc<RefCell<Vec<Vec<u64>>>>,
        clock: Option<Arc<ManualClock>>,
    }

    impl StepBreeder {
        fn new() -> Self {
            Self {
                rng: StdRng::seed_from_u64(42),
                parents_seen: Rc::default(),
                clock: None,
            }
        }
    }

    impl Breeder<Num> for StepBreeder {
        fn initial_population(&mut self, size: usize) -> Vec<Num> {
            (0..size).map(|_| Num(self.rng.gen_range(0..5))).collect()
        }

        fn breed(&mut self, parents: &[Candidate<Num>], count: usize) -> Vec<Num> {
            self.parents_seen
                .borrow_mut()
                .push(parents.iter().map(|p| p.id).collect());
            if let Some(clock) = &self.clock {
                clock.advance(Duration::from_millis(10));
            }
            (0..count)
                .map(|_| {
                    let parent = &parents[self.rng.gen_range(0..parents.len())];
                    Num(parent.test.0 + self.rng.gen_range(-1..=3))
                })
                .collect()
        }
    }

    /// Directed generator scripted with a fixed answer.
    struct Scripted {
        answers: Vec<Result<Option<Num>, GeneratorError>>,
        fail_traces: bool,
        traced_seeds: Arc<Mutex<Vec<usize>>>,
    }

    impl Scripted {
        fn answering(answers: Vec<Result<Option<Num>, GeneratorError>>) -> Self {
            Self {
                answers,
                fail_traces: false,
                traced_seeds: Arc::default(),
            }
        }
    }

    impl DirectedGenerator<Num> for Scripted {
        fn collect_traces(
            &mut self,
            seeds: &[Candidate<Num>],
            _deadline: &Deadline<'_>,
        ) -> Result<(), GeneratorError> {
            self.traced_seeds.lock().unwrap().push(seeds.len());
            if self.fail_traces {
                return Err(GeneratorError::TraceCollection("boom".into()));
            }
            Ok(())
        }

        fn synthesize_one(&mut self, _deadline: &Deadline<'_>) -> Result<Option<Num>, GeneratorError> {
            if self.answers.is_empty() {
                Ok(None)
            } else {
                self.answers.remove(0)
            }
        }
    }

    fn config(size: usize, generations: usize, threshold: usize) -> SearchConfig {
        SearchConfig {
            population: PopulationConfig {
                size,
                offspring_size: None,
            },
            budget: BudgetConfig {
                max_generations: Some(generations),
                time_budget_ms: None,
            },
            stagnation: StagnationConfig {
                initial_stall_threshold: threshold,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_search_covers_dependency_ladder() {
        let (goals, thresholds) = ladder(4, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let mut engine =
            SearchEngine::new(config(10, 500, 32), goals, StepBreeder::new(), evaluator).unwrap();

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::AllGoalsCovered);
        assert_eq!(result.archive.len(), 4);
        for (goal, candidate) in result.archive.iter() {
            assert_eq!(candidate.fitness_for(goal), 0.0);
        }
        let history = &result.stats.history.covered_goals;
        assert!(history.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_stall_triggers_directed_round() {
        let target = 1_000_000;
        let (goals, thresholds) = ladder(1, Some(target));
        let evaluator = LadderEvaluator {
            thresholds,
            target: Some(target),
        };
        let generator = Scripted::answering(vec![Ok(Some(Num(target)))]);
        let traced = Arc::clone(&generator.traced_seeds);

        // Num(10) covers the root at once, so the only archived seed is known.
        let mut engine = SearchEngine::new(config(6, 200, 3), goals, StepBreeder::new(), evaluator)
            .unwrap()
            .with_initial_population(vec![Num(10), Num(0), Num(1), Num(2), Num(3), Num(4)])
            .with_directed_generator(generator);
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::AllGoalsCovered);
        assert_eq!(result.stats.directed_rounds, 1);
        assert_eq!(result.stats.improving_directed_rounds, 1);
        assert_eq!(result.stats.history.directed_generations.len(), 1);
        assert_eq!(traced.lock().unwrap().as_slice(), &[1]);
    }

    #[test]
    fn test_failing_generator_is_recovered() {
        let target = 1_000_000;
        let (goals, thresholds) = ladder(1, Some(target));
        let evaluator = LadderEvaluator {
            thresholds,
            target: Some(target),
        };
        let mut generator = Scripted::answering(Vec::new());
        generator.fail_traces = true;

        let mut engine = SearchEngine::new(config(6, 40, 3), goals, StepBreeder::new(), evaluator)
            .unwrap()
            .with_initial_population(vec![Num(10), Num(0), Num(1), Num(2), Num(3), Num(4)])
            .with_directed_generator(generator);
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert!(result.stats.directed_rounds >= 1);
        assert_eq!(result.stats.improving_directed_rounds, 0);
        assert_eq!(result.population.len(), 6);
    }

    #[test]
    fn test_synthesis_error_discards_round() {
        let target = 1_000_000;
        let (goals, thresholds) = ladder(1, Some(target));
        let evaluator = LadderEvaluator {
            thresholds,
            target: Some(target),
        };
        let generator = Scripted::answering(vec![
            Ok(Some(Num(7))),
            Err(GeneratorError::Synthesis("solver crashed".into())),
        ]);

        let mut engine = SearchEngine::new(config(4, 10, 3), goals, StepBreeder::new(), evaluator)
            .unwrap()
            .with_directed_generator(generator);
        engine.initialize().unwrap();
        let before: Vec<u64> = engine.population().iter().map(|c| c.id).collect();

        let directed = engine.directed_round().unwrap();
        assert!(directed.is_empty());
        // The population is untouched by a discarded round.
        let after: Vec<u64> = engine.population().iter().map(|c| c.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_directed_candidates_substitute_population() {
        let (goals, thresholds) = ladder(3, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let breeder = StepBreeder::new();
        let parents_seen = Rc::clone(&breeder.parents_seen);
        let generator = Scripted::answering(vec![Ok(Some(Num(1))), Ok(Some(Num(2)))]);

        let mut engine = SearchEngine::new(config(5, 10, 3), goals, breeder, evaluator)
            .unwrap()
            .with_directed_generator(generator);
        engine.initialize().unwrap();
        let previous: Vec<u64> = engine.population().iter().map(|c| c.id).collect();

        engine.evolve(SearchMode::Directed).unwrap();

        // Directed tests were the breeding parents...
        let parents = parents_seen.borrow().last().cloned().unwrap();
        assert_eq!(parents.len(), 2);
        assert!(parents.iter().all(|id| !previous.contains(id)));
        // ...and the previous survivors were left out of the union entirely.
        assert!(engine.population().iter().all(|c| !previous.contains(&c.id)));
    }

    #[test]
    fn test_retain_merge_keeps_previous_survivors_in_union() {
        let (goals, thresholds) = ladder(3, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let mut cfg = config(5, 10, 3);
        cfg.stagnation.directed_merge = DirectedMerge::Retain;
        // Two tests far below every threshold; the best survivor stays a champion.
        let generator = Scripted::answering(vec![Ok(Some(Num(-500))), Ok(Some(Num(-400)))]);

        let mut engine = SearchEngine::new(cfg, goals, StepBreeder::new(), evaluator)
            .unwrap()
            .with_initial_population(vec![Num(25), Num(0), Num(1), Num(2), Num(3)])
            .with_directed_generator(generator);
        engine.initialize().unwrap();
        // Num(25) is the sole champion of the open "x >= 30" goal.
        assert_eq!(engine.goals().current_goals(), vec![GoalId(2)]);
        assert_eq!(engine.population()[0].id, 0);

        engine.evolve(SearchMode::Directed).unwrap();
        assert!(engine.population().iter().any(|c| c.id == 0));
    }

    #[test]
    fn test_empty_directed_round_behaves_evolutionary() {
        let (goals, thresholds) = ladder(2, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let breeder = StepBreeder::new();
        let parents_seen = Rc::clone(&breeder.parents_seen);

        let mut engine = SearchEngine::new(config(4, 10, 3), goals, breeder, evaluator)
            .unwrap()
            .with_directed_generator(Scripted::answering(Vec::new()));
        engine.initialize().unwrap();
        let previous: Vec<u64> = engine.population().iter().map(|c| c.id).collect();

        engine.evolve(SearchMode::Directed).unwrap();
        assert_eq!(parents_seen.borrow().last().cloned().unwrap(), previous);
    }

    #[test]
    fn test_front_zero_never_truncated() {
        let goals: Vec<GoalId> = (0..6).map(GoalId).collect();
        let front0: Vec<_> = (0..6)
            .map(|i| {
                let mut f = vec![1.0; 6];
                f[i] = 0.0;
                probe(i as u64, &f)
            })
            .collect();
        let front1 = vec![probe(10, &[2.0; 6])];

        let next = fill_from_fronts(&DiversityAssigner::new(), vec![front0, front1], &goals, 3);
        assert_eq!(next.len(), 6);
        assert!(next.iter().all(|c| c.id < 6));
    }

    #[test]
    fn test_partial_front_filled_by_diversity() {
        let goals = [GoalId(0)];
        let front = |base: u64, n: usize| -> Vec<Candidate<_>> {
            (0..n)
                .map(|i| probe(base + i as u64, &[base as f64 + i as f64 * i as f64]))
                .collect()
        };
        // Fronts of sizes 4, 5 and 6 with capacity 8.
        let fronts = vec![front(0, 4), front(10, 5), front(20, 6)];

        let next = fill_from_fronts(&DiversityAssigner::new(), fronts, &goals, 8);
        assert_eq!(next.len(), 8);
        let ids: Vec<u64> = next.iter().map(|c| c.id).collect();
        assert_eq!(&ids[..4], &[0, 1, 2, 3]);
        // Second front values 10, 11, 14, 19, 26 over a range of 16: the
        // boundaries first, then 19 (12/16) and 14 (8/16); 11 (4/16) is cut.
        assert_eq!(&ids[4..], &[10, 14, 13, 12]);
        assert!(next.iter().all(|c| c.id < 20));
    }

    #[test]
    fn test_cancelled_before_start() {
        let (goals, thresholds) = ladder(2, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let mut engine =
            SearchEngine::new(config(4, 100, 32), goals, StepBreeder::new(), evaluator).unwrap();
        engine.cancel_handle().store(true, Ordering::Relaxed);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_time_budget_with_manual_clock() {
        let (goals, thresholds) = ladder(1, Some(1_000_000));
        let evaluator = LadderEvaluator {
            thresholds,
            target: Some(1_000_000),
        };
        let clock = Arc::new(ManualClock::new());
        let mut breeder = StepBreeder::new();
        breeder.clock = Some(Arc::clone(&clock));

        let mut cfg = config(4, 0, 32);
        cfg.budget = BudgetConfig {
            max_generations: None,
            time_budget_ms: Some(100),
        };
        let mut engine = SearchEngine::new(cfg, goals, breeder, evaluator)
            .unwrap()
            .with_clock(clock);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::TimeBudget);
        assert_eq!(result.stats.generations, 10);
    }

    #[test]
    fn test_time_budget_counts_from_run_start() {
        let target = 1_000_000;
        let (goals, thresholds) = ladder(1, Some(target));
        let evaluator = LadderEvaluator {
            thresholds,
            target: Some(target),
        };
        let clock = Arc::new(ManualClock::new());
        clock.advance(Duration::from_secs(120));

        let mut cfg = config(6, 200, 2);
        cfg.budget.time_budget_ms = Some(60_000);
        let mut engine = SearchEngine::new(cfg, goals, StepBreeder::new(), evaluator)
            .unwrap()
            .with_clock(clock)
            .with_initial_population(vec![Num(10), Num(0), Num(1), Num(2), Num(3), Num(4)])
            .with_directed_generator(Scripted::answering(vec![Ok(Some(Num(target)))]));

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::AllGoalsCovered);
        assert_eq!(result.stats.improving_directed_rounds, 1);
        assert_eq!(result.stats.elapsed_seconds, 0.0);
        assert_eq!(engine.progress().elapsed_seconds, 0.0);
    }

    #[test]
    fn test_observers_are_notified() {
        #[derive(Default)]
        struct Counting {
            iterations: Arc<Mutex<usize>>,
            finished: Arc<Mutex<bool>>,
        }

        impl SearchObserver for Counting {
            fn on_iteration_complete(&mut self, _progress: &SearchProgress) {
                *self.iterations.lock().unwrap() += 1;
            }

            fn on_search_finished(&mut self, _stats: &SearchStats) {
                *self.finished.lock().unwrap() = true;
            }
        }

        let observer = Counting::default();
        let iterations = Arc::clone(&observer.iterations);
        let finished = Arc::clone(&observer.finished);

        let (goals, thresholds) = ladder(1, Some(1_000_000));
        let evaluator = LadderEvaluator {
            thresholds,
            target: Some(1_000_000),
        };
        let mut engine = SearchEngine::new(config(4, 7, 32), goals, StepBreeder::new(), evaluator)
            .unwrap()
            .with_observer(observer);

        let mut callbacks = 0;
        let result = engine.run_with_callback(|_| callbacks += 1).unwrap();
        assert_eq!(result.stats.generations, 7);
        assert_eq!(*iterations.lock().unwrap(), 7);
        assert_eq!(callbacks, 8);
        assert!(*finished.lock().unwrap());
    }

    #[test]
    fn test_wrong_fitness_arity_is_an_error() {
        struct Short;
        impl Evaluator<Num> for Short {
            fn evaluate(&self, _test: &Num, _goals: &GoalSet) -> Vec<f64> {
                vec![0.5]
            }
        }

        let (goals, _) = ladder(3, None);
        let mut engine = SearchEngine::new(config(4, 5, 32), goals, StepBreeder::new(), Short).unwrap();
        assert!(matches!(
            engine.run(),
            Err(SearchError::FitnessArity {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_negative_fitness_is_an_error() {
        struct Negative;
        impl Evaluator<Num> for Negative {
            fn evaluate(&self, _test: &Num, _goals: &GoalSet) -> Vec<f64> {
                vec![-1.0]
            }
        }

        let (goals, _) = ladder(1, None);
        let mut engine =
            SearchEngine::new(config(4, 5, 32), goals, StepBreeder::new(), Negative).unwrap();
        assert!(matches!(engine.run(), Err(SearchError::InvalidFitness { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (goals, thresholds) = ladder(1, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let cfg = config(0, 5, 32);
        assert!(matches!(
            SearchEngine::new(cfg, goals, StepBreeder::new(), evaluator),
            Err(SearchError::Config(ConfigError::EmptyPopulation))
        ));
    }

    #[test]
    fn test_run_search_returns_archive() {
        let (goals, thresholds) = ladder(2, None);
        let evaluator = LadderEvaluator {
            thresholds,
            target: None,
        };
        let budget = BudgetConfig {
            max_generations: Some(300),
            time_budget_ms: None,
        };
        let archive = run_search(vec![Num(0); 5], goals, budget, StepBreeder::new(), evaluator).unwrap();
        assert_eq!(archive.len(), 2);
    }
}
