//! DynaMOSA - Many-objective search-based test generation.
//!
//! This crate implements a many-objective genetic search for coverage
//! goals. Goals are released into the search only once their control
//! dependencies are covered, the smallest covering test per goal is archived,
//! and a pluggable directed generator takes over when evolution stalls.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Configuration, progress reporting and problem definition types
//! - `search`: The search core (goals, ranking, diversity, stagnation, engine)
//! - `program`: A reference problem of branching programs over integer
//!   inputs, with an evaluator, variation operators and a path solver
//!
//! # Example
//!
//! ```rust,no_run
//! use dynamosa::search::{Evaluator, GoalKind, GoalSet, TestCase, run_search};
//! use dynamosa::search::{Candidate, Breeder};
//! use dynamosa::schema::BudgetConfig;
//!
//! #[derive(Clone)]
//! struct Input(i64);
//!
//! impl TestCase for Input {
//!     fn size(&self) -> usize {
//!         1
//!     }
//! }
//!
//! struct Reach;
//!
//! impl Evaluator<Input> for Reach {
//!     fn evaluate(&self, test: &Input, _goals: &GoalSet) -> Vec<f64> {
//!         let d = (100 - test.0).max(0) as f64;
//!         vec![d / (d + 1.0)]
//!     }
//! }
//!
//! struct Step;
//!
//! impl Breeder<Input> for Step {
//!     fn initial_population(&mut self, size: usize) -> Vec<Input> {
//!         (0..size as i64).map(Input).collect()
//!     }
//!
//!     fn breed(&mut self, parents: &[Candidate<Input>], count: usize) -> Vec<Input> {
//!         parents.iter().cycle().take(count).map(|p| Input(p.test.0 + 7)).collect()
//!     }
//! }
//!
//! let mut goals = GoalSet::builder();
//! goals.add(GoalKind::Line, "x >= 100", vec![]);
//!
//! let budget = BudgetConfig { max_generations: Some(100), time_budget_ms: None };
//! let archive = run_search(Vec::new(), goals.build().unwrap(), budget, Step, Reach).unwrap();
//! println!("Covered goals: {}", archive.len());
//! ```

pub mod program;
pub mod schema;
pub mod search;

// Re-export commonly used types
pub use program::{CompiledProgram, InputVariation, PathSolver, ProgramEvaluator};
pub use schema::{BranchProgram, InputVector, ProblemFile, SearchConfig, SearchStats};
pub use search::{SearchEngine, SearchError, SearchResult};
