//! Many-objective coverage search.
//!
//! Every coverage goal of a program under test is a separate objective with a
//! fitness value per test (0 means covered). The search only optimizes the
//! goals whose predecessors are already covered, keeps the smallest covering
//! test per goal in an archive, and hands off to a directed generator when
//! evolutionary progress stalls.
//!
//! # Overview
//!
//! - **Goals** (`goal`, `goals`): goal universe, dependencies and the active frontier
//! - **Ranking** (`ranking`, `diversity`): preference sorting, non-dominated
//!   fronts and crowding distance
//! - **Stagnation** (`stagnation`): stall counter with an adaptive threshold
//! - **Engine** (`engine`): the generational loop tying it all together
//! - **Collaborators** (`collaborators`, `breeding`): breeder, evaluator,
//!   directed generator and observer seams
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dynamosa::program::{InputVariation, PathSolver, ProgramEvaluator};
//! use dynamosa::schema::ProblemFile;
//! use dynamosa::search::{SearchEngine, TournamentBreeder};
//!
//! let problem = ProblemFile::example();
//! let program = Arc::new(problem.program.compile().unwrap());
//! let config = problem.config;
//!
//! let breeder = TournamentBreeder::new(
//!     InputVariation::new(program.inputs(), program.bounds()),
//!     config.breeding.clone(),
//!     42,
//! );
//! let evaluator = ProgramEvaluator::new(Arc::clone(&program));
//! let mut engine = SearchEngine::new(config, program.goals().clone(), breeder, evaluator)
//!     .unwrap()
//!     .with_directed_generator(PathSolver::new(Arc::clone(&program)));
//!
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: {}/{} goals covered",
//!         progress.generation, progress.covered_goals, progress.total_goals);
//! }).unwrap();
//! println!("Archive size: {}", result.archive.len());
//! ```

mod archive;
mod breeding;
mod candidate;
mod clock;
mod collaborators;
mod diversity;
mod engine;
mod goal;
mod goals;
mod ranking;
mod stagnation;

pub use archive::{Archive, ArchiveExport, ArchiveUpdate, ArchivedGoal, load_archive_export};
pub use breeding::{TournamentBreeder, Variation};
pub use candidate::{Candidate, TestCase, dominates};
pub use clock::{Clock, Deadline, ManualClock, SystemClock};
pub use collaborators::{Breeder, DirectedGenerator, Evaluator, GeneratorError, SearchObserver};
pub use diversity::DiversityAssigner;
pub use engine::{SearchEngine, SearchError, SearchResult, run_search, select_population};
pub use goal::{Goal, GoalId, GoalKind, GoalSet, GoalSetBuilder, GoalSetError};
pub use goals::GoalsManager;
pub use ranking::{Ranking, RankingEngine};
pub use stagnation::StagnationController;
