//! Reference problem: coverage of loop-free branching programs.
//!
//! Programs are nested `if`/`else` statements over integer inputs with
//! labelled lines. Each line and each branch outcome is a coverage goal;
//! goals nested inside a branch depend on that branch outcome.
//!
//! - **Compilation** (`compile`): validation and goal derivation
//! - **Execution** (`execution`): traces, branch distances and the evaluator
//! - **Variation** (`variation`): random inputs, crossover and mutation
//! - **Solver** (`solver`): the directed generator for stalled searches

mod compile;
mod execution;
mod solver;
mod variation;

pub use compile::{BranchSite, CompiledProgram, Decision, LineSite, Target};
pub use execution::{BranchEval, ProgramEvaluator, Trace, branch_distance};
pub use solver::PathSolver;
pub use variation::InputVariation;

use crate::schema::{BranchProgram, InputVector};
use crate::search::{GoalSetError, TestCase};

/// Invalid program definitions.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("Program must take at least one input")]
    NoInputs,
    #[error("Invalid input bounds [{min}, {max}]")]
    InvalidBounds { min: i64, max: i64 },
    #[error("Condition on x{var}, but the program takes {inputs} inputs")]
    UnknownInput { var: usize, inputs: usize },
    #[error("Duplicate line label: {0}")]
    DuplicateLabel(String),
    #[error("Invalid goal structure: {0}")]
    Goals(#[from] GoalSetError),
}

/// Non-zero inputs count towards test size, so the archive keeps the
/// simplest covering input.
impl TestCase for InputVector {
    fn size(&self) -> usize {
        self.0.iter().filter(|&&v| v != 0).count()
    }
}

impl BranchProgram {
    /// Validate and compile.
    pub fn compile(&self) -> Result<CompiledProgram, ProgramError> {
        CompiledProgram::new(self)
    }
}
