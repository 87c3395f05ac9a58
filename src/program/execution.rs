//! Executing a compiled program and turning traces into per-goal fitness.

use std::sync::Arc;

use crate::schema::{CmpOp, Condition, InputVector};
use crate::search::{Evaluator, GoalId, GoalSet};

use super::compile::{CompiledProgram, Decision, Node, Target};

/// Outcome of one executed branch site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub site: usize,
    pub outcome: bool,
    /// Distance to making the condition true; 0 when it is.
    pub distance_true: f64,
    /// Distance to making the condition false; 0 when it is.
    pub distance_false: f64,
}

impl BranchEval {
    pub fn distance(&self, outcome: bool) -> f64 {
        if outcome {
            self.distance_true
        } else {
            self.distance_false
        }
    }
}

/// What one execution did.
#[derive(Debug, Clone)]
pub struct Trace {
    evaluations: Vec<Option<BranchEval>>,
    lines: Vec<bool>,
    path: Vec<Decision>,
}

impl Trace {
    /// Evaluation of `site`, if it executed.
    pub fn branch(&self, site: usize) -> Option<&BranchEval> {
        self.evaluations.get(site).and_then(Option::as_ref)
    }

    pub fn reached_line(&self, index: usize) -> bool {
        self.lines.get(index).copied().unwrap_or(false)
    }

    /// Decisions taken, in execution order.
    pub fn path(&self) -> &[Decision] {
        &self.path
    }
}

/// Branch distances `(to_true, to_false)` of `condition` at `input`.
///
/// The outcome that holds gets 0, the other one at least 1.
pub fn branch_distance(condition: &Condition, input: i64) -> (f64, f64) {
    // Exact over the whole i64 range; f64 would merge neighbours above 2^53.
    let gap = i128::from(input) - i128::from(condition.value);
    let (to_true, to_false) = match condition.op {
        CmpOp::Eq => (gap.abs(), 1),
        CmpOp::Ne => (1, gap.abs()),
        CmpOp::Lt => (gap + 1, -gap),
        CmpOp::Le => (gap, 1 - gap),
        CmpOp::Gt => (1 - gap, gap),
        CmpOp::Ge => (-gap, gap + 1),
    };

    let miss = |distance: i128| (distance as f64).max(1.0);
    if condition.holds(input) {
        (0.0, miss(to_false))
    } else {
        (miss(to_true), 0.0)
    }
}

/// Map a non-negative distance into `[0, 1)`.
fn normalize(distance: f64) -> f64 {
    distance / (distance + 1.0)
}

impl CompiledProgram {
    /// Run the program on `input`.
    pub fn execute(&self, input: &InputVector) -> Trace {
        let mut trace = Trace {
            evaluations: vec![None; self.branches().len()],
            lines: vec![false; self.lines().len()],
            path: Vec::new(),
        };
        self.run_block(&self.body, input, &mut trace);
        trace
    }

    fn run_block(&self, nodes: &[Node], input: &InputVector, trace: &mut Trace) {
        for node in nodes {
            match node {
                Node::Line(index) => trace.lines[*index] = true,
                Node::Branch {
                    site,
                    then_body,
                    else_body,
                } => {
                    let Some(branch) = self.branch(*site) else {
                        continue;
                    };
                    let value = input.get(branch.condition.var);
                    let outcome = branch.condition.holds(value);
                    let (distance_true, distance_false) = branch_distance(&branch.condition, value);

                    trace.evaluations[*site] = Some(BranchEval {
                        site: *site,
                        outcome,
                        distance_true,
                        distance_false,
                    });
                    trace.path.push(Decision::new(*site, outcome));

                    let body = if outcome { then_body } else { else_body };
                    self.run_block(body, input, trace);
                }
            }
        }
    }

    /// Fitness of `trace` on `goal`: 0 when covered, otherwise the approach
    /// level plus the normalized branch distance where execution diverged.
    pub fn fitness(&self, trace: &Trace, goal: GoalId) -> f64 {
        let Some(chain) = self.decisions_for(goal) else {
            return f64::MAX;
        };

        if let Some(Target::Line(index)) = self.target(goal)
            && trace.reached_line(index)
        {
            return 0.0;
        }

        let depth = chain.len();
        for (level, decision) in chain.iter().enumerate() {
            match trace.branch(decision.site) {
                Some(eval) if eval.outcome == decision.outcome => {}
                Some(eval) => {
                    let approach = (depth - level - 1) as f64;
                    return approach + normalize(eval.distance(decision.outcome));
                }
                // Unreachable in loop-free programs.
                None => return (depth - level) as f64,
            }
        }

        0.0
    }
}

/// [`Evaluator`] running a compiled program.
#[derive(Debug, Clone)]
pub struct ProgramEvaluator {
    program: Arc<CompiledProgram>,
}

impl ProgramEvaluator {
    pub fn new(program: Arc<CompiledProgram>) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }
}

impl Evaluator<InputVector> for ProgramEvaluator {
    fn evaluate(&self, test: &InputVector, goals: &GoalSet) -> Vec<f64> {
        let trace = self.program.execute(test);
        goals
            .iter()
            .map(|goal| self.program.fitness(&trace, goal.id()))
            .collect()
    }
}
