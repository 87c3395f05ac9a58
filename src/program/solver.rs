//! Path-condition solver used as the directed fallback generator.
//!
//! Seeds are executed to learn which branch outcomes have been observed. For
//! every prefix of a seed's path whose last decision has an unseen opposite
//! outcome, the flipped path is queued. Conditions only compare one input
//! against a constant, so each flipped path reduces to an interval (minus a
//! few excluded points) per input, which is solved directly.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use crate::schema::{CmpOp, Condition, InputVector};
use crate::search::{Candidate, Deadline, DirectedGenerator, GeneratorError};

use super::compile::{CompiledProgram, Decision};

/// A path to solve for: the decisions to keep plus the flipped one, and the
/// seed inputs to stay close to.
#[derive(Debug, Clone)]
struct Flip {
    decisions: Vec<Decision>,
    base: Vec<i64>,
}

impl Flip {
    fn target(&self) -> Option<Decision> {
        self.decisions.last().copied()
    }
}

/// Feasible values of one input.
#[derive(Debug, Clone)]
struct Domain {
    min: i64,
    max: i64,
    excluded: BTreeSet<i64>,
}

impl Domain {
    fn new((min, max): (i64, i64)) -> Self {
        Self {
            min,
            max,
            excluded: BTreeSet::new(),
        }
    }

    /// Narrow by `condition` evaluating to `outcome`.
    fn restrict(&mut self, condition: &Condition, outcome: bool) {
        let v = condition.value;
        // Normalize to the operator that must hold.
        let op = match (condition.op, outcome) {
            (op, true) => op,
            (CmpOp::Eq, false) => CmpOp::Ne,
            (CmpOp::Ne, false) => CmpOp::Eq,
            (CmpOp::Lt, false) => CmpOp::Ge,
            (CmpOp::Le, false) => CmpOp::Gt,
            (CmpOp::Gt, false) => CmpOp::Le,
            (CmpOp::Ge, false) => CmpOp::Lt,
        };

        match op {
            CmpOp::Eq => {
                self.min = self.min.max(v);
                self.max = self.max.min(v);
            }
            CmpOp::Ne => {
                self.excluded.insert(v);
            }
            CmpOp::Lt => self.max = self.max.min(v.saturating_sub(1)),
            CmpOp::Le => self.max = self.max.min(v),
            CmpOp::Gt => self.min = self.min.max(v.saturating_add(1)),
            CmpOp::Ge => self.min = self.min.max(v),
        }
    }

    fn allows(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value) && !self.excluded.contains(&value)
    }

    /// Feasible value closest to `preferred`.
    fn pick(&self, preferred: i64) -> Option<i64> {
        if self.min > self.max {
            return None;
        }
        let start = preferred.clamp(self.min, self.max);
        // At most |excluded| + 1 values on either side need checking.
        for offset in 0..=self.excluded.len() as i64 {
            for candidate in [start.saturating_add(offset), start.saturating_sub(offset)] {
                if self.allows(candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// [`DirectedGenerator`] for compiled branch programs.
#[derive(Debug)]
pub struct PathSolver {
    program: Arc<CompiledProgram>,
    traced: HashSet<u64>,
    seen: HashSet<Decision>,
    queued: HashSet<Vec<Decision>>,
    pending: VecDeque<Flip>,
    solved: usize,
    infeasible: usize,
}

impl PathSolver {
    pub fn new(program: Arc<CompiledProgram>) -> Self {
        Self {
            program,
            traced: HashSet::new(),
            seen: HashSet::new(),
            queued: HashSet::new(),
            pending: VecDeque::new(),
            solved: 0,
            infeasible: 0,
        }
    }

    /// Paths waiting to be solved.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Branch outcomes observed so far.
    pub fn seen_outcomes(&self) -> usize {
        self.seen.len()
    }

    /// Paths solved and paths proven infeasible.
    pub fn solver_stats(&self) -> (usize, usize) {
        (self.solved, self.infeasible)
    }

    /// Record the path of `inputs` and queue its unexplored flips.
    fn learn(&mut self, inputs: &[i64]) {
        let trace = self.program.execute(&InputVector(inputs.to_vec()));
        let path = trace.path();
        self.seen.extend(path.iter().copied());

        for (i, decision) in path.iter().enumerate() {
            let flipped = decision.flipped();
            if self.seen.contains(&flipped) {
                continue;
            }
            let mut decisions = path[..i].to_vec();
            decisions.push(flipped);
            if self.queued.insert(decisions.clone()) {
                self.pending.push_back(Flip {
                    decisions,
                    base: inputs.to_vec(),
                });
            }
        }
    }

    /// Inputs taking every decision of `flip`, as close to its base as
    /// possible; `None` when the path is infeasible.
    fn solve(&self, flip: &Flip) -> Option<Vec<i64>> {
        let mut domains = vec![Domain::new(self.program.bounds()); self.program.inputs()];
        for decision in &flip.decisions {
            let condition = self.program.branch(decision.site)?.condition;
            domains
                .get_mut(condition.var)?
                .restrict(&condition, decision.outcome);
        }

        domains
            .iter()
            .enumerate()
            .map(|(var, domain)| domain.pick(flip.base.get(var).copied().unwrap_or(0)))
            .collect()
    }
}

impl DirectedGenerator<InputVector> for PathSolver {
    fn collect_traces(
        &mut self,
        seeds: &[Candidate<InputVector>],
        deadline: &Deadline<'_>,
    ) -> Result<(), GeneratorError> {
        let inputs = self.program.inputs();
        let mut collected = 0;

        for seed in seeds {
            if deadline.is_expired() {
                log::debug!("Trace collection timed out after {} seeds", collected);
                break;
            }
            if self.traced.contains(&seed.id) {
                continue;
            }
            if seed.test.0.len() != inputs {
                return Err(GeneratorError::TraceCollection(format!(
                    "seed {} has {} inputs, program takes {}",
                    seed.id,
                    seed.test.0.len(),
                    inputs
                )));
            }

            self.traced.insert(seed.id);
            self.learn(&seed.test.0);
            collected += 1;
        }

        log::debug!(
            "Traced {} new seeds, {} outcomes seen, {} paths pending",
            collected,
            self.seen.len(),
            self.pending.len()
        );
        Ok(())
    }

    fn synthesize_one(&mut self, deadline: &Deadline<'_>) -> Result<Option<InputVector>, GeneratorError> {
        while !deadline.is_expired() {
            let Some(flip) = self.pending.pop_front() else {
                return Ok(None);
            };
            let Some(target) = flip.target() else {
                continue;
            };
            if self.seen.contains(&target) {
                continue;
            }

            match self.solve(&flip) {
                Some(inputs) => {
                    self.solved += 1;
                    self.learn(&inputs);
                    if !self.seen.contains(&target) {
                        return Err(GeneratorError::Synthesis(format!(
                            "solution {:?} misses branch b{}",
                            inputs, target.site
                        )));
                    }
                    return Ok(Some(InputVector(inputs)));
                }
                None => {
                    self.infeasible += 1;
                    log::trace!("Infeasible path to b{} = {}", target.site, target.outcome);
                }
            }
        }
        Ok(None)
    }
}
