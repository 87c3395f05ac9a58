//! Flattening a [`BranchProgram`] into branch sites and coverage goals.

use std::collections::HashSet;

use crate::schema::{BranchProgram, Condition, Statement};
use crate::search::{GoalId, GoalKind, GoalSet, GoalSetBuilder};

use super::ProgramError;

/// One outcome of one branch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decision {
    pub site: usize,
    pub outcome: bool,
}

impl Decision {
    pub fn new(site: usize, outcome: bool) -> Self {
        Self { site, outcome }
    }

    /// The other outcome of the same site.
    pub fn flipped(self) -> Self {
        Self {
            site: self.site,
            outcome: !self.outcome,
        }
    }
}

/// A conditional of the program with its control dependencies.
#[derive(Debug, Clone)]
pub struct BranchSite {
    pub condition: Condition,
    /// Decisions that must hold for the site to execute, outermost first.
    pub ancestors: Vec<Decision>,
    pub true_goal: GoalId,
    pub false_goal: GoalId,
}

/// A labelled line with its control dependencies.
#[derive(Debug, Clone)]
pub struct LineSite {
    pub label: String,
    pub ancestors: Vec<Decision>,
    pub goal: GoalId,
}

/// What a goal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Reach line `n`.
    Line(usize),
    /// Take the given branch outcome.
    Branch(Decision),
}

#[derive(Debug, Clone)]
pub(super) enum Node {
    Line(usize),
    Branch {
        site: usize,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
}

/// A validated program ready for execution, with its goal set.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    name: String,
    inputs: usize,
    bounds: (i64, i64),
    pub(super) body: Vec<Node>,
    branches: Vec<BranchSite>,
    lines: Vec<LineSite>,
    targets: Vec<Target>,
    goals: GoalSet,
}

impl CompiledProgram {
    /// Validate `program` and derive its goals.
    ///
    /// Every line yields a line goal and every branch a goal per outcome. A
    /// goal nested in a branch body depends on the goal of that outcome.
    pub fn new(program: &BranchProgram) -> Result<Self, ProgramError> {
        if program.inputs == 0 {
            return Err(ProgramError::NoInputs);
        }
        let (min, max) = program.input_bounds;
        if min > max {
            return Err(ProgramError::InvalidBounds { min, max });
        }

        let mut compiler = Compiler {
            inputs: program.inputs,
            builder: GoalSet::builder(),
            labels: HashSet::new(),
            branches: Vec::new(),
            lines: Vec::new(),
            targets: Vec::new(),
        };
        let body = compiler.block(&program.body, &[], None)?;
        let goals = compiler.builder.build()?;

        log::debug!(
            "Compiled program '{}': {} lines, {} branches, {} goals",
            program.name,
            compiler.lines.len(),
            compiler.branches.len(),
            goals.len()
        );

        Ok(Self {
            name: program.name.clone(),
            inputs: program.inputs,
            bounds: program.input_bounds,
            body,
            branches: compiler.branches,
            lines: compiler.lines,
            targets: compiler.targets,
            goals,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn bounds(&self) -> (i64, i64) {
        self.bounds
    }

    pub fn goals(&self) -> &GoalSet {
        &self.goals
    }

    pub fn branches(&self) -> &[BranchSite] {
        &self.branches
    }

    pub fn branch(&self, site: usize) -> Option<&BranchSite> {
        self.branches.get(site)
    }

    pub fn lines(&self) -> &[LineSite] {
        &self.lines
    }

    pub fn target(&self, goal: GoalId) -> Option<Target> {
        self.targets.get(goal.index()).copied()
    }

    /// The control decisions leading to `goal`, the goal's own one last.
    pub fn decisions_for(&self, goal: GoalId) -> Option<Vec<Decision>> {
        match self.target(goal)? {
            Target::Line(index) => self.lines.get(index).map(|l| l.ancestors.clone()),
            Target::Branch(decision) => self.branches.get(decision.site).map(|b| {
                let mut chain = b.ancestors.clone();
                chain.push(decision);
                chain
            }),
        }
    }
}

struct Compiler {
    inputs: usize,
    builder: GoalSetBuilder,
    labels: HashSet<String>,
    branches: Vec<BranchSite>,
    lines: Vec<LineSite>,
    targets: Vec<Target>,
}

impl Compiler {
    fn block(
        &mut self,
        statements: &[Statement],
        ancestors: &[Decision],
        parent: Option<GoalId>,
    ) -> Result<Vec<Node>, ProgramError> {
        let dependencies: Vec<GoalId> = parent.into_iter().collect();
        let mut nodes = Vec::with_capacity(statements.len());

        for statement in statements {
            match statement {
                Statement::Line { label } => {
                    if !self.labels.insert(label.clone()) {
                        return Err(ProgramError::DuplicateLabel(label.clone()));
                    }
                    let index = self.lines.len();
                    let goal = self
                        .builder
                        .add(GoalKind::Line, label.clone(), dependencies.clone());
                    self.targets.push(Target::Line(index));
                    self.lines.push(LineSite {
                        label: label.clone(),
                        ancestors: ancestors.to_vec(),
                        goal,
                    });
                    nodes.push(Node::Line(index));
                }
                Statement::Branch {
                    condition,
                    then_body,
                    else_body,
                } => {
                    if condition.var >= self.inputs {
                        return Err(ProgramError::UnknownInput {
                            var: condition.var,
                            inputs: self.inputs,
                        });
                    }

                    let site = self.branches.len();
                    let true_goal = self.builder.add(
                        GoalKind::Branch,
                        format!("b{}: {} is true", site, condition),
                        dependencies.clone(),
                    );
                    self.targets.push(Target::Branch(Decision::new(site, true)));
                    let false_goal = self.builder.add(
                        GoalKind::Branch,
                        format!("b{}: {} is false", site, condition),
                        dependencies.clone(),
                    );
                    self.targets.push(Target::Branch(Decision::new(site, false)));
                    self.branches.push(BranchSite {
                        condition: *condition,
                        ancestors: ancestors.to_vec(),
                        true_goal,
                        false_goal,
                    });

                    let mut inner = ancestors.to_vec();
                    inner.push(Decision::new(site, true));
                    let then_nodes = self.block(then_body, &inner, Some(true_goal))?;
                    if let Some(last) = inner.last_mut() {
                        *last = Decision::new(site, false);
                    }
                    let else_nodes = self.block(else_body, &inner, Some(false_goal))?;

                    nodes.push(Node::Branch {
                        site,
                        then_body: then_nodes,
                        else_body: else_nodes,
                    });
                }
            }
        }

        Ok(nodes)
    }
}
