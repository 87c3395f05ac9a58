//! Coverage goals and the dependency graph between them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense goal identifier: the goal's index inside its [`GoalSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoalId(pub usize);

impl GoalId {
    /// Index into per-goal fitness vectors.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Kind of coverage target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalKind {
    /// A reachable source line.
    Line,
    /// One outcome of a conditional branch.
    Branch,
    /// Entry of a method.
    Method,
    /// A thrown exception.
    Exception,
}

/// A single coverage target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    id: GoalId,
    kind: GoalKind,
    name: String,
    dependencies: Vec<GoalId>,
}

impl Goal {
    /// Goal identity.
    pub fn id(&self) -> GoalId {
        self.id
    }

    pub fn kind(&self) -> GoalKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Control-dependency predecessors that must be covered before this goal
    /// becomes active.
    pub fn dependencies(&self) -> &[GoalId] {
        &self.dependencies
    }

    /// A fitness of exactly zero means the goal is covered.
    pub fn is_satisfied_by(&self, fitness: f64) -> bool {
        fitness == 0.0
    }
}

/// Goal definition errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GoalSetError {
    #[error("Goal '{goal}' depends on unknown goal {dependency}")]
    UnknownDependency { goal: String, dependency: GoalId },
    #[error("Goal '{0}' depends on itself")]
    SelfDependency(String),
    #[error("Duplicate goal name '{0}'")]
    DuplicateName(String),
    #[error("Dependency cycle through goal '{0}'")]
    Cycle(String),
}

/// Immutable, validated universe of goals for one search.
#[derive(Debug, Clone, Default)]
pub struct GoalSet {
    goals: Vec<Goal>,
    dependents: Vec<Vec<GoalId>>,
}

impl GoalSet {
    /// Start building a goal set.
    pub fn builder() -> GoalSetBuilder {
        GoalSetBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn get(&self, id: GoalId) -> Option<&Goal> {
        self.goals.get(id.0)
    }

    /// Look up a goal by its name.
    pub fn find(&self, name: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter()
    }

    /// Goals that list `id` among their dependencies.
    pub fn dependents(&self, id: GoalId) -> &[GoalId] {
        &self.dependents[id.0]
    }

    /// Goals without dependencies.
    pub fn roots(&self) -> impl Iterator<Item = GoalId> + '_ {
        self.goals
            .iter()
            .filter(|g| g.dependencies.is_empty())
            .map(|g| g.id)
    }
}

/// Incremental goal set construction.
#[derive(Debug, Default)]
pub struct GoalSetBuilder {
    goals: Vec<Goal>,
}

impl GoalSetBuilder {
    /// Add a goal and return its id. Dependencies must refer to goals that
    /// exist when [`GoalSetBuilder::build`] is called.
    pub fn add(
        &mut self,
        kind: GoalKind,
        name: impl Into<String>,
        dependencies: Vec<GoalId>,
    ) -> GoalId {
        let id = GoalId(self.goals.len());
        self.goals.push(Goal {
            id,
            kind,
            name: name.into(),
            dependencies,
        });
        id
    }

    /// Validate and freeze the goal set.
    pub fn build(self) -> Result<GoalSet, GoalSetError> {
        let count = self.goals.len();
        let mut names = HashSet::with_capacity(count);
        let mut dependents = vec![Vec::new(); count];

        for goal in &self.goals {
            if !names.insert(goal.name.as_str()) {
                return Err(GoalSetError::DuplicateName(goal.name.clone()));
            }
            for &dep in &goal.dependencies {
                if dep == goal.id {
                    return Err(GoalSetError::SelfDependency(goal.name.clone()));
                }
                if dep.0 >= count {
                    return Err(GoalSetError::UnknownDependency {
                        goal: goal.name.clone(),
                        dependency: dep,
                    });
                }
                dependents[dep.0].push(goal.id);
            }
        }

        // Kahn's algorithm: anything left unvisited sits on a cycle and could
        // never enter the frontier.
        let mut pending: HashMap<GoalId, usize> = self
            .goals
            .iter()
            .map(|g| (g.id, g.dependencies.len()))
            .collect();
        let mut ready: Vec<GoalId> = self
            .goals
            .iter()
            .filter(|g| g.dependencies.is_empty())
            .map(|g| g.id)
            .collect();
        let mut visited = 0;
        while let Some(id) = ready.pop() {
            visited += 1;
            for &child in &dependents[id.0] {
                if let Some(remaining) = pending.get_mut(&child) {
                    *remaining -= 1;
                    if *remaining == 0 {
                        ready.push(child);
                    }
                }
            }
        }
        if visited < count {
            let stuck = self
                .goals
                .iter()
                .find(|g| pending.get(&g.id).is_some_and(|&n| n > 0))
                .map(|g| g.name.clone())
                .unwrap_or_default();
            return Err(GoalSetError::Cycle(stuck));
        }

        Ok(GoalSet {
            goals: self.goals,
            dependents,
        })
    }
}
