//! Reference problem: a loop-free branching program over integer inputs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::SearchConfig;

/// A problem file as read by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFile {
    /// Search parameters.
    #[serde(default)]
    pub config: SearchConfig,
    /// Program under test.
    pub program: BranchProgram,
    /// Where to write the archive summary (None = don't write).
    #[serde(default)]
    pub archive_output: Option<PathBuf>,
}

impl ProblemFile {
    /// Small nested program with one hard-to-hit equality.
    pub fn example() -> Self {
        use Statement::{Branch, Line};

        let line = |label: &str| Line {
            label: label.to_string(),
        };

        let program = BranchProgram {
            name: "classify".to_string(),
            inputs: 3,
            input_bounds: (-1000, 1000),
            body: vec![
                line("entry"),
                Branch {
                    condition: Condition::new(0, CmpOp::Gt, 0),
                    then_body: vec![
                        line("positive"),
                        Branch {
                            condition: Condition::new(1, CmpOp::Eq, 742),
                            then_body: vec![
                                line("magic"),
                                Branch {
                                    condition: Condition::new(2, CmpOp::Lt, -500),
                                    then_body: vec![line("deep")],
                                    else_body: vec![line("shallow")],
                                },
                            ],
                            else_body: vec![line("ordinary")],
                        },
                    ],
                    else_body: vec![line("non-positive")],
                },
                line("exit"),
            ],
        };

        Self {
            config: SearchConfig::default(),
            program,
            archive_output: Some(PathBuf::from("archive.json")),
        }
    }
}

/// Program under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchProgram {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Number of integer inputs.
    pub inputs: usize,
    /// Inclusive range every input is drawn from.
    #[serde(default = "default_input_bounds")]
    pub input_bounds: (i64, i64),
    /// Top-level statements.
    pub body: Vec<Statement>,
}

fn default_input_bounds() -> (i64, i64) {
    (-1000, 1000)
}

/// A statement of a [`BranchProgram`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    /// A coverable line.
    Line {
        /// Unique label.
        label: String,
    },
    /// Two-way conditional.
    Branch {
        condition: Condition,
        #[serde(default)]
        then_body: Vec<Statement>,
        #[serde(default)]
        else_body: Vec<Statement>,
    },
}

/// `inputs[var] <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Input index.
    pub var: usize,
    pub op: CmpOp,
    pub value: i64,
}

impl Condition {
    pub fn new(var: usize, op: CmpOp, value: i64) -> Self {
        Self { var, op, value }
    }

    /// Whether `input` satisfies the comparison.
    pub fn holds(&self, input: i64) -> bool {
        match self.op {
            CmpOp::Eq => input == self.value,
            CmpOp::Ne => input != self.value,
            CmpOp::Lt => input < self.value,
            CmpOp::Le => input <= self.value,
            CmpOp::Gt => input > self.value,
            CmpOp::Ge => input >= self.value,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{} {} {}", self.var, self.op, self.value)
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// A test for a [`BranchProgram`]: one value per input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputVector(pub Vec<i64>);

impl InputVector {
    /// Value of input `var`; missing inputs read as 0.
    pub fn get(&self, var: usize) -> i64 {
        self.0.get(var).copied().unwrap_or(0)
    }
}

impl fmt::Display for InputVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str(")")
    }
}
