//! Plan explanation.
//!
//! [`Dataset::explain`](crate::Dataset::explain) walks the operator tree behind a dataset
//! without executing it and returns an [`ExecutionExplanation`]: one [`ExplainStep`] per
//! node in execution order (inputs before the operators consuming them), the partition count
//! each node will run with under the current environment config, and which steps are
//! evaluated as cross broadcasts.

use crate::config::ExecutionConfig;
use crate::node::PlanNode;
use crate::node_id::NodeId;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// A single node of the explained plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainStep {
    /// Node being described.
    pub node: NodeId,
    /// Nesting level; cross inputs sit one level below the cross.
    pub depth: usize,
    /// Operator kind (`Source`, `Map`, `Filter`, `TryMap`, `Rebalance`, `Cross`).
    pub kind: String,
    /// Human-readable description of the operation.
    pub description: String,
    /// Partitions this node executes with.
    pub partitions: usize,
    /// Whether this node feeds a cross as its broadcast side.
    pub broadcast: bool,
}

impl ExplainStep {
    pub(crate) fn new(
        node: NodeId,
        depth: usize,
        kind: &str,
        description: String,
        partitions: usize,
    ) -> Self {
        Self {
            node,
            depth,
            kind: kind.to_string(),
            description,
            partitions,
            broadcast: false,
        }
    }
}

/// Execution plan of a dataset under a given config.
#[derive(Debug, Clone)]
pub struct ExecutionExplanation {
    /// Steps in execution order; the last one is the dataset itself.
    pub steps: Vec<ExplainStep>,
    /// Environment default used for nodes without an explicit parallelism.
    pub default_parallelism: usize,
    /// Object-reuse mode actions would run with.
    pub object_reuse: bool,
}

impl ExecutionExplanation {
    /// Partitions of the terminal dataset.
    #[must_use]
    pub fn output_partitions(&self) -> usize {
        self.steps.last().map_or(0, |s| s.partitions)
    }

    /// Number of steps of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: &str) -> usize {
        self.steps.iter().filter(|s| s.kind == kind).count()
    }
}

impl Display for ExecutionExplanation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "╔═══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║              EXECUTION PLAN EXPLANATION                       ║"
        )?;
        writeln!(
            f,
            "╚═══════════════════════════════════════════════════════════════╝"
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "┌─ SETTINGS ───────────────────────────────────────────────────┐"
        )?;
        writeln!(f, "│ Default Parallelism: {:>8}", self.default_parallelism)?;
        writeln!(f, "│ Output Partitions:   {:>8}", self.output_partitions())?;
        writeln!(
            f,
            "│ Object Reuse:        {:>8}",
            if self.object_reuse { "enabled" } else { "disabled" }
        )?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "┌─ EXECUTION STEPS ────────────────────────────────────────────┐"
        )?;
        for (idx, step) in self.steps.iter().enumerate() {
            let indent = "  ".repeat(step.depth);
            let marker = if step.broadcast { " [BROADCAST]" } else { "" };
            writeln!(f, "│")?;
            writeln!(
                f,
                "│ {indent}Step {}: {} {}{marker}",
                idx + 1,
                step.kind,
                step.node
            )?;
            writeln!(f, "│ {indent}  {}", step.description)?;
            writeln!(f, "│ {indent}  Partitions: {}", step.partitions)?;
        }
        writeln!(f, "│")?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}

pub(crate) fn explain<T>(node: &dyn PlanNode<T>, config: &ExecutionConfig) -> ExecutionExplanation {
    let mut steps = Vec::new();
    node.explain(0, config.parallelism, &mut steps);
    ExecutionExplanation {
        steps,
        default_parallelism: config.parallelism,
        object_reuse: config.object_reuse,
    }
}
