//! Lightweight identifiers for plan nodes and actions.
//!
//! Each operator applied through an
//! [`ExecutionEnvironment`](crate::environment::ExecutionEnvironment) is assigned a
//! sequential [`NodeId`]; each action it runs gets a sequential [`JobId`]. Both are
//! `Copy` and hashable, and show up in plan explanations and log fields.

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Unique numeric identifier for an operator node within an environment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "n{}", self.0)
    }
}

/// Identifier of one action invocation (`count`, `collect`, ...).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "job-{}", self.0)
    }
}
