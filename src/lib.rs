//! # Ironset
//!
//! A **partition-parallel execution kernel** for bounded, in-memory datasets. Ironset builds
//! lazy operator trees over typed datasets and executes them across a fixed number of
//! partitions on a rayon pool, gathering per-partition results on a single coordinator.
//!
//! ## Key Features
//!
//! - **Lazy datasets** - operators only build a tree; nothing runs before an action
//! - **Deterministic partitioning** - contiguous range assignment, reproducible across runs
//! - **Broadcast cross product** - one operand is gathered once and shared with every
//!   partition of the other; no partition holds both operands in full
//! - **Ordered gather** - `collect()` concatenates partitions by index, not arrival order
//! - **Explicit object reuse** - a session switch, off by default, with safe snapshots either way
//! - **All-or-nothing actions** - the first partition failure cancels its siblings and is the
//!   only error returned
//!
//! ## Quick Start
//!
//! ```
//! use ironset::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = ExecutionEnvironment::new();
//! env.set_parallelism(5)?;
//! env.disable_object_reuse();
//!
//! let a = env.from_elements(1..=10);
//! let b = env.from_elements(1..=10);
//!
//! let pairs = a.cross(&b);
//! assert_eq!(pairs.count()?, 100);
//!
//! let mut all = pairs.collect()?;
//! all.sort();
//! assert_eq!(all.first(), Some(&(1, 1)));
//! assert_eq!(all.last(), Some(&(10, 10)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### ExecutionEnvironment
//!
//! An [`ExecutionEnvironment`] is the session: it owns the [`ExecutionConfig`] (default
//! parallelism, object reuse, collect limit, worker pool size), creates source datasets, and
//! records a [`JobExecutionResult`] for every successful action.
//!
//! ### Dataset
//!
//! A [`Dataset<T>`] is an immutable handle on a node of the operator tree:
//! - [`map`](Dataset::map), [`try_map`](Dataset::try_map), [`filter`](Dataset::filter) -
//!   element-wise transforms fused into the partition tasks of their input
//! - [`cross`](Dataset::cross) and its variants - cartesian products via broadcast
//! - [`parallelism`](Dataset::parallelism) - explicit partition count
//!
//! ### Actions
//!
//! [`count`](Dataset::count), [`collect`](Dataset::collect),
//! [`collect_sorted`](Dataset::collect_sorted) and [`for_each`](Dataset::for_each) execute the
//! tree. [`explain`](Dataset::explain) describes it without executing anything.
//!
//! ## Errors
//!
//! All fallible operations return [`Result<T>`] with a [`DatasetError`]. User closures passed
//! to [`try_map`](Dataset::try_map) or [`cross_with`](Dataset::cross_with) return
//! [`anyhow::Result`]; their errors surface as
//! [`DatasetError::PartitionExecution`] with the failing partition index.

pub mod actions;
pub mod config;
pub mod cross;
pub mod dataset;
pub mod environment;
pub mod error;
pub mod gather;
pub(crate) mod node;
pub mod node_id;
pub mod partition;
pub mod planner;
pub(crate) mod runner;
pub mod testing;

pub use config::ExecutionConfig;
pub use cross::CrossHint;
pub use dataset::{Dataset, Element, from_vec};
pub use environment::{ActionKind, ExecutionEnvironment, JobExecutionResult};
pub use error::{DatasetError, Result};
pub use node_id::{JobId, NodeId};
pub use planner::{ExecutionExplanation, ExplainStep};
