//! Typed dataset handles and element-wise transforms.
//!
//! A [`Dataset<T>`] is a cheap, cloneable reference to a node of a lazy operator tree plus
//! the [`ExecutionEnvironment`] it was built in. Building a dataset never executes anything;
//! see [`actions`](crate::actions) for the operations that do.

use crate::config::parallelism_from;
use crate::environment::ExecutionEnvironment;
use crate::error::Result;
use crate::node::{ElementOp, FilterOp, MapOp, PlanNode, RebalanceNode, StatelessNode};
use crate::node_id::NodeId;
use crate::planner::{ExecutionExplanation, explain};
use std::fmt::Display;
use std::sync::Arc;

/// Bound for values flowing through a dataset.
///
/// Elements are shared across worker threads and cloned out of reused buffers when
/// collected, hence `Send + Sync + Clone`.
pub trait Element: 'static + Send + Sync + Clone {}
impl<T> Element for T where T: 'static + Send + Sync + Clone {}

/// A lazily evaluated, partitioned collection of `T`.
pub struct Dataset<T> {
    pub(crate) env: ExecutionEnvironment,
    pub(crate) node: Arc<dyn PlanNode<T>>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            node: Arc::clone(&self.node),
        }
    }
}

/// Create a dataset from an owned vector.
///
/// Free-function form of [`ExecutionEnvironment::from_vec`].
pub fn from_vec<T: Element>(env: &ExecutionEnvironment, data: Vec<T>) -> Dataset<T> {
    env.from_vec(data)
}

impl<T: Element> Dataset<T> {
    pub(crate) fn from_node(env: ExecutionEnvironment, node: Arc<dyn PlanNode<T>>) -> Self {
        Self { env, node }
    }

    /// The environment this dataset executes in.
    #[must_use]
    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.env
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Partitions an action would run with under the environment's current config.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.node.partitions(self.env.parallelism())
    }

    /// Set the number of partitions of this dataset.
    ///
    /// On a source this changes the range assignment. On a derived dataset output partition
    /// `j` concatenates upstream partitions `i` with `i % n == j`.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`](crate::DatasetError::Configuration) if `n` is
    /// zero or negative. Nothing executes.
    pub fn parallelism<P>(self, n: P) -> Result<Self>
    where
        P: TryInto<usize> + Copy + Display,
    {
        let n = parallelism_from(n)?;
        let id = self.env.next_node_id();
        let node: Arc<dyn PlanNode<T>> = match self.node.reparallelize(id, n) {
            Some(node) => node,
            None => Arc::new(RebalanceNode::new(id, Arc::clone(&self.node), n)),
        };
        Ok(Self::from_node(self.env, node))
    }

    /// Apply `f` to every element.
    #[must_use]
    pub fn map<O, F>(self, f: F) -> Dataset<O>
    where
        O: Element,
        F: Fn(&T) -> O + Send + Sync + 'static,
    {
        let op = MapOp::<T, O, _>::new(move |x: &T| -> anyhow::Result<O> { Ok(f(x)) }, false);
        self.stateless(Arc::new(op))
    }

    /// Apply a fallible `f` to every element.
    ///
    /// The first error fails its partition and aborts the running action with
    /// [`DatasetError::PartitionExecution`](crate::DatasetError::PartitionExecution).
    #[must_use]
    pub fn try_map<O, F>(self, f: F) -> Dataset<O>
    where
        O: Element,
        F: Fn(&T) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        self.stateless(Arc::new(MapOp::<T, O, F>::new(f, true)))
    }

    /// Keep elements matching `pred`.
    #[must_use]
    pub fn filter<P>(self, pred: P) -> Dataset<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.stateless(Arc::new(FilterOp::<T, P>::new(pred)))
    }

    fn stateless<O: Element>(self, op: Arc<dyn ElementOp<T, O>>) -> Dataset<O> {
        let node = StatelessNode::new(self.env.next_node_id(), self.node, op);
        Dataset::from_node(self.env, Arc::new(node))
    }

    /// Describe how an action on this dataset would execute, without running it.
    #[must_use]
    pub fn explain(&self) -> ExecutionExplanation {
        explain(self.node.as_ref(), &self.env.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;

    #[test]
    fn parallelism_on_source_is_native() -> anyhow::Result<()> {
        let env = ExecutionEnvironment::new();
        let ds = env.from_vec((0..10).collect::<Vec<u32>>()).parallelism(4)?;
        let plan = ds.explain();
        assert_eq!(plan.count_kind("Rebalance"), 0);
        assert_eq!(ds.partition_count(), 4);
        Ok(())
    }

    #[test]
    fn parallelism_on_derived_dataset_rebalances() -> anyhow::Result<()> {
        let env = ExecutionEnvironment::new();
        env.set_parallelism(6)?;
        let ds = env.from_vec(vec![1u8, 2, 3]).map(|x| x * 2).parallelism(2)?;
        assert_eq!(ds.explain().count_kind("Rebalance"), 1);
        assert_eq!(ds.partition_count(), 2);
        Ok(())
    }

    #[test]
    fn invalid_parallelism_is_rejected() {
        let env = ExecutionEnvironment::new();
        let ds = env.from_vec(vec![1]);
        assert!(matches!(ds.clone().parallelism(0), Err(DatasetError::Configuration(_))));
        assert!(matches!(ds.parallelism(-3i64), Err(DatasetError::Configuration(_))));
    }

    #[test]
    fn default_parallelism_is_late_bound() -> anyhow::Result<()> {
        let env = ExecutionEnvironment::new();
        let ds = env.from_vec(vec!['a', 'b']);
        env.set_parallelism(3)?;
        assert_eq!(ds.partition_count(), 3);
        env.set_parallelism(1)?;
        assert_eq!(ds.partition_count(), 1);
        Ok(())
    }
}
