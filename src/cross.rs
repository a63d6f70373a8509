//! Cartesian product of two datasets via broadcast.
//!
//! A cross node designates one operand as the **outer** side and the other as the
//! **broadcast** side. When the action is prepared, the broadcast side is executed and
//! gathered once on the coordinator into an immutable `Arc<Vec<_>>`; every outer partition
//! then enumerates its own elements against that shared vector. No partition ever holds more
//! than its own outer slice plus the broadcast set, and the broadcast set is never mutated
//! while partitions run, so the tasks share it without locking.
//!
//! Within a partition pairs are emitted in lexicographic order of
//! (local outer position, broadcast position). The result has as many partitions as the
//! outer side, whatever the broadcast side's own parallelism.
//!
//! ## Available operations
//! - [`Dataset::cross`]: pairs `(a, b)`, broadcasting the second operand
//! - [`Dataset::cross_with_tiny`]: same as `cross`, spelled out
//! - [`Dataset::cross_with_huge`]: pairs `(a, b)`, broadcasting the first operand
//! - [`Dataset::cross_with`]: applies a fallible function to every pair
//!
//! ```
//! use ironset::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = ExecutionEnvironment::new();
//! env.set_parallelism(3)?;
//! let left = env.from_elements(vec![1, 2]);
//! let right = env.from_elements(vec!['x', 'y', 'z']);
//!
//! let pairs = left.cross(&right);
//! assert_eq!(pairs.count()?, 6);
//! # Ok(())
//! # }
//! ```

use crate::dataset::{Dataset, Element};
use crate::error::Result;
use crate::node::{ElementSink, PartitionTask, PlanNode, TaskContext, count_by_running};
use crate::node_id::NodeId;
use crate::planner::ExplainStep;
use crate::runner::Runner;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Which operand of a cross is replicated to every partition of the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossHint {
    /// Broadcast the second operand; partitions follow the first.
    BroadcastSecond,
    /// Broadcast the first operand; partitions follow the second.
    BroadcastFirst,
}

/// Produces the output for one (outer, broadcast) combination.
pub(crate) trait CrossFn<L, R, O>: Send + Sync {
    fn emit(
        &self,
        outer: &L,
        broadcast: &R,
        scratch: &mut Option<O>,
        reuse: bool,
        out: &mut dyn ElementSink<O>,
    ) -> anyhow::Result<()>;

    /// Whether every combination yields exactly one element, so counts can be multiplied.
    fn one_per_pair(&self) -> bool;
}

/// Emits `(a, b)` tuples. Under object reuse the tuple lives in a per-partition scratch slot
/// that is overwritten in place for every pair.
pub(crate) struct PairCross;

impl<A: Clone, B: Clone> CrossFn<A, B, (A, B)> for PairCross {
    fn emit(
        &self,
        a: &A,
        b: &B,
        scratch: &mut Option<(A, B)>,
        reuse: bool,
        out: &mut dyn ElementSink<(A, B)>,
    ) -> anyhow::Result<()> {
        if !reuse {
            return out.push((a.clone(), b.clone()));
        }
        if let Some(pair) = scratch.as_mut() {
            pair.0.clone_from(a);
            pair.1.clone_from(b);
        } else {
            *scratch = Some((a.clone(), b.clone()));
        }
        match scratch.as_ref() {
            Some(pair) => out.push_ref(pair),
            None => Ok(()),
        }
    }

    fn one_per_pair(&self) -> bool {
        true
    }
}

/// Applies a user function to every pair.
pub(crate) struct FnCross<F>(pub(crate) F);

impl<A, B, O, F> CrossFn<A, B, O> for FnCross<F>
where
    F: Fn(&A, &B) -> anyhow::Result<O> + Send + Sync,
{
    fn emit(
        &self,
        a: &A,
        b: &B,
        _scratch: &mut Option<O>,
        _reuse: bool,
        out: &mut dyn ElementSink<O>,
    ) -> anyhow::Result<()> {
        out.push((self.0)(a, b)?)
    }

    fn one_per_pair(&self) -> bool {
        false
    }
}

/// Swaps argument order so the outer side can be the second operand.
pub(crate) struct Flip<C, A, B> {
    inner: C,
    _t: PhantomData<fn(&A, &B)>,
}

impl<C, A, B> Flip<C, A, B> {
    pub(crate) fn new(inner: C) -> Self {
        Self {
            inner,
            _t: PhantomData,
        }
    }
}

impl<A, B, O, C> CrossFn<B, A, O> for Flip<C, A, B>
where
    C: CrossFn<A, B, O>,
{
    fn emit(
        &self,
        b: &B,
        a: &A,
        scratch: &mut Option<O>,
        reuse: bool,
        out: &mut dyn ElementSink<O>,
    ) -> anyhow::Result<()> {
        self.inner.emit(a, b, scratch, reuse, out)
    }

    fn one_per_pair(&self) -> bool {
        self.inner.one_per_pair()
    }
}

pub(crate) struct CrossNode<L, R, O> {
    id: NodeId,
    outer: Arc<dyn PlanNode<L>>,
    broadcast: Arc<dyn PlanNode<R>>,
    func: Arc<dyn CrossFn<L, R, O>>,
    hint: CrossHint,
}

impl<L: Element, R: Element, O: Element> PlanNode<O> for CrossNode<L, R, O> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn partitions(&self, default_parallelism: usize) -> usize {
        self.outer.partitions(default_parallelism)
    }

    fn prepare(&self, runner: &Runner) -> Result<Arc<dyn PartitionTask<O>>> {
        let broadcast_task = self.broadcast.prepare(runner)?;
        let broadcast = Arc::new(runner.collect(&broadcast_task)?);
        debug!(
            job_id = %runner.job_id(),
            node = %self.id,
            broadcast_node = %self.broadcast.id(),
            elements = broadcast.len(),
            "materialized cross broadcast side"
        );
        Ok(Arc::new(CrossTask {
            outer: self.outer.prepare(runner)?,
            broadcast,
            func: Arc::clone(&self.func),
        }))
    }

    fn explain(&self, depth: usize, default_parallelism: usize, steps: &mut Vec<ExplainStep>) {
        self.outer.explain(depth + 1, default_parallelism, steps);
        let first_broadcast = steps.len();
        self.broadcast.explain(depth + 1, default_parallelism, steps);
        for step in &mut steps[first_broadcast..] {
            step.broadcast = true;
        }
        let side = match self.hint {
            CrossHint::BroadcastSecond => "second",
            CrossHint::BroadcastFirst => "first",
        };
        steps.push(ExplainStep::new(
            self.id,
            depth,
            "Cross",
            format!(
                "outer {} x broadcast {} (broadcast {side} operand{})",
                self.outer.id(),
                self.broadcast.id(),
                if self.func.one_per_pair() {
                    ", count by multiplication"
                } else {
                    ""
                }
            ),
            self.partitions(default_parallelism),
        ));
    }
}

struct CrossTask<L, R, O> {
    outer: Arc<dyn PartitionTask<L>>,
    broadcast: Arc<Vec<R>>,
    func: Arc<dyn CrossFn<L, R, O>>,
}

/// Receives outer elements and enumerates each against the broadcast set.
struct CrossSink<'a, L, R, O> {
    broadcast: &'a [R],
    func: &'a dyn CrossFn<L, R, O>,
    scratch: Option<O>,
    reuse: bool,
    out: &'a mut dyn ElementSink<O>,
}

impl<L, R, O> CrossSink<'_, L, R, O> {
    fn enumerate(&mut self, outer: &L) -> anyhow::Result<()> {
        for b in self.broadcast {
            self.func
                .emit(outer, b, &mut self.scratch, self.reuse, self.out)?;
        }
        Ok(())
    }
}

impl<L, R, O> ElementSink<L> for CrossSink<'_, L, R, O> {
    fn push(&mut self, value: L) -> anyhow::Result<()> {
        self.enumerate(&value)
    }

    fn push_ref(&mut self, value: &L) -> anyhow::Result<()> {
        self.enumerate(value)
    }
}

impl<L, R: Send + Sync, O> PartitionTask<O> for CrossTask<L, R, O> {
    fn partitions(&self) -> usize {
        self.outer.partitions()
    }

    fn run(
        &self,
        partition: usize,
        ctx: &TaskContext<'_>,
        sink: &mut dyn ElementSink<O>,
    ) -> anyhow::Result<()> {
        let mut cross = CrossSink {
            broadcast: self.broadcast.as_slice(),
            func: self.func.as_ref(),
            scratch: None,
            reuse: ctx.object_reuse(),
            out: sink,
        };
        self.outer.run(partition, ctx, &mut cross)
    }

    fn count(&self, partition: usize, ctx: &TaskContext<'_>) -> anyhow::Result<u64> {
        if !self.func.one_per_pair() {
            return count_by_running::<O, _>(self, partition, ctx);
        }
        let outer = self.outer.count(partition, ctx)?;
        Ok(outer * self.broadcast.len() as u64)
    }
}

impl<A: Element> Dataset<A> {
    /// Cartesian product with `other`, broadcasting `other` to every partition of `self`.
    ///
    /// Produces exactly `self.count() * other.count()` pairs, duplicates included.
    /// Either side being empty yields an empty dataset.
    #[must_use]
    pub fn cross<B: Element>(&self, other: &Dataset<B>) -> Dataset<(A, B)> {
        self.cross_with_tiny(other)
    }

    /// [`cross`](Dataset::cross) with the broadcast side spelled out: `other` is small.
    #[must_use]
    pub fn cross_with_tiny<B: Element>(&self, other: &Dataset<B>) -> Dataset<(A, B)> {
        self.cross_node(
            Arc::clone(&self.node),
            Arc::clone(&other.node),
            Arc::new(PairCross),
            CrossHint::BroadcastSecond,
        )
    }

    /// Cartesian product broadcasting `self` to every partition of `other`.
    ///
    /// Elements are still `(a, b)`; the result is partitioned like `other`, and each partition
    /// emits its pairs ordered by its local `b` first, then by `a`.
    #[must_use]
    pub fn cross_with_huge<B: Element>(&self, other: &Dataset<B>) -> Dataset<(A, B)> {
        self.cross_node(
            Arc::clone(&other.node),
            Arc::clone(&self.node),
            Arc::new(Flip::<_, A, B>::new(PairCross)),
            CrossHint::BroadcastFirst,
        )
    }

    /// Apply `f` to every pair of the cartesian product, broadcasting `other`.
    ///
    /// An error from `f` fails the partition, and with it the whole action.
    #[must_use]
    pub fn cross_with<B, O, F>(&self, other: &Dataset<B>, f: F) -> Dataset<O>
    where
        B: Element,
        O: Element,
        F: Fn(&A, &B) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        self.cross_node(
            Arc::clone(&self.node),
            Arc::clone(&other.node),
            Arc::new(FnCross(f)),
            CrossHint::BroadcastSecond,
        )
    }

    fn cross_node<L, R, O>(
        &self,
        outer: Arc<dyn PlanNode<L>>,
        broadcast: Arc<dyn PlanNode<R>>,
        func: Arc<dyn CrossFn<L, R, O>>,
        hint: CrossHint,
    ) -> Dataset<O>
    where
        L: Element,
        R: Element,
        O: Element,
    {
        let node = CrossNode {
            id: self.env.next_node_id(),
            outer,
            broadcast,
            func,
            hint,
        };
        Dataset::from_node(self.env.clone(), Arc::new(node))
    }
}
