//! Operator graph nodes and their per-partition tasks.
//!
//! A [`Dataset`](crate::Dataset) is a handle on an immutable tree of [`PlanNode`]s. Nothing
//! runs until an action is invoked; the action then asks the terminal node to
//! [`prepare`](PlanNode::prepare) itself, which yields a [`PartitionTask`] per node
//! (materializing cross broadcasts on the way), and hands the task to the runner.
//!
//! Inside a partition, elements are pushed through a chain of [`ElementSink`]s:
//! - [`ElementSink::push`] transfers a freshly produced value
//! - [`ElementSink::push_ref`] lends a value that lives in a reused buffer (a source slice or a
//!   scratch slot); the borrow ends when the call returns
//!
//! Which one a producer uses is decided by the object-reuse flag carried in [`TaskContext`].

use crate::error::{DatasetError, Result};
use crate::node_id::NodeId;
use crate::partition::partition_range;
use crate::planner::ExplainStep;
use crate::runner::Runner;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-action state shared by every partition task.
pub(crate) struct TaskContext<'a> {
    object_reuse: bool,
    cancelled: &'a AtomicBool,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(object_reuse: bool, cancelled: &'a AtomicBool) -> Self {
        Self {
            object_reuse,
            cancelled,
        }
    }

    pub(crate) fn object_reuse(&self) -> bool {
        self.object_reuse
    }

    /// Fail fast once the coordinator has aborted the action.
    pub(crate) fn check_cancelled(&self) -> anyhow::Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(DatasetError::Cancelled.into());
        }
        Ok(())
    }
}

/// Receiver of the elements a partition emits, in emission order.
pub(crate) trait ElementSink<T> {
    fn push(&mut self, value: T) -> anyhow::Result<()>;

    /// `value` is only valid for the duration of this call.
    fn push_ref(&mut self, value: &T) -> anyhow::Result<()>;
}

/// Counts elements without keeping them.
pub(crate) struct CountSink<'c, 'a> {
    ctx: &'c TaskContext<'a>,
    count: u64,
}

impl<'c, 'a> CountSink<'c, 'a> {
    pub(crate) fn new(ctx: &'c TaskContext<'a>) -> Self {
        Self { ctx, count: 0 }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

impl<T> ElementSink<T> for CountSink<'_, '_> {
    fn push(&mut self, _value: T) -> anyhow::Result<()> {
        self.ctx.check_cancelled()?;
        self.count += 1;
        Ok(())
    }

    fn push_ref(&mut self, _value: &T) -> anyhow::Result<()> {
        self.ctx.check_cancelled()?;
        self.count += 1;
        Ok(())
    }
}

/// A lazily-evaluated operator in a dataset graph.
pub(crate) trait PlanNode<T>: Send + Sync {
    fn id(&self) -> NodeId;

    /// Number of partitions this node produces under the given environment default.
    fn partitions(&self, default_parallelism: usize) -> usize;

    /// Build the runnable task for one action invocation.
    fn prepare(&self, runner: &Runner) -> Result<Arc<dyn PartitionTask<T>>>;

    /// Append this node's steps (upstream first) to `steps`.
    fn explain(&self, depth: usize, default_parallelism: usize, steps: &mut Vec<ExplainStep>);

    /// A copy of this node producing `parallelism` partitions natively, if it can.
    fn reparallelize(&self, _id: NodeId, _parallelism: usize) -> Option<Arc<dyn PlanNode<T>>> {
        None
    }
}

/// A prepared node, runnable once per partition.
pub(crate) trait PartitionTask<T>: Send + Sync {
    fn partitions(&self) -> usize;

    fn run(
        &self,
        partition: usize,
        ctx: &TaskContext<'_>,
        sink: &mut dyn ElementSink<T>,
    ) -> anyhow::Result<()>;

    /// Local cardinality of `partition`. Nodes override this when they can skip enumeration.
    fn count(&self, partition: usize, ctx: &TaskContext<'_>) -> anyhow::Result<u64> {
        count_by_running::<T, Self>(self, partition, ctx)
    }
}

pub(crate) fn count_by_running<T, P>(
    task: &P,
    partition: usize,
    ctx: &TaskContext<'_>,
) -> anyhow::Result<u64>
where
    P: PartitionTask<T> + ?Sized,
{
    let mut sink = CountSink::new(ctx);
    task.run(partition, ctx, &mut sink)?;
    Ok(sink.count())
}

// ---------------- Source ----------------

/// In-memory source, range-partitioned at execution time.
pub(crate) struct SourceNode<T> {
    id: NodeId,
    data: Arc<Vec<T>>,
    parallelism: Option<usize>,
}

impl<T> SourceNode<T> {
    pub(crate) fn new(id: NodeId, data: Vec<T>) -> Self {
        Self {
            id,
            data: Arc::new(data),
            parallelism: None,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> PlanNode<T> for SourceNode<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn partitions(&self, default_parallelism: usize) -> usize {
        self.parallelism.unwrap_or(default_parallelism)
    }

    fn prepare(&self, runner: &Runner) -> Result<Arc<dyn PartitionTask<T>>> {
        Ok(Arc::new(SourceTask {
            data: Arc::clone(&self.data),
            partitions: self.partitions(runner.default_parallelism()),
        }))
    }

    fn explain(&self, depth: usize, default_parallelism: usize, steps: &mut Vec<ExplainStep>) {
        let explicit = if self.parallelism.is_some() {
            "explicit"
        } else {
            "environment default"
        };
        steps.push(ExplainStep::new(
            self.id,
            depth,
            "Source",
            format!(
                "{} in-memory elements, range-assigned ({explicit} parallelism)",
                self.data.len()
            ),
            self.partitions(default_parallelism),
        ));
    }

    fn reparallelize(&self, id: NodeId, parallelism: usize) -> Option<Arc<dyn PlanNode<T>>> {
        Some(Arc::new(SourceNode {
            id,
            data: Arc::clone(&self.data),
            parallelism: Some(parallelism),
        }))
    }
}

struct SourceTask<T> {
    data: Arc<Vec<T>>,
    partitions: usize,
}

impl<T: Clone + Send + Sync> PartitionTask<T> for SourceTask<T> {
    fn partitions(&self) -> usize {
        self.partitions
    }

    fn run(
        &self,
        partition: usize,
        ctx: &TaskContext<'_>,
        sink: &mut dyn ElementSink<T>,
    ) -> anyhow::Result<()> {
        let range = partition_range(self.data.len(), self.partitions, partition);
        let reuse = ctx.object_reuse();
        for element in &self.data[range] {
            if reuse {
                sink.push_ref(element)?;
            } else {
                sink.push(element.clone())?;
            }
        }
        Ok(())
    }

    fn count(&self, partition: usize, _ctx: &TaskContext<'_>) -> anyhow::Result<u64> {
        let len = partition_range(self.data.len(), self.partitions, partition).len();
        Ok(len as u64)
    }
}

// ---------------- Element-wise ops ----------------

/// A per-element transformation applied inside a partition.
pub(crate) trait ElementOp<I, O>: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, input: &I, out: &mut dyn ElementSink<O>) -> anyhow::Result<()>;

    fn apply_owned(&self, input: I, out: &mut dyn ElementSink<O>) -> anyhow::Result<()> {
        self.apply(&input, out)
    }
}

pub(crate) struct MapOp<I, O, F> {
    f: F,
    fallible: bool,
    _t: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> MapOp<I, O, F> {
    pub(crate) fn new(f: F, fallible: bool) -> Self {
        Self {
            f,
            fallible,
            _t: PhantomData,
        }
    }
}

impl<I, O, F> ElementOp<I, O> for MapOp<I, O, F>
where
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    fn name(&self) -> &'static str {
        if self.fallible { "TryMap" } else { "Map" }
    }

    fn apply(&self, input: &I, out: &mut dyn ElementSink<O>) -> anyhow::Result<()> {
        out.push((self.f)(input)?)
    }
}

pub(crate) struct FilterOp<T, P> {
    pred: P,
    _t: PhantomData<fn(&T)>,
}

impl<T, P> FilterOp<T, P> {
    pub(crate) fn new(pred: P) -> Self {
        Self {
            pred,
            _t: PhantomData,
        }
    }
}

impl<T, P> ElementOp<T, T> for FilterOp<T, P>
where
    P: Fn(&T) -> bool + Send + Sync,
{
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn apply(&self, input: &T, out: &mut dyn ElementSink<T>) -> anyhow::Result<()> {
        if (self.pred)(input) {
            out.push_ref(input)?;
        }
        Ok(())
    }

    fn apply_owned(&self, input: T, out: &mut dyn ElementSink<T>) -> anyhow::Result<()> {
        if (self.pred)(&input) {
            out.push(input)?;
        }
        Ok(())
    }
}

/// Adapts an [`ElementOp`] into the sink its upstream pushes into.
struct OpSink<'a, I, O> {
    op: &'a dyn ElementOp<I, O>,
    out: &'a mut dyn ElementSink<O>,
}

impl<I, O> ElementSink<I> for OpSink<'_, I, O> {
    fn push(&mut self, value: I) -> anyhow::Result<()> {
        self.op.apply_owned(value, self.out)
    }

    fn push_ref(&mut self, value: &I) -> anyhow::Result<()> {
        self.op.apply(value, self.out)
    }
}

pub(crate) struct StatelessNode<I, O> {
    id: NodeId,
    upstream: Arc<dyn PlanNode<I>>,
    op: Arc<dyn ElementOp<I, O>>,
}

impl<I, O> StatelessNode<I, O> {
    pub(crate) fn new(id: NodeId, upstream: Arc<dyn PlanNode<I>>, op: Arc<dyn ElementOp<I, O>>) -> Self {
        Self { id, upstream, op }
    }
}

impl<I: 'static, O: 'static> PlanNode<O> for StatelessNode<I, O> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn partitions(&self, default_parallelism: usize) -> usize {
        self.upstream.partitions(default_parallelism)
    }

    fn prepare(&self, runner: &Runner) -> Result<Arc<dyn PartitionTask<O>>> {
        Ok(Arc::new(StatelessTask {
            upstream: self.upstream.prepare(runner)?,
            op: Arc::clone(&self.op),
        }))
    }

    fn explain(&self, depth: usize, default_parallelism: usize, steps: &mut Vec<ExplainStep>) {
        self.upstream.explain(depth, default_parallelism, steps);
        steps.push(ExplainStep::new(
            self.id,
            depth,
            self.op.name(),
            format!("element-wise, fused into partition tasks of {}", self.upstream.id()),
            self.partitions(default_parallelism),
        ));
    }
}

struct StatelessTask<I, O> {
    upstream: Arc<dyn PartitionTask<I>>,
    op: Arc<dyn ElementOp<I, O>>,
}

impl<I, O> PartitionTask<O> for StatelessTask<I, O> {
    fn partitions(&self) -> usize {
        self.upstream.partitions()
    }

    fn run(
        &self,
        partition: usize,
        ctx: &TaskContext<'_>,
        sink: &mut dyn ElementSink<O>,
    ) -> anyhow::Result<()> {
        let mut adapter = OpSink {
            op: self.op.as_ref(),
            out: sink,
        };
        self.upstream.run(partition, ctx, &mut adapter)
    }
}

// ---------------- Rebalance ----------------

/// Changes the partition count of a derived dataset.
///
/// Output partition `j` concatenates upstream partitions `j, j + n, j + 2n, ...` in ascending
/// order. Surplus output partitions are empty when `n` exceeds the upstream count.
pub(crate) struct RebalanceNode<T> {
    id: NodeId,
    upstream: Arc<dyn PlanNode<T>>,
    parallelism: usize,
}

impl<T> RebalanceNode<T> {
    pub(crate) fn new(id: NodeId, upstream: Arc<dyn PlanNode<T>>, parallelism: usize) -> Self {
        Self {
            id,
            upstream,
            parallelism,
        }
    }
}

impl<T: 'static> PlanNode<T> for RebalanceNode<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn partitions(&self, _default_parallelism: usize) -> usize {
        self.parallelism
    }

    fn prepare(&self, runner: &Runner) -> Result<Arc<dyn PartitionTask<T>>> {
        Ok(Arc::new(RebalanceTask {
            upstream: self.upstream.prepare(runner)?,
            partitions: self.parallelism,
        }))
    }

    fn explain(&self, depth: usize, default_parallelism: usize, steps: &mut Vec<ExplainStep>) {
        self.upstream.explain(depth, default_parallelism, steps);
        steps.push(ExplainStep::new(
            self.id,
            depth,
            "Rebalance",
            format!(
                "{} upstream partitions -> {} (modulo assignment)",
                self.upstream.partitions(default_parallelism),
                self.parallelism
            ),
            self.parallelism,
        ));
    }

    fn reparallelize(&self, id: NodeId, parallelism: usize) -> Option<Arc<dyn PlanNode<T>>> {
        Some(Arc::new(RebalanceNode {
            id,
            upstream: Arc::clone(&self.upstream),
            parallelism,
        }))
    }
}

struct RebalanceTask<T> {
    upstream: Arc<dyn PartitionTask<T>>,
    partitions: usize,
}

impl<T> RebalanceTask<T> {
    fn upstream_partitions(&self, partition: usize) -> impl Iterator<Item = usize> {
        (partition..self.upstream.partitions()).step_by(self.partitions.max(1))
    }
}

impl<T> PartitionTask<T> for RebalanceTask<T> {
    fn partitions(&self) -> usize {
        self.partitions
    }

    fn run(
        &self,
        partition: usize,
        ctx: &TaskContext<'_>,
        sink: &mut dyn ElementSink<T>,
    ) -> anyhow::Result<()> {
        for upstream in self.upstream_partitions(partition) {
            self.upstream.run(upstream, ctx, sink)?;
        }
        Ok(())
    }

    fn count(&self, partition: usize, ctx: &TaskContext<'_>) -> anyhow::Result<u64> {
        let mut total = 0;
        for upstream in self.upstream_partitions(partition) {
            total += self.upstream.count(upstream, ctx)?;
        }
        Ok(total)
    }
}
