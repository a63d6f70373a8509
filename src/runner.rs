//! Partition-parallel execution of prepared tasks.
//!
//! The runner fans a [`PartitionTask`] out as one rayon task per partition and fans the
//! partial results back in on the calling (coordinator) thread through an mpsc channel:
//!
//! 1. every partition task computes its partial and sends `(partition, result)`;
//! 2. the coordinator offers each success to a [`GatherBuffer`];
//! 3. on the first failure it records the error, raises the shared cancellation flag, and
//!    drains the channel while siblings stop at their next element;
//! 4. once every task has reported, either the first error or the gathered result is returned.
//!
//! Panics inside a partition are caught and reported like any other task failure.

use crate::config::ExecutionConfig;
use crate::dataset::Element;
use crate::error::{DatasetError, Result, is_cancellation};
use crate::gather::{ConcatPartitions, GatherBuffer, GatherFn, SumCounts};
use crate::node::{ElementSink, PartitionTask, TaskContext};
use crate::node_id::JobId;
use anyhow::anyhow;
use rayon::ThreadPool;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use tracing::{debug, warn};

/// Executes prepared tasks for a single action invocation.
pub(crate) struct Runner {
    job_id: JobId,
    config: ExecutionConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl Runner {
    pub(crate) fn new(job_id: JobId, config: ExecutionConfig, pool: Option<Arc<ThreadPool>>) -> Self {
        Self {
            job_id,
            config,
            pool,
        }
    }

    pub(crate) fn job_id(&self) -> JobId {
        self.job_id
    }

    pub(crate) fn default_parallelism(&self) -> usize {
        self.config.parallelism
    }

    pub(crate) fn object_reuse(&self) -> bool {
        self.config.object_reuse
    }

    /// Total cardinality, using per-node count shortcuts where available.
    pub(crate) fn count<T: Element>(&self, task: &Arc<dyn PartitionTask<T>>) -> Result<u64> {
        self.fan_out::<T, u64, _, _>(task, |task, partition, ctx| task.count(partition, ctx), &SumCounts)
    }

    /// All elements, concatenated in ascending partition order.
    pub(crate) fn collect<T: Element>(&self, task: &Arc<dyn PartitionTask<T>>) -> Result<Vec<T>> {
        let gather = ConcatPartitions::new(self.config.max_collect_elements);
        self.fan_out::<T, Vec<T>, _, _>(
            task,
            |task, partition, ctx| {
                let mut sink = CollectSink::<T>::new(ctx);
                task.run(partition, ctx, &mut sink)?;
                Ok(sink.into_vec())
            },
            &gather,
        )
    }

    /// Stream every element to `visit` on the calling thread, partition after partition.
    ///
    /// The visitor is not `Sync`, so partitions are evaluated one at a time here; this is
    /// what lets the visitor borrow elements straight out of reused buffers.
    pub(crate) fn visit<T, F>(&self, task: &Arc<dyn PartitionTask<T>>, visit: F) -> Result<u64>
    where
        T: Element,
        F: FnMut(&T),
    {
        let cancelled = AtomicBool::new(false);
        let ctx = TaskContext::new(self.config.object_reuse, &cancelled);
        let mut sink = VisitSink { visit, seen: 0 };
        for partition in 0..task.partitions() {
            guarded(|| task.run(partition, &ctx, &mut sink))
                .map_err(|e| DatasetError::partition(partition, e))?;
        }
        Ok(sink.seen)
    }

    fn fan_out<T, P, W, G>(&self, task: &Arc<dyn PartitionTask<T>>, work: W, gather: &G) -> Result<G::Output>
    where
        T: Element,
        P: Send,
        W: Fn(&dyn PartitionTask<T>, usize, &TaskContext<'_>) -> anyhow::Result<P> + Sync,
        G: GatherFn<P>,
    {
        let partitions = task.partitions();
        let object_reuse = self.config.object_reuse;
        let cancelled = AtomicBool::new(false);
        let cancelled = &cancelled;
        let task: &dyn PartitionTask<T> = task.as_ref();
        let work = &work;

        let (buffer, first_error) = self.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, anyhow::Result<P>)>();
            for partition in 0..partitions {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let ctx = TaskContext::new(object_reuse, cancelled);
                    let outcome = guarded(|| {
                        ctx.check_cancelled()?;
                        work(task, partition, &ctx)
                    });
                    // The receiver outlives every sender: the coordinator drains until all are dropped.
                    let _ = tx.send((partition, outcome));
                });
            }
            drop(tx);

            let mut buffer = GatherBuffer::new(partitions);
            let mut first_error: Option<DatasetError> = None;
            for (partition, outcome) in rx {
                if first_error.is_some() {
                    continue;
                }
                let failure = match outcome {
                    Ok(partial) => buffer.offer(partition, partial, gather).err(),
                    Err(err) if is_cancellation(&err) => None,
                    Err(err) => Some(DatasetError::partition(partition, err)),
                };
                match failure {
                    None => debug!(
                        job_id = %self.job_id,
                        partition,
                        received = buffer.received(),
                        partitions,
                        "partition gathered"
                    ),
                    Some(err) => {
                        warn!(
                            job_id = %self.job_id,
                            partition,
                            error = %err,
                            "partition failed, cancelling siblings"
                        );
                        cancelled.store(true, Ordering::Relaxed);
                        first_error = Some(err);
                    }
                }
            }
            (buffer, first_error)
        });

        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(gather.finish(buffer.into_ordered()?))
    }

    fn in_place_scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R,
    {
        match &self.pool {
            Some(pool) => pool.in_place_scope(op),
            None => rayon::in_place_scope(op),
        }
    }
}

/// Run `f`, turning a panic into an ordinary task error.
fn guarded<R>(f: impl FnOnce() -> anyhow::Result<R>) -> anyhow::Result<R> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(anyhow!(
            "partition task panicked: {}",
            panic_message(payload.as_ref())
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Keeps every element of a partition. Borrowed elements are cloned out of their buffer.
struct CollectSink<'c, 'a, T> {
    ctx: &'c TaskContext<'a>,
    out: Vec<T>,
}

impl<'c, 'a, T> CollectSink<'c, 'a, T> {
    fn new(ctx: &'c TaskContext<'a>) -> Self {
        Self {
            ctx,
            out: Vec::new(),
        }
    }

    fn into_vec(self) -> Vec<T> {
        self.out
    }
}

impl<T: Clone> ElementSink<T> for CollectSink<'_, '_, T> {
    fn push(&mut self, value: T) -> anyhow::Result<()> {
        self.ctx.check_cancelled()?;
        self.out.push(value);
        Ok(())
    }

    fn push_ref(&mut self, value: &T) -> anyhow::Result<()> {
        self.ctx.check_cancelled()?;
        self.out.push(value.clone());
        Ok(())
    }
}

struct VisitSink<F> {
    visit: F,
    seen: u64,
}

impl<T, F: FnMut(&T)> ElementSink<T> for VisitSink<F> {
    fn push(&mut self, value: T) -> anyhow::Result<()> {
        (self.visit)(&value);
        self.seen += 1;
        Ok(())
    }

    fn push_ref(&mut self, value: &T) -> anyhow::Result<()> {
        (self.visit)(value);
        self.seen += 1;
        Ok(())
    }
}
