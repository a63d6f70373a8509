//! The execution environment: session state shared by every dataset built from it.
//!
//! An [`ExecutionEnvironment`] owns the [`ExecutionConfig`], hands out node and job ids,
//! keeps an optional dedicated worker pool, and records the outcome of the last action.
//! It is cheap to clone; clones share the same session.
//!
//! ```
//! use ironset::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = ExecutionEnvironment::new();
//! env.set_parallelism(5)?;
//! env.disable_object_reuse();
//!
//! let data = env.from_elements(1..=10);
//! assert_eq!(data.count()?, 10);
//!
//! let job = env.last_job_result().expect("count ran");
//! assert_eq!(job.action, ActionKind::Count);
//! assert_eq!(job.partitions, 5);
//! # Ok(())
//! # }
//! ```

use crate::config::{ExecutionConfig, parallelism_from};
use crate::dataset::{Dataset, Element};
use crate::error::{DatasetError, Result};
use crate::node::SourceNode;
use crate::node_id::{JobId, NodeId};
use crate::runner::Runner;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The kind of action a job ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Count,
    Collect,
    ForEach,
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(match self {
            Self::Count => "count",
            Self::Collect => "collect",
            Self::ForEach => "for_each",
        })
    }
}

/// Summary of a successfully completed action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobExecutionResult {
    pub job_id: JobId,
    pub action: ActionKind,
    /// Partitions of the dataset the action ran on.
    pub partitions: usize,
    /// Elements counted, collected or visited.
    pub elements: u64,
    pub net_runtime: Duration,
}

/// Session handle. See the [module docs](self).
pub struct ExecutionEnvironment {
    inner: Arc<Mutex<EnvironmentInner>>,
}

struct EnvironmentInner {
    config: ExecutionConfig,
    next_node: u64,
    next_job: u64,
    last_job: Option<JobExecutionResult>,
    pool: Option<(usize, Arc<ThreadPool>)>,
}

impl EnvironmentInner {
    /// Dedicated pool for the configured worker count, built on first use and cached.
    fn pool(&mut self) -> Result<Option<Arc<ThreadPool>>> {
        let Some(threads) = self.config.worker_threads else {
            return Ok(None);
        };
        if let Some((size, pool)) = &self.pool {
            if *size == threads {
                return Ok(Some(Arc::clone(pool)));
            }
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ironset-worker-{i}"))
            .build()
            .map_err(|e| DatasetError::Configuration(format!("cannot build worker pool: {e}")))?;
        let pool = Arc::new(pool);
        self.pool = Some((threads, Arc::clone(&pool)));
        Ok(Some(pool))
    }
}

impl Default for ExecutionEnvironment {
    fn default() -> Self {
        Self::from_parts(ExecutionConfig::default())
    }
}

impl Clone for ExecutionEnvironment {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ExecutionEnvironment {
    /// New session with [`ExecutionConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New session with an explicit config.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] if `config` is invalid.
    pub fn with_config(config: ExecutionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: ExecutionConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EnvironmentInner {
                config,
                next_node: 0,
                next_job: 0,
                last_job: None,
                pool: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnvironmentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current config.
    #[must_use]
    pub fn config(&self) -> ExecutionConfig {
        self.lock().config.clone()
    }

    /// Replace the whole config. Affects actions started afterwards.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] if `config` is invalid; the old config stays.
    pub fn set_config(&self, config: ExecutionConfig) -> Result<()> {
        config.validate()?;
        self.lock().config = config;
        Ok(())
    }

    /// Default partition count for datasets without an explicit parallelism.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] if `n` is zero or negative.
    pub fn set_parallelism<P>(&self, n: P) -> Result<()>
    where
        P: TryInto<usize> + Copy + Display,
    {
        let n = parallelism_from(n)?;
        self.lock().config.parallelism = n;
        Ok(())
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.lock().config.parallelism
    }

    /// Session-wide object-reuse switch for all subsequent actions.
    pub fn set_object_reuse(&self, enabled: bool) {
        self.lock().config.object_reuse = enabled;
    }

    pub fn enable_object_reuse(&self) {
        self.set_object_reuse(true);
    }

    pub fn disable_object_reuse(&self) {
        self.set_object_reuse(false);
    }

    #[must_use]
    pub fn is_object_reuse_enabled(&self) -> bool {
        self.lock().config.object_reuse
    }

    /// Bound the number of elements a single `collect()` may gather.
    pub fn set_max_collect_elements(&self, limit: Option<usize>) {
        self.lock().config.max_collect_elements = limit;
    }

    /// Run partition tasks on a dedicated pool of `threads` workers, or on the global pool.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] for `Some(0)`.
    pub fn set_worker_threads(&self, threads: Option<usize>) -> Result<()> {
        if threads == Some(0) {
            return Err(DatasetError::Configuration(
                "worker_threads must be at least 1 when set".to_string(),
            ));
        }
        self.lock().config.worker_threads = threads;
        Ok(())
    }

    /// Dataset whose elements are exactly `elements`, in order.
    pub fn from_elements<T, I>(&self, elements: I) -> Dataset<T>
    where
        T: Element,
        I: IntoIterator<Item = T>,
    {
        self.from_vec(elements.into_iter().collect())
    }

    /// Dataset over an owned vector.
    pub fn from_vec<T: Element>(&self, data: Vec<T>) -> Dataset<T> {
        let node = SourceNode::new(self.next_node_id(), data);
        Dataset::from_node(self.clone(), Arc::new(node))
    }

    /// Summary of the most recent successful action, if any.
    #[must_use]
    pub fn last_job_result(&self) -> Option<JobExecutionResult> {
        self.lock().last_job.clone()
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        let mut g = self.lock();
        let id = NodeId::new(g.next_node);
        g.next_node += 1;
        id
    }

    /// Run one action: snapshot config, build the runner, execute `body`, record the outcome.
    ///
    /// `body` returns the action result and the partition count it ran with; `elements`
    /// measures the result for the job summary.
    pub(crate) fn run_action<R>(
        &self,
        action: ActionKind,
        body: impl FnOnce(&Runner) -> Result<(R, usize)>,
        elements: impl FnOnce(&R) -> u64,
    ) -> Result<R> {
        let runner = {
            let mut g = self.lock();
            g.config.validate()?;
            let job_id = JobId::new(g.next_job);
            g.next_job += 1;
            let pool = g.pool()?;
            Runner::new(job_id, g.config.clone(), pool)
        };
        let job_id = runner.job_id();
        info!(
            job_id = %job_id,
            action = %action,
            parallelism = runner.default_parallelism(),
            object_reuse = runner.object_reuse(),
            "action started"
        );

        let started = Instant::now();
        let (result, partitions) = match body(&runner) {
            Ok(done) => done,
            Err(err) => {
                warn!(job_id = %job_id, action = %action, error = %err, "action failed");
                return Err(err);
            }
        };
        let net_runtime = started.elapsed();
        let elements = elements(&result);
        info!(
            job_id = %job_id,
            action = %action,
            partitions,
            elements,
            elapsed_ms = net_runtime.as_millis() as u64,
            "action finished"
        );

        self.lock().last_job = Some(JobExecutionResult {
            job_id,
            action,
            partitions,
            elements,
            net_runtime,
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_session_state() {
        let env = ExecutionEnvironment::new();
        let other = env.clone();
        other.set_parallelism(7).unwrap();
        assert_eq!(env.parallelism(), 7);
        assert_ne!(env.next_node_id(), other.next_node_id());
    }

    #[test]
    fn invalid_settings_leave_config_untouched() {
        let env = ExecutionEnvironment::new();
        env.set_parallelism(3).unwrap();
        assert!(matches!(env.set_parallelism(0), Err(DatasetError::Configuration(_))));
        assert!(matches!(env.set_parallelism(-2), Err(DatasetError::Configuration(_))));
        assert!(env.set_worker_threads(Some(0)).is_err());
        assert_eq!(env.parallelism(), 3);
        assert_eq!(env.config().worker_threads, None);
    }

    #[test]
    fn with_config_validates() {
        let bad = ExecutionConfig {
            parallelism: 0,
            ..ExecutionConfig::default()
        };
        assert!(ExecutionEnvironment::with_config(bad).is_err());
    }

    #[test]
    fn worker_pool_is_cached_per_size() -> Result<()> {
        let env = ExecutionEnvironment::new();
        env.set_worker_threads(Some(2))?;
        let first = env.lock().pool()?;
        let second = env.lock().pool()?;
        match (first, second) {
            (Some(a), Some(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected a dedicated pool"),
        }
        env.set_worker_threads(None)?;
        assert!(env.lock().pool()?.is_none());
        Ok(())
    }
}
