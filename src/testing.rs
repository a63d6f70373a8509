//! Testing utilities for Ironset datasets.
//!
//! - **Assertions**: compare action outputs in order or as multisets
//! - [`TestEnvironment`]: an [`ExecutionEnvironment`] with a fixed, explicit config, so tests
//!   do not depend on the host's CPU count
//!
//! # Quick Start
//!
//! ```
//! use ironset::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = TestEnvironment::new();
//! let doubled = env.from_vec(vec![1, 2, 3]).map(|x: &i32| x * 2).collect()?;
//! assert_collections_equal(&doubled, &[2, 4, 6]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;

pub use assertions::*;

use crate::config::ExecutionConfig;
use crate::environment::ExecutionEnvironment;
use crate::error::Result;
use std::ops::Deref;

/// Partitions a [`TestEnvironment`] uses unless told otherwise.
pub const TEST_PARALLELISM: usize = 4;

/// A test-focused wrapper around [`ExecutionEnvironment`].
///
/// Parallelism is pinned to [`TEST_PARALLELISM`] and object reuse is off. Everything else
/// is reachable through `Deref`.
#[derive(Clone)]
pub struct TestEnvironment {
    env: ExecutionEnvironment,
}

impl TestEnvironment {
    #[must_use]
    pub fn new() -> Self {
        let config = ExecutionConfig {
            parallelism: TEST_PARALLELISM,
            object_reuse: false,
            max_collect_elements: None,
            worker_threads: None,
        };
        Self {
            env: ExecutionEnvironment::with_config(config).unwrap_or_default(),
        }
    }

    /// Test environment with `n` default partitions.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`](crate::DatasetError::Configuration) for `n == 0`.
    pub fn with_parallelism(n: usize) -> Result<Self> {
        let env = Self::new();
        env.env.set_parallelism(n)?;
        Ok(env)
    }

    /// The same environment with object reuse switched on.
    #[must_use]
    pub fn reusing_objects(self) -> Self {
        self.env.enable_object_reuse();
        self
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestEnvironment {
    type Target = ExecutionEnvironment;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}
