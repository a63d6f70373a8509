//! Session-scoped execution configuration.
//!
//! An [`ExecutionConfig`] is owned by an
//! [`ExecutionEnvironment`](crate::environment::ExecutionEnvironment) and snapshotted at
//! the start of every action, so changing it only affects actions started afterwards.
//!
//! Configs can be built in code or loaded from JSON:
//!
//! ```
//! use ironset::ExecutionConfig;
//!
//! let cfg = ExecutionConfig::from_json_str(r#"{ "parallelism": 5, "object_reuse": false }"#).unwrap();
//! assert_eq!(cfg.parallelism, 5);
//! assert!(!cfg.object_reuse);
//! ```

use crate::error::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::Path;

/// Execution settings applied to every action of an environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Default number of partitions for datasets without an explicit parallelism.
    pub parallelism: usize,
    /// Whether the pipeline may hand elements to sinks by reference from reused buffers
    /// instead of allocating a fresh value per element.
    pub object_reuse: bool,
    /// Upper bound on the number of elements a single `collect()` may gather.
    pub max_collect_elements: Option<usize>,
    /// Size of a dedicated worker pool. `None` runs partition tasks on the global rayon pool.
    pub worker_threads: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get().max(1),
            object_reuse: false,
            max_collect_elements: None,
            worker_threads: None,
        }
    }
}

impl ExecutionConfig {
    /// Set the default parallelism.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] if `n` is zero or negative.
    pub fn with_parallelism<P>(mut self, n: P) -> Result<Self>
    where
        P: TryInto<usize> + Copy + Display,
    {
        self.parallelism = parallelism_from(n)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_object_reuse(mut self, enabled: bool) -> Self {
        self.object_reuse = enabled;
        self
    }

    #[must_use]
    pub fn with_max_collect_elements(mut self, limit: Option<usize>) -> Self {
        self.max_collect_elements = limit;
        self
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: Option<usize>) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Check the invariants every action relies on.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] for a zero parallelism or a zero-sized worker pool.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(DatasetError::Configuration(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(DatasetError::Configuration(
                "worker_threads must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] on malformed JSON, unknown fields, or
    /// invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| DatasetError::Configuration(format!("config parse failed: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    ///
    /// # Errors
    /// Returns [`DatasetError::Configuration`] if the file cannot be read or is invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DatasetError::Configuration(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}

/// Convert a user-supplied parallelism into a positive partition count.
pub(crate) fn parallelism_from<P>(n: P) -> Result<usize>
where
    P: TryInto<usize> + Copy + Display,
{
    match n.try_into() {
        Ok(0) | Err(_) => Err(DatasetError::Configuration(format!(
            "parallelism must be a positive integer, got {n}"
        ))),
        Ok(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_explicit_and_valid() {
        let cfg = ExecutionConfig::default();
        assert!(cfg.parallelism >= 1);
        assert!(!cfg.object_reuse);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_parallelism() {
        assert!(matches!(parallelism_from(0), Err(DatasetError::Configuration(_))));
        assert!(matches!(parallelism_from(-3i32), Err(DatasetError::Configuration(_))));
        assert_eq!(parallelism_from(5u32).ok(), Some(5));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg = ExecutionConfig::from_json_str(r#"{ "object_reuse": true }"#).unwrap();
        assert!(cfg.object_reuse);
        assert_eq!(cfg.parallelism, ExecutionConfig::default().parallelism);
        assert_eq!(cfg.max_collect_elements, None);
    }

    #[test]
    fn json_rejects_zero_parallelism_and_unknown_fields() {
        assert!(ExecutionConfig::from_json_str(r#"{ "parallelism": 0 }"#).is_err());
        assert!(ExecutionConfig::from_json_str(r#"{ "paralelism": 2 }"#).is_err());
        assert!(ExecutionConfig::from_json_str(r#"{ "worker_threads": 0 }"#).is_err());
    }
}
