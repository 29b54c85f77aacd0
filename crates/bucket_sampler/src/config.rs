//! src/config.rs
//!
//! Configuration for the distributed bucket sampler.
//!
//! Example:
//! ```ignore
//! let config = BucketSamplerConfig::builder()
//!     .boundaries(vec![32, 300, 400, 500, 600, 700, 800, 900, 1000])
//!     .batch_size(16)
//!     .shuffle(true)
//!     .build();
//! ```
//!
//! `num_replicas` and `rank` default to the distributed launcher's
//! `WORLD_SIZE` / `RANK` variables (a single-process job when unset). Set them
//! explicitly when the sampler is built outside a launched job, e.g. in tests.
//!
//! The same options can be read from JSON:
//! ```json
//! { "boundaries": [32, 300, 1000], "batch_size": 16, "shuffle": true, "seed": 0 }
//! ```

use crate::error::SamplerError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable holding the number of processes in the job.
pub const WORLD_SIZE_VAR: &str = "WORLD_SIZE";
/// Environment variable holding this process's rank in the job.
pub const RANK_VAR: &str = "RANK";

/// Configuration for `DistributedBucketSampler`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BucketSamplerConfig {
    /// Strictly increasing length thresholds, e.g. `[32, 300, 400, ..., 1000]`
    pub boundaries: Vec<u64>,
    /// Number of samples per batch (defaults to 1)
    pub batch_size: usize,
    /// Replicas in the job (defaults to `WORLD_SIZE`, else 1)
    pub num_replicas: Option<usize>,
    /// This replica's rank (defaults to `RANK`, else 0)
    pub rank: Option<usize>,
    /// Whether to shuffle bucket members and batch order every epoch (defaults to true)
    pub shuffle: bool,
    /// Base seed added to the epoch when seeding the shared generator.
    /// Must be identical on every replica. Default: 0, i.e. the seed is the epoch.
    pub seed: u64,
}

impl Default for BucketSamplerConfig {
    fn default() -> Self {
        Self {
            boundaries: Vec::new(),
            batch_size: 1,
            num_replicas: None,
            rank: None,
            shuffle: true,
            seed: 0,
        }
    }
}

impl BucketSamplerConfig {
    pub fn builder() -> BucketSamplerConfigBuilder {
        BucketSamplerConfigBuilder::default()
    }

    /// Parses a configuration from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid bucket sampler configuration JSON")
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sampler config: {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("In file {}", path.display()))
    }

    /// Resolves `(num_replicas, rank)`, reading the launcher environment only
    /// for the values that were not set explicitly.
    pub fn resolve_replicas(&self) -> Result<(usize, usize)> {
        match (self.num_replicas, self.rank) {
            (Some(num_replicas), Some(rank)) => Ok((num_replicas, rank)),
            _ => Ok(self.resolve_replicas_with(DistributedContext::from_env()?)),
        }
    }

    /// Resolves `(num_replicas, rank)` against an explicit context.
    pub fn resolve_replicas_with(&self, context: DistributedContext) -> (usize, usize) {
        (
            self.num_replicas.unwrap_or(context.world_size),
            self.rank.unwrap_or(context.rank),
        )
    }
}

/// Builder for BucketSamplerConfig with method chaining
#[derive(Default)]
pub struct BucketSamplerConfigBuilder {
    config: BucketSamplerConfig,
}

impl BucketSamplerConfigBuilder {
    /// Set the length boundaries (at least 2, strictly increasing)
    pub fn boundaries(mut self, boundaries: Vec<u64>) -> Self {
        self.config.boundaries = boundaries;
        self
    }

    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the number of replicas, overriding `WORLD_SIZE`
    pub fn num_replicas(mut self, num_replicas: usize) -> Self {
        self.config.num_replicas = Some(num_replicas);
        self
    }

    /// Set this replica's rank, overriding `RANK`
    pub fn rank(mut self, rank: usize) -> Self {
        self.config.rank = Some(rank);
        self
    }

    /// Set whether to shuffle every epoch
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Set the base seed shared by all replicas.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> BucketSamplerConfig {
        self.config
    }
}

/// Replica layout of the current process as reported by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedContext {
    pub world_size: usize,
    pub rank: usize,
}

impl Default for DistributedContext {
    fn default() -> Self {
        Self {
            world_size: 1,
            rank: 0,
        }
    }
}

impl DistributedContext {
    /// Reads `WORLD_SIZE` and `RANK` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a context from any variable lookup. Unset variables fall back to
    /// a single-process job; set but unparseable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |var: &'static str, default: usize| -> Result<usize> {
            match lookup(var) {
                None => Ok(default),
                Some(value) => match value.trim().parse::<usize>() {
                    Ok(parsed) => Ok(parsed),
                    Err(_) => Err(SamplerError::InvalidEnvironment { var, value }.into()),
                },
            }
        };
        Ok(Self {
            world_size: parse(WORLD_SIZE_VAR, defaults.world_size)?,
            rank: parse(RANK_VAR, defaults.rank)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn builder_sets_fields() {
        let config = BucketSamplerConfig::builder()
            .boundaries(vec![32, 300, 1000])
            .batch_size(8)
            .num_replicas(4)
            .rank(3)
            .shuffle(false)
            .seed(7)
            .build();
        assert_eq!(config.boundaries, vec![32, 300, 1000]);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.resolve_replicas_with(DistributedContext::default()), (4, 3));
        assert!(!config.shuffle);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn defaults_shuffle_on_and_single_process() {
        let config = BucketSamplerConfig::default();
        assert!(config.shuffle);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.seed, 0);
        assert_eq!(config.resolve_replicas_with(DistributedContext::default()), (1, 0));
    }

    #[test]
    fn explicit_values_override_launcher_context() {
        let context = DistributedContext {
            world_size: 8,
            rank: 5,
        };
        let config = BucketSamplerConfig::builder().rank(1).build();
        assert_eq!(config.resolve_replicas_with(context), (8, 1));
    }

    #[test]
    fn context_reads_launcher_variables() -> Result<()> {
        let context =
            DistributedContext::from_lookup(lookup(&[("WORLD_SIZE", "4"), ("RANK", " 2 ")]))?;
        assert_eq!(
            context,
            DistributedContext {
                world_size: 4,
                rank: 2
            }
        );
        assert_eq!(
            DistributedContext::from_lookup(lookup(&[]))?,
            DistributedContext::default()
        );
        Ok(())
    }

    #[test]
    fn context_rejects_garbage_values() {
        let err = DistributedContext::from_lookup(lookup(&[("RANK", "two")])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SamplerError>(),
            Some(&SamplerError::InvalidEnvironment {
                var: "RANK",
                value: "two".to_string()
            })
        );
    }

    #[test]
    fn parses_json_with_defaults() -> Result<()> {
        let config =
            BucketSamplerConfig::from_json_str(r#"{"boundaries": [32, 300], "batch_size": 4}"#)?;
        assert_eq!(config.boundaries, vec![32, 300]);
        assert_eq!(config.batch_size, 4);
        assert!(config.shuffle);
        assert_eq!(config.num_replicas, None);

        assert!(BucketSamplerConfig::from_json_str(r#"{"batch_sise": 4}"#).is_err());
        Ok(())
    }

    #[test]
    fn reads_json_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"{{"boundaries": [32, 300, 1000], "batch_size": 2,
                "num_replicas": 2, "rank": 1, "shuffle": false}}"#
        )?;
        let config = BucketSamplerConfig::from_json_file(file.path())?;
        assert_eq!(config.resolve_replicas()?, (2, 1));
        assert!(!config.shuffle);
        Ok(())
    }
}
