use super::batch::{BatchBuilder, EpochBatches};
use super::buckets::BucketAssignment;
use crate::error::SamplerError;
use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Derives the generator shared by every replica for `epoch`.
///
/// Seed formula: `ChaCha8Rng::seed_from_u64(base_seed + epoch)` (wrapping).
/// ChaCha8 is used instead of `StdRng` because its output stream is fixed
/// across `rand` releases and platforms, which is what lets independently
/// launched replicas reproduce each other's permutations.
#[inline]
pub fn epoch_rng(base_seed: u64, epoch: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(epoch as u64))
}

pub(crate) fn validate_rank(rank: usize, num_replicas: usize) -> Result<()> {
    ensure!(
        rank < num_replicas,
        SamplerError::config(format!(
            "Invalid rank {rank}, rank should be in the interval [0, {}]",
            num_replicas.saturating_sub(1)
        ))
    );
    Ok(())
}

/// ============================================================================
/// Computes one replica's per-bucket shard for an epoch.
///
/// For each bucket, in bucket order:
/// 1. Permute the bucket's local positions with the epoch generator
///    (identity order when `shuffle = false`).
/// 2. Pad to the bucket's padded count by repeating the permuted sequence
///    from its start. No fresh randomness is drawn for the padding, so every
///    real sample appears once before any sample repeats.
/// 3. Keep every `num_replicas`-th position starting at `rank`.
///
/// # Worker allocation
/// - A bucket `[a, b, c]` with `num_replicas = 2`, `batch_size = 2` pads to 4:
/// ```text
/// permuted: [c, a, b]      (shuffle = true, for example)
/// padded:   [c, a, b, c]   (wraps around to the start)
///
///   Rank 0: [c, b]
///   Rank 1: [a, c]
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ShardPlanner<'a> {
    assignment: &'a BucketAssignment,
    shuffle: bool,
    base_seed: u64,
}

impl<'a> ShardPlanner<'a> {
    pub fn new(assignment: &'a BucketAssignment, shuffle: bool, base_seed: u64) -> Self {
        Self {
            assignment,
            shuffle,
            base_seed,
        }
    }

    /// Plans `rank`'s shards for `epoch`.
    ///
    /// # Errors
    /// Fails with [`SamplerError::Configuration`] if `rank >= num_replicas`.
    pub fn plan(&self, epoch: usize, rank: usize) -> Result<EpochPlan> {
        let num_replicas = self.assignment.num_replicas();
        validate_rank(rank, num_replicas)?;

        let mut rng = epoch_rng(self.base_seed, epoch);
        let shards: Vec<Vec<usize>> = self
            .assignment
            .buckets()
            .iter()
            .zip(self.assignment.padded_counts())
            .map(|(bucket, &padded)| {
                let mut positions: Vec<usize> = (0..bucket.len()).collect();
                if self.shuffle {
                    positions.shuffle(&mut rng);
                }
                positions
                    .iter()
                    .cycle()
                    .take(padded)
                    .skip(rank)
                    .step_by(num_replicas)
                    .map(|&position| bucket[position])
                    .collect()
            })
            .collect();

        trace!(epoch, rank, buckets = shards.len(), "planned epoch shards");

        Ok(EpochPlan {
            epoch,
            rank,
            shuffle: self.shuffle,
            batch_size: self.assignment.batch_size(),
            num_samples: self.assignment.num_samples(),
            shards,
            rng,
        })
    }
}

/// One replica's shards for one epoch, ready to be cut into batches.
///
/// Carries the epoch generator at the point the planner left it, so the
/// batch-order shuffle continues the same random stream on every replica.
#[derive(Debug, Clone)]
pub struct EpochPlan {
    epoch: usize,
    rank: usize,
    shuffle: bool,
    batch_size: usize,
    num_samples: usize,
    shards: Vec<Vec<usize>>,
    rng: ChaCha8Rng,
}

impl EpochPlan {
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Dataset indices assigned to this rank, one list per bucket.
    pub fn shards(&self) -> &[Vec<usize>] {
        &self.shards
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Cuts the shards into batches; see [`BatchBuilder::build`].
    pub fn build(self) -> Result<EpochBatches> {
        let Self {
            epoch,
            rank,
            shuffle,
            batch_size,
            num_samples,
            shards,
            mut rng,
        } = self;
        BatchBuilder::new(batch_size, shuffle).build(epoch, rank, shards, num_samples, &mut rng)
    }
}
