use crate::error::SamplerError;
use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// ============================================================================
/// Cuts per-bucket shards into fixed-size mini-batches.
///
/// - Each shard is split into contiguous chunks of exactly `batch_size`.
///   Shards are padded to a multiple of `batch_size` upstream, so nothing is
///   ever dropped here.
/// - Batches from all buckets are concatenated in bucket order, so every
///   batch draws from a single bucket.
/// - With `shuffle = true` the order of the batches is permuted. The contents
///   of each batch are left as they are.
#[derive(Debug, Clone, Copy)]
pub struct BatchBuilder {
    batch_size: usize,
    shuffle: bool,
}

impl BatchBuilder {
    pub fn new(batch_size: usize, shuffle: bool) -> Self {
        Self {
            batch_size,
            shuffle,
        }
    }

    /// Builds the batches for one epoch and rank.
    ///
    /// `rng` must be the epoch generator as left by the shard planner.
    ///
    /// # Errors
    /// Returns [`SamplerError::BatchCountMismatch`] if the batches do not add
    /// up to exactly `num_samples` indices. This means the padding or sharding
    /// arithmetic is broken and is never expected in practice.
    pub fn build<R: Rng + ?Sized>(
        &self,
        epoch: usize,
        rank: usize,
        shards: Vec<Vec<usize>>,
        num_samples: usize,
        rng: &mut R,
    ) -> Result<EpochBatches> {
        ensure!(
            self.batch_size > 0,
            SamplerError::config("batch_size must be > 0")
        );

        let mut batches: Vec<Vec<usize>> = Vec::with_capacity(num_samples / self.batch_size);
        for shard in &shards {
            batches.extend(
                shard
                    .chunks_exact(self.batch_size)
                    .map(|chunk| chunk.to_vec()),
            );
        }

        if self.shuffle {
            batches.shuffle(rng);
        }

        let total: usize = batches.iter().map(Vec::len).sum();
        ensure!(
            batches.len() * self.batch_size == num_samples && total == num_samples,
            SamplerError::BatchCountMismatch {
                batches: batches.len(),
                batch_size: self.batch_size,
                num_samples,
            }
        );

        debug!(epoch, rank, batches = batches.len(), "built epoch batches");

        Ok(EpochBatches {
            epoch,
            rank,
            batches: batches.into_iter(),
        })
    }
}

/// The batches of a single epoch for a single rank.
///
/// A finite, single-pass iterator: once consumed it cannot be restarted.
/// Plan the next epoch (or replay the same one) through the sampler.
#[derive(Debug)]
pub struct EpochBatches {
    epoch: usize,
    rank: usize,
    batches: std::vec::IntoIter<Vec<usize>>,
}

impl EpochBatches {
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl Iterator for EpochBatches {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.batches.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.batches.size_hint()
    }
}

impl ExactSizeIterator for EpochBatches {}
