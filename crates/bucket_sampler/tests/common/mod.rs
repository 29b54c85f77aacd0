#![allow(dead_code)]

use anyhow::Result;
use bucket_sampler::{BucketSamplerConfig, DistributedBucketSampler, LengthIndex, Sampler};

/// Boundaries used across the integration tests.
pub const BOUNDARIES: [u64; 9] = [32, 300, 400, 500, 600, 700, 800, 900, 1000];

pub fn config(
    boundaries: &[u64],
    batch_size: usize,
    num_replicas: usize,
    rank: usize,
    shuffle: bool,
) -> BucketSamplerConfig {
    BucketSamplerConfig::builder()
        .boundaries(boundaries.to_vec())
        .batch_size(batch_size)
        .num_replicas(num_replicas)
        .rank(rank)
        .shuffle(shuffle)
        .build()
}

/// Deterministic pseudo-lengths in `0..1100`, so some fall outside `BOUNDARIES`.
pub fn synthetic_lengths(n: usize) -> LengthIndex {
    LengthIndex::from_lengths(
        (0..n as u64)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 7) % 1100)
            .collect(),
    )
}

/// Builds an independent sampler per rank, the way separate processes would,
/// and collects each rank's batches for `epoch`.
pub fn batches_per_rank(
    lengths: &LengthIndex,
    boundaries: &[u64],
    batch_size: usize,
    num_replicas: usize,
    shuffle: bool,
    epoch: usize,
) -> Result<Vec<Vec<Vec<usize>>>> {
    (0..num_replicas)
        .map(|rank| {
            let sampler = DistributedBucketSampler::new(
                lengths,
                &config(boundaries, batch_size, num_replicas, rank, shuffle),
            )?;
            Ok(sampler.iter(epoch).collect())
        })
        .collect()
}
