use super::batch::EpochBatches;
use super::buckets::BucketAssignment;
use super::shard::{validate_rank, EpochPlan, ShardPlanner};
use super::Sampler;
use crate::config::BucketSamplerConfig;
use crate::dataset::LengthDataset;
use crate::lengths::LengthIndex;
use anyhow::Result;
use std::sync::Arc;

/// ============================================================================
/// A batch sampler that keeps similar lengths together and splits every epoch
/// evenly across `num_replicas` training processes.
///
/// # Arguments (via [`BucketSamplerConfig`]):
/// - `boundaries`: Strictly increasing length thresholds. Bucket `i` holds the
///   lengths in `(boundaries[i], boundaries[i + 1]]`; anything outside is dropped.
/// - `batch_size`: Number of indices per mini-batch.
/// - `num_replicas`: Total number of training processes (default: `WORLD_SIZE`).
/// - `rank`: This process's id, `0 <= rank < num_replicas` (default: `RANK`).
/// - `shuffle`: Shuffle bucket members and batch order every epoch (default: true).
/// - `seed`: Base seed shared by every replica (default: 0).
///
/// # Guarantees
/// - Every batch has exactly `batch_size` indices, all from one bucket.
/// - Every replica gets exactly `num_batches()` batches per epoch.
/// - For a fixed epoch the replicas' shards are disjoint positions of the same
///   padded tiling, so together they cover every kept sample at least once.
/// - `iter(epoch)` is a pure function of the lengths, the configuration and
///   `epoch`; calling it twice replays the same batches.
///
/// # Example
/// ```ignore
/// let config = BucketSamplerConfig::builder()
///     .boundaries(vec![32, 300, 400, 500, 600, 700, 800, 900, 1000])
///     .batch_size(16)
///     .build();
/// let sampler = DistributedBucketSampler::from_dataset(&dataset, &config)?;
///
/// for epoch in 0..num_epochs {
///     // Every replica must use the same `epoch` here.
///     for batch_indices in sampler.iter(epoch) {
///         // `batch_indices` is a Vec<usize> of length 16
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DistributedBucketSampler {
    assignment: Arc<BucketAssignment>,
    rank: usize,
    shuffle: bool,
    base_seed: u64,
}

impl DistributedBucketSampler {
    /// Buckets `lengths` and validates the replica layout.
    ///
    /// # Errors
    /// Any [`crate::SamplerError::Configuration`] raised by bucket assignment,
    /// an out-of-range `rank`, or an unparseable launcher environment.
    pub fn new(lengths: &LengthIndex, config: &BucketSamplerConfig) -> Result<Self> {
        let (num_replicas, rank) = config.resolve_replicas()?;
        let assignment = BucketAssignment::assign(
            lengths.as_slice(),
            &config.boundaries,
            num_replicas,
            config.batch_size,
        )?;
        validate_rank(rank, num_replicas)?;
        Ok(Self {
            assignment: Arc::new(assignment),
            rank,
            shuffle: config.shuffle,
            base_seed: config.seed,
        })
    }

    pub fn from_dataset<D: LengthDataset + ?Sized>(
        dataset: &D,
        config: &BucketSamplerConfig,
    ) -> Result<Self> {
        Self::new(dataset.lengths(), config)
    }

    /// A sampler for another rank sharing this one's bucket assignment.
    pub fn with_rank(&self, rank: usize) -> Result<Self> {
        validate_rank(rank, self.num_replicas())?;
        Ok(Self {
            assignment: Arc::clone(&self.assignment),
            rank,
            ..*self
        })
    }

    /// Plans this rank's shards for `epoch`.
    pub fn plan(&self, epoch: usize) -> Result<EpochPlan> {
        self.plan_for_rank(epoch, self.rank)
    }

    /// Plans any rank's shards for `epoch` without building a new sampler.
    pub fn plan_for_rank(&self, epoch: usize, rank: usize) -> Result<EpochPlan> {
        ShardPlanner::new(&self.assignment, self.shuffle, self.base_seed).plan(epoch, rank)
    }

    /// Plans and builds this rank's batches for `epoch`.
    pub fn epoch_batches(&self, epoch: usize) -> Result<EpochBatches> {
        self.plan(epoch)?.build()
    }

    pub fn assignment(&self) -> &BucketAssignment {
        &self.assignment
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn num_replicas(&self) -> usize {
        self.assignment.num_replicas()
    }

    pub fn batch_size(&self) -> usize {
        self.assignment.batch_size()
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn seed(&self) -> u64 {
        self.base_seed
    }

    pub fn total_size(&self) -> usize {
        self.assignment.total_size()
    }

    /// Indices this rank receives per epoch.
    pub fn num_samples(&self) -> usize {
        self.assignment.num_samples()
    }

    /// Batches this rank receives per epoch.
    pub fn num_batches(&self) -> usize {
        self.assignment.num_batches()
    }
}

impl Sampler for DistributedBucketSampler {
    type Item = Vec<usize>;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Vec<usize>> + Send + '_> {
        // The rank is validated at construction and the padding arithmetic
        // guarantees whole batches, so failing here means a logic bug.
        let batches = self
            .epoch_batches(epoch)
            .unwrap_or_else(|err| panic!("bucket sampler invariant violated: {err:#}"));
        Box::new(batches)
    }
}
