//! src/sampler/mod.rs
//!
//! Length-bucketed, replica-synchronized batch sampling.
//!
//! # Pipeline
//!
//! ```text
//!               ┌─────────────┐
//!               │ LengthIndex │ (one length per sample, fixed for the run)
//!               └──────┬──────┘
//!                      │ once, at construction
//!                      ↓
//!            ┌───────────────────┐
//!            │ BucketAssignment  │ (binary search into boundaries, prune empties,
//!            └─────────┬─────────┘  pad counts to num_replicas * batch_size)
//!                      │ every epoch, every rank
//!                      ↓
//!              ┌──────────────┐
//!              │ ShardPlanner │ (epoch-seeded permutation, wraparound padding,
//!              └──────┬───────┘  stride-`num_replicas` subsample from `rank`)
//!                     │
//!                     ↓
//!              ┌──────────────┐
//!              │ BatchBuilder │ (fixed-size chunks, optional batch-order shuffle)
//!              └──────┬───────┘
//!                     ↓
//!              [EpochBatches] → collation (outside this crate)
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/sampler/
//! ├── mod.rs          # `Sampler` trait + re-exports
//! ├── buckets.rs      # BucketAssignment and the boundary binary search
//! ├── shard.rs        # ShardPlanner, EpochPlan, epoch RNG derivation
//! ├── batch.rs        # BatchBuilder and the EpochBatches iterator
//! └── distributed.rs  # DistributedBucketSampler tying the stages together
//! ```
//!
//! # Determinism without communication
//! Every replica builds the same `BucketAssignment` from the same lengths and
//! seeds the same ChaCha8 generator from `seed + epoch`. The only per-replica
//! input is `rank`, which picks the stride offset. Replicas therefore agree on
//! every epoch's layout without exchanging any messages, as long as the caller
//! drives them through the same epoch numbers.

mod batch;
mod buckets;
mod distributed;
mod shard;

pub use batch::{BatchBuilder, EpochBatches};
pub use buckets::{find_bucket, padded_count, BucketAssignment};
pub use distributed::DistributedBucketSampler;
pub use shard::{epoch_rng, EpochPlan, ShardPlanner};

/// A `Sampler` defines the strategy for how to iterate and draw samples from
/// a dataset.
///
/// # Associated type
/// - `Item`: The handle yielded by the iterator. For the bucket sampler this is
///   a whole mini-batch of dataset indices (`Vec<usize>`).
///
/// # Method
/// - `iter(epoch)`: returns the sequence for that epoch.
///    - Callers pass the `epoch` explicitly; the sampler derives all of its
///      randomness from it, so the same epoch always replays the same order.
///
/// Implementations must be `Send + Sync` so the same sampler instance can be
/// shared across threads.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;
}
