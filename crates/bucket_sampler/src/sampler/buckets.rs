use crate::error::SamplerError;
use anyhow::{ensure, Result};
use tracing::{debug, info, warn};

/// ============================================================================
/// Groups sample indices into length buckets delimited by `boundaries`.
///
/// With `boundaries = [b0, b1, ..., bk]`, bucket `i` holds every sample whose
/// length lies in `(b_i, b_{i+1}]`. Samples with length `<= b0` or `> bk` are
/// discarded and never appear in any batch.
///
/// After classification, empty buckets are removed together with their upper
/// boundary, so `boundaries().len() == num_buckets() + 1` always holds.
///
/// Each bucket is then padded (in count only) up to the next multiple of
/// `num_replicas * batch_size`, which makes every replica receive the same
/// number of whole batches from every bucket.
///
/// # Worked example
/// ```text
/// boundaries = [32, 300, 1000], lengths = [10, 50, 500, 1500]
///
///   index 0 (len 10)   -> <= 32, discarded
///   index 1 (len 50)   -> (32, 300]    bucket 0
///   index 2 (len 500)  -> (300, 1000]  bucket 1
///   index 3 (len 1500) -> > 1000, discarded
///
/// buckets = [[1], [2]]
/// ```
///
/// The assignment is computed once and is read-only afterwards. The
/// boundary list is an owned copy, so pruning never leaks into the caller's
/// slice or into another sampler built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketAssignment {
    boundaries: Vec<u64>,
    buckets: Vec<Vec<usize>>,
    padded_counts: Vec<usize>,
    num_replicas: usize,
    batch_size: usize,
    num_discarded: usize,
}

impl BucketAssignment {
    /// Classifies every sample of `lengths` into a bucket.
    ///
    /// # Errors
    /// Fails with [`SamplerError::Configuration`] when:
    /// - `boundaries` has fewer than two entries or is not strictly increasing,
    /// - `batch_size` or `num_replicas` is zero,
    /// - no sample falls inside the boundaries.
    pub fn assign(
        lengths: &[u64],
        boundaries: &[u64],
        num_replicas: usize,
        batch_size: usize,
    ) -> Result<Self> {
        validate_boundaries(boundaries)?;
        ensure!(
            batch_size > 0,
            SamplerError::config(format!("batch_size must be > 0, but got batch_size={batch_size}"))
        );
        ensure!(
            num_replicas > 0,
            SamplerError::config("Number of replicas must be > 0")
        );
        let group_size = num_replicas.checked_mul(batch_size).ok_or_else(|| {
            SamplerError::config(format!(
                "num_replicas ({num_replicas}) x batch_size ({batch_size}) overflows"
            ))
        })?;

        let mut boundaries = boundaries.to_vec();
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); boundaries.len() - 1];
        let mut num_discarded = 0;
        for (index, &length) in lengths.iter().enumerate() {
            match find_bucket(&boundaries, length) {
                Some(bucket) => buckets[bucket].push(index),
                None => num_discarded += 1,
            }
        }

        // Walk backwards so removals do not shift the buckets still to visit.
        for i in (0..buckets.len()).rev() {
            if buckets[i].is_empty() {
                buckets.remove(i);
                let upper = boundaries.remove(i + 1);
                debug!(bucket = i, upper_boundary = upper, "pruned empty bucket");
            }
        }

        ensure!(
            !buckets.is_empty(),
            SamplerError::config(format!(
                "no sample length falls within boundaries ({} of {} samples discarded)",
                num_discarded,
                lengths.len()
            ))
        );

        let padded_counts: Vec<usize> = buckets
            .iter()
            .map(|bucket| padded_count(bucket.len(), group_size))
            .collect();

        let assignment = Self {
            boundaries,
            buckets,
            padded_counts,
            num_replicas,
            batch_size,
            num_discarded,
        };

        let num_samples = assignment.num_samples();
        ensure!(
            num_samples % batch_size == 0,
            SamplerError::config(format!(
                "per-replica sample count {num_samples} is not a multiple of {batch_size}"
            ))
        );

        if num_discarded > 0 {
            warn!(
                discarded = num_discarded,
                total = lengths.len(),
                "samples outside length boundaries were discarded"
            );
        }
        for (i, bucket) in assignment.buckets.iter().enumerate() {
            debug!(
                bucket = i,
                lower = assignment.boundaries[i],
                upper = assignment.boundaries[i + 1],
                members = bucket.len(),
                padded = assignment.padded_counts[i],
                "bucket assigned"
            );
        }
        info!(
            buckets = assignment.num_buckets(),
            assigned = assignment.num_assigned(),
            discarded = num_discarded,
            num_samples,
            batches_per_replica = assignment.num_batches(),
            "bucket assignment complete"
        );

        Ok(assignment)
    }

    /// Bucket a length would fall into under the (pruned) boundaries.
    pub fn bucket_of(&self, length: u64) -> Option<usize> {
        find_bucket(&self.boundaries, length)
    }

    /// Boundaries after pruning; always `num_buckets() + 1` long.
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Members of each surviving bucket, in dataset order.
    pub fn buckets(&self) -> &[Vec<usize>] {
        &self.buckets
    }

    pub fn padded_counts(&self) -> &[usize] {
        &self.padded_counts
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_replicas(&self) -> usize {
        self.num_replicas
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_discarded(&self) -> usize {
        self.num_discarded
    }

    pub fn num_assigned(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Sum of all padded bucket counts, across every replica.
    pub fn total_size(&self) -> usize {
        self.padded_counts.iter().sum()
    }

    /// Samples each replica sees per epoch.
    pub fn num_samples(&self) -> usize {
        self.total_size() / self.num_replicas
    }

    /// Batches each replica sees per epoch.
    pub fn num_batches(&self) -> usize {
        self.num_samples() / self.batch_size
    }
}

/// Locates the interval `(boundaries[i], boundaries[i + 1]]` containing `length`.
///
/// Returns `None` when `length <= boundaries[0]`, `length > boundaries[last]`,
/// or there are fewer than two boundaries. `boundaries` must be strictly
/// increasing. Runs in `O(log k)` for `k` intervals.
pub fn find_bucket(boundaries: &[u64], length: u64) -> Option<usize> {
    let mut lo = 0;
    let mut hi = boundaries.len().saturating_sub(1);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if boundaries[mid] < length && length <= boundaries[mid + 1] {
            return Some(mid);
        } else if length <= boundaries[mid] {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    None
}

/// Rounds `len` up to the next multiple of `group_size` (a no-op if already a multiple).
pub fn padded_count(len: usize, group_size: usize) -> usize {
    len + (group_size - len % group_size) % group_size
}

fn validate_boundaries(boundaries: &[u64]) -> Result<()> {
    ensure!(
        boundaries.len() >= 2,
        SamplerError::config(format!(
            "at least 2 boundaries are required, but got {}",
            boundaries.len()
        ))
    );
    if let Some(pair) = boundaries.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(SamplerError::config(format!(
            "boundaries must be strictly increasing, but found {} followed by {}",
            pair[0], pair[1]
        ))
        .into());
    }
    Ok(())
}
