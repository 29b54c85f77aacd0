use anyhow::{ensure, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Bytes per sample of the 16-bit mono PCM the length estimate assumes.
pub const BYTES_PER_PCM_SAMPLE: u64 = 2;

/// Per-sample sequence lengths, index-aligned with a dataset.
///
/// The index is immutable once built and cheap to clone (`Arc<[u64]>`), so the
/// same lengths can back several samplers without copying.
///
/// # Example
/// ```ignore
/// let lengths = LengthIndex::from_lengths(vec![10, 50, 500, 1500]);
/// assert_eq!(lengths.get(2), Some(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthIndex {
    lengths: Arc<[u64]>,
}

impl LengthIndex {
    pub fn from_lengths(lengths: Vec<u64>) -> Self {
        Self {
            lengths: lengths.into(),
        }
    }

    /// Estimates spectrogram frame counts from the on-disk size of each audio file.
    ///
    /// See [`estimate_spec_length`] for what the estimate does and does not account for.
    ///
    /// # Errors
    /// - `hop_length` is zero.
    /// - Any file's metadata cannot be read.
    pub fn from_audio_files<P: AsRef<Path>>(paths: &[P], hop_length: u64) -> Result<Self> {
        ensure!(hop_length > 0, "hop_length must be > 0");
        let lengths = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let size = fs::metadata(path)
                    .with_context(|| format!("Failed to stat audio file: {}", path.display()))?
                    .len();
                Ok(estimate_spec_length(size, hop_length))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_lengths(lengths))
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        self.lengths.get(index).copied()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.lengths
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

impl From<Vec<u64>> for LengthIndex {
    fn from(lengths: Vec<u64>) -> Self {
        Self::from_lengths(lengths)
    }
}

/// Approximate spectrogram length of a 16-bit mono PCM file of `file_size` bytes:
/// `file_size / (2 * hop_length)`.
///
/// This is an estimate, not a decoded frame count. The container header is
/// counted as audio and the STFT edge frames are ignored, so the result can be
/// off by a few frames. It is only used to group similar lengths together.
pub fn estimate_spec_length(file_size: u64, hop_length: u64) -> u64 {
    file_size / (BYTES_PER_PCM_SAMPLE * hop_length)
}
