use crate::lengths::LengthIndex;
use crate::readers::{FilelistEntry, FilelistSource};
use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Seed used to shuffle file-list order before lengths are computed.
pub const DEFAULT_FILELIST_SHUFFLE_SEED: u64 = 1234;

/// A `DataSource` streams raw records from some backing store (a file, a
/// directory, an object store, ...).
pub trait DataSource<T>: Send + Sync {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<T>> + Send>>;
}

/// A dataset that can report a length for each of its samples.
///
/// This is everything the bucket sampler needs from a dataset: the lengths
/// must be index-aligned with the dataset and fixed for the whole run.
pub trait LengthDataset: Send + Sync {
    fn lengths(&self) -> &LengthIndex;

    fn len(&self) -> usize {
        self.lengths().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LengthDataset for LengthIndex {
    fn lengths(&self) -> &LengthIndex {
        self
    }
}

/// An audio training set described by a file-list, with spectrogram lengths
/// estimated from file sizes.
///
/// Entries are stored in an `Arc<[FilelistEntry]>`, so cloning is cheap and
/// the dataset can be shared read-only between threads.
///
/// # Example
/// ```ignore
/// let dataset = AudioFilelistDataset::builder("filelists/train.txt", 512)
///     .shuffle_seed(Some(1234))
///     .load()?;
/// let sampler = DistributedBucketSampler::from_dataset(&dataset, &config)?;
/// for batch in sampler.iter(epoch) {
///     let entries: Vec<_> = batch.iter().filter_map(|&i| dataset.get(i)).collect();
///     // decode + pad in the collation stage
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AudioFilelistDataset {
    entries: Arc<[FilelistEntry]>,
    lengths: LengthIndex,
    hop_length: u64,
}

impl AudioFilelistDataset {
    pub fn builder(path: impl AsRef<Path>, hop_length: u64) -> AudioFilelistDatasetBuilder {
        AudioFilelistDatasetBuilder {
            source: FilelistSource::new(path.as_ref()),
            hop_length,
            shuffle_seed: Some(DEFAULT_FILELIST_SHUFFLE_SEED),
        }
    }

    /// Builds a dataset from entries already in memory, reading each audio
    /// file's size to estimate its length.
    pub fn from_entries(entries: Vec<FilelistEntry>, hop_length: u64) -> Result<Self> {
        let paths: Vec<&Path> = entries.iter().map(|e| e.audio_path.as_path()).collect();
        let lengths = LengthIndex::from_audio_files(&paths, hop_length)?;
        Ok(Self {
            entries: entries.into(),
            lengths,
            hop_length,
        })
    }

    /// Entry at `index`, for the collation stage to decode.
    pub fn get(&self, index: usize) -> Option<&FilelistEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FilelistEntry] {
        &self.entries
    }

    pub fn hop_length(&self) -> u64 {
        self.hop_length
    }
}

impl LengthDataset for AudioFilelistDataset {
    fn lengths(&self) -> &LengthIndex {
        &self.lengths
    }
}

/// Loads an [`AudioFilelistDataset`].
pub struct AudioFilelistDatasetBuilder {
    source: FilelistSource,
    hop_length: u64,
    shuffle_seed: Option<u64>,
}

impl AudioFilelistDatasetBuilder {
    /// Seed for shuffling the file-list order once at load time.
    /// `None` keeps file order. Defaults to `Some(1234)`.
    pub fn shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    pub fn load(self) -> Result<AudioFilelistDataset> {
        ensure!(self.hop_length > 0, "hop_length must be > 0");
        let mut entries: Vec<FilelistEntry> = self.source.stream()?.collect::<Result<_>>()?;
        if let Some(seed) = self.shuffle_seed {
            entries.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        }
        let dataset = AudioFilelistDataset::from_entries(entries, self.hop_length)?;
        info!(
            entries = dataset.len(),
            hop_length = self.hop_length,
            shuffled = self.shuffle_seed.is_some(),
            "loaded audio file-list"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};

    // Writes `sizes.len()` fake wav files plus a file-list pointing at them.
    fn write_corpus(dir: &TempDir, sizes: &[usize]) -> Result<NamedTempFile> {
        let mut filelist = NamedTempFile::new_in(dir.path())?;
        for (i, &size) in sizes.iter().enumerate() {
            let path = dir.path().join(format!("{i}.wav"));
            std::fs::write(&path, vec![0u8; size])?;
            writeln!(filelist, "{}|{i}|{i}.npy", path.display())?;
        }
        Ok(filelist)
    }

    #[test]
    fn loads_lengths_in_file_order() -> Result<()> {
        let dir = TempDir::new()?;
        let filelist = write_corpus(&dir, &[1024, 4096, 512])?;

        let dataset = AudioFilelistDataset::builder(filelist.path(), 128)
            .shuffle_seed(None)
            .load()?;
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.lengths().as_slice(), &[4, 16, 2]);
        assert_eq!(
            dataset.get(1).map(|e| e.fields.clone()),
            Some(vec!["1".to_string(), "1.npy".to_string()])
        );
        assert!(dataset.get(3).is_none());
        Ok(())
    }

    #[test]
    fn seeded_shuffle_is_reproducible_and_keeps_lengths_aligned() -> Result<()> {
        let dir = TempDir::new()?;
        let sizes: Vec<usize> = (1..=20).map(|i| i * 256).collect();
        let filelist = write_corpus(&dir, &sizes)?;

        let a = AudioFilelistDataset::builder(filelist.path(), 128).load()?;
        let b = AudioFilelistDataset::builder(filelist.path(), 128).load()?;
        assert_eq!(a.entries(), b.entries());

        let file_order: Vec<PathBuf> = (0..20)
            .map(|i| dir.path().join(format!("{i}.wav")))
            .collect();
        let loaded: Vec<PathBuf> = a.entries().iter().map(|e| e.audio_path.clone()).collect();
        assert_ne!(loaded, file_order);

        for (entry, &length) in a.entries().iter().zip(a.lengths().as_slice()) {
            let size = std::fs::metadata(&entry.audio_path)?.len();
            assert_eq!(length, size / 256);
        }
        Ok(())
    }

    #[test]
    fn rejects_zero_hop_length() -> Result<()> {
        let dir = TempDir::new()?;
        let filelist = write_corpus(&dir, &[1024])?;
        assert!(AudioFilelistDataset::builder(filelist.path(), 0).load().is_err());
        Ok(())
    }

    #[test]
    fn length_index_is_a_length_dataset() {
        let index = LengthIndex::from_lengths(vec![1, 2, 3]);
        assert_eq!(LengthDataset::len(&index), 3);
        assert!(!LengthDataset::is_empty(&index));
    }
}
