//! End-to-end: file-list on disk -> estimated lengths -> bucketed batches.

mod common;
use common::config;

use anyhow::Result;
use bucket_sampler::{
    AudioFilelistDataset, BucketSamplerConfig, DistributedBucketSampler, LengthDataset, Sampler,
};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const HOP_LENGTH: u64 = 256;

/// Writes one zero-filled "wav" per entry of `frames` sized so that its
/// estimated length is exactly that many frames, and a file-list naming them.
fn write_corpus(dir: &TempDir, frames: &[u64]) -> Result<NamedTempFile> {
    let mut filelist = NamedTempFile::new_in(dir.path())?;
    for (i, &n) in frames.iter().enumerate() {
        let path = dir.path().join(format!("utt_{i:03}.wav"));
        std::fs::write(&path, vec![0u8; (n * 2 * HOP_LENGTH) as usize])?;
        writeln!(filelist, "{}|spk{}|feats/utt_{i:03}.npy", path.display(), i % 3)?;
    }
    Ok(filelist)
}

#[test]
fn test_filelist_to_batches() -> Result<()> {
    let dir = TempDir::new()?;
    // 10 and 1200 fall outside [32, 1000]; the rest spread over three buckets.
    let frames = [10, 50, 60, 70, 80, 350, 360, 370, 380, 390, 900, 950, 1200];
    let filelist = write_corpus(&dir, &frames)?;

    let dataset = AudioFilelistDataset::builder(filelist.path(), HOP_LENGTH)
        .shuffle_seed(None)
        .load()?;
    assert_eq!(dataset.lengths().as_slice(), &frames);

    let sampler_config = config(&[32, 300, 400, 1000], 2, 1, 0, false);
    let sampler = DistributedBucketSampler::from_dataset(&dataset, &sampler_config)?;
    let assignment = sampler.assignment();
    assert_eq!(assignment.num_discarded(), 2);
    assert_eq!(
        assignment.buckets(),
        &[vec![1, 2, 3, 4], vec![5, 6, 7, 8, 9], vec![10, 11]]
    );
    assert_eq!(assignment.padded_counts(), &[4, 6, 2]);

    let batches: Vec<_> = sampler.iter(0).collect();
    assert_eq!(
        batches,
        vec![
            vec![1, 2],
            vec![3, 4],
            vec![5, 6],
            vec![7, 8],
            vec![9, 5],
            vec![10, 11],
        ]
    );
    for batch in &batches {
        let speakers: Vec<_> = batch
            .iter()
            .filter_map(|&i| dataset.get(i))
            .map(|entry| entry.fields[0].clone())
            .collect();
        assert_eq!(speakers.len(), batch.len());
    }
    Ok(())
}

#[test]
fn test_json_config_drives_two_replicas() -> Result<()> {
    let dir = TempDir::new()?;
    let frames: Vec<u64> = (0..40).map(|i| 40 + i * 23).collect();
    let filelist = write_corpus(&dir, &frames)?;
    let dataset = AudioFilelistDataset::builder(filelist.path(), HOP_LENGTH).load()?;

    let config_path = dir.path().join("sampler.json");
    std::fs::write(
        &config_path,
        r#"{
            "boundaries": [32, 300, 400, 500, 600, 700, 800, 900, 1000],
            "batch_size": 3,
            "num_replicas": 2,
            "rank": 0,
            "seed": 7
        }"#,
    )?;
    let rank0_config = BucketSamplerConfig::from_json_file(&config_path)?;
    let mut rank1_config = rank0_config.clone();
    rank1_config.rank = Some(1);

    let rank0 = DistributedBucketSampler::from_dataset(&dataset, &rank0_config)?;
    let rank1 = DistributedBucketSampler::from_dataset(&dataset, &rank1_config)?;
    assert_eq!(rank0.num_batches(), rank1.num_batches());

    let mut seen: Vec<usize> = rank0.iter(2).chain(rank1.iter(2)).flatten().collect();
    assert_eq!(seen.len(), rank0.total_size());
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), rank0.assignment().num_assigned());
    Ok(())
}
