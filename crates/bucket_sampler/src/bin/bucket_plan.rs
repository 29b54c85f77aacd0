//! bucket-plan - Inspect how a file-list is bucketed and sharded for one epoch
//!
//! Usage:
//!   bucket-plan --filelist filelists/train.txt --hop-length 512 \
//!       --boundaries 32,300,400,500,600,700,800,900,1000 --batch-size 16
//!   bucket-plan --filelist filelists/train.txt --config sampler.json \
//!       --num-replicas 4 --rank 1 --epoch 3
//!
//! Prints a JSON report of the bucket assignment and the rank's batches.
//! Pass `--verbose` for per-bucket logs.

use anyhow::{Context, Result};
use bucket_sampler::{
    AudioFilelistDataset, BucketSamplerConfig, DistributedBucketSampler, LengthDataset,
};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bucket-plan",
    about = "Show the length buckets and per-rank batches for a training file-list",
    version
)]
struct Cli {
    /// `|`-separated file-list whose first field is the audio path
    #[arg(long)]
    filelist: PathBuf,

    /// STFT hop length used to estimate spectrogram lengths from file sizes
    #[arg(long, default_value = "512")]
    hop_length: u64,

    /// JSON sampler configuration; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated length boundaries, e.g. 32,300,1000
    #[arg(long, value_delimiter = ',')]
    boundaries: Option<Vec<u64>>,

    /// Samples per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of replicas (default: WORLD_SIZE or 1)
    #[arg(long)]
    num_replicas: Option<usize>,

    /// Rank to plan for (default: RANK or 0)
    #[arg(long)]
    rank: Option<usize>,

    /// Disable per-epoch shuffling
    #[arg(long)]
    no_shuffle: bool,

    /// Base seed shared by all replicas
    #[arg(long)]
    seed: Option<u64>,

    /// Epoch to plan
    #[arg(long, default_value = "0")]
    epoch: usize,

    /// Seed for the one-off file-list shuffle at load time
    #[arg(long, default_value = "1234")]
    filelist_seed: u64,

    /// Keep file-list order instead of shuffling it at load time
    #[arg(long)]
    keep_order: bool,

    /// Include every batch's indices in the report
    #[arg(long)]
    print_batches: bool,

    /// Log per-bucket and per-epoch details
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct BucketReport {
    lower: u64,
    upper: u64,
    members: usize,
    padded: usize,
}

#[derive(Serialize)]
struct PlanReport {
    samples: usize,
    discarded: usize,
    epoch: usize,
    rank: usize,
    num_replicas: usize,
    batch_size: usize,
    shuffle: bool,
    total_size: usize,
    num_samples: usize,
    num_batches: usize,
    buckets: Vec<BucketReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batches: Option<Vec<Vec<usize>>>,
}

impl Cli {
    fn sampler_config(&self) -> Result<BucketSamplerConfig> {
        let mut config = match &self.config {
            Some(path) => BucketSamplerConfig::from_json_file(path)?,
            None => BucketSamplerConfig::default(),
        };
        if let Some(boundaries) = &self.boundaries {
            config.boundaries = boundaries.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.num_replicas.is_some() {
            config.num_replicas = self.num_replicas;
        }
        if self.rank.is_some() {
            config.rank = self.rank;
        }
        if self.no_shuffle {
            config.shuffle = false;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }

    fn load_dataset(&self) -> Result<AudioFilelistDataset> {
        AudioFilelistDataset::builder(&self.filelist, self.hop_length)
            .shuffle_seed((!self.keep_order).then_some(self.filelist_seed))
            .load()
            .with_context(|| format!("Failed to load {}", self.filelist.display()))
    }

    fn plan_report(&self) -> Result<PlanReport> {
        let config = self.sampler_config()?;
        let dataset = self.load_dataset()?;
        let sampler = DistributedBucketSampler::from_dataset(&dataset, &config)?;
        let assignment = sampler.assignment();
        let batches: Vec<Vec<usize>> = sampler.epoch_batches(self.epoch)?.collect();

        Ok(PlanReport {
            samples: dataset.len(),
            discarded: assignment.num_discarded(),
            epoch: self.epoch,
            rank: sampler.rank(),
            num_replicas: sampler.num_replicas(),
            batch_size: sampler.batch_size(),
            shuffle: sampler.shuffle(),
            total_size: sampler.total_size(),
            num_samples: sampler.num_samples(),
            num_batches: batches.len(),
            buckets: assignment
                .boundaries()
                .windows(2)
                .zip(assignment.buckets())
                .zip(assignment.padded_counts())
                .map(|((edges, members), &padded)| BucketReport {
                    lower: edges[0],
                    upper: edges[1],
                    members: members.len(),
                    padded,
                })
                .collect(),
            batches: self.print_batches.then_some(batches),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let report = cli.plan_report()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
