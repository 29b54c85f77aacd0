pub mod config;
pub mod dataset;
pub mod error;
pub mod lengths;
pub mod readers;
pub mod sampler;

pub use config::{BucketSamplerConfig, DistributedContext};
pub use dataset::{AudioFilelistDataset, LengthDataset};
pub use error::SamplerError;
pub use lengths::LengthIndex;
pub use sampler::{DistributedBucketSampler, EpochBatches, Sampler};
