use thiserror::Error;

/// Errors raised by the bucket sampler.
///
/// Public APIs return `anyhow::Result`; these variants are attached as the
/// underlying error so callers can `downcast_ref::<SamplerError>()` to tell a
/// bad configuration apart from an internal invariant violation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// Invalid boundaries, batch size, replica layout, or an empty usable dataset.
    #[error("invalid sampler configuration: {0}")]
    Configuration(String),

    /// The built epoch does not split into exactly `num_samples / batch_size` batches.
    #[error("batch count mismatch: {batches} x {batch_size} != num_samples {num_samples}")]
    BatchCountMismatch {
        batches: usize,
        batch_size: usize,
        num_samples: usize,
    },

    /// A distributed launcher variable is set but is not a valid integer.
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnvironment { var: &'static str, value: String },
}

impl SamplerError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
