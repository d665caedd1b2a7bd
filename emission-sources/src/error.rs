use photon_sampling::SamplingError;
use thiserror::Error;

/// Errors raised by emission sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying sampling tables could not be built or queried.
    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    /// `dir` was called without a matching `energy` call for the current photon.
    #[error("Sequencing violation in {source_name}: {message}")]
    SequencingViolation {
        source_name: String,
        message: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    pub(crate) fn sequencing(source_name: &str, message: impl Into<String>) -> Self {
        Self::SequencingViolation {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}
