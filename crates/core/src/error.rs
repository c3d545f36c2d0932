use crate::{envelope::EnvelopeError, manifest::ManifestError, onset::OnsetError};

/// Result alias that carries the custom [`AnalysisError`] type.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A caller supplied parameters or data the analysers cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Envelope analysis failed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// Onset detection found nothing or was misconfigured.
    #[error(transparent)]
    Onset(#[from] OnsetError),
    /// The module manifest is malformed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// The FFT backend rejected a buffer.
    #[error("fft failed: {0}")]
    Fft(String),
    /// Decoding or encoding a WAV file failed.
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed or serialised.
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
    /// Free-form error, e.g. a poisoned lock.
    #[error("{0}")]
    Message(String),
}

impl AnalysisError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates an [`AnalysisError::InvalidInput`] from the provided message.
    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<realfft::FftError> for AnalysisError {
    fn from(value: realfft::FftError) -> Self {
        Self::Fft(value.to_string())
    }
}

impl From<&str> for AnalysisError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for AnalysisError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
