use std::time::Duration;

use thiserror::Error;

/// Failures raised by the translation core.
///
/// The HTTP layer is the only place these are turned into status codes; the core
/// just says whether the caller or the service is at fault.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{0}")]
    InvalidInput(String),

    /// Carries the identifier exactly as the caller sent it, untrimmed.
    #[error("Unsupported language code: {identifier}")]
    UnsupportedLanguage { identifier: String },

    #[error("Translator not initialized")]
    ModelUnavailable,

    #[error("Translation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Translation failed: {0:#}")]
    Backend(#[source] anyhow::Error),
}

impl TranslateError {
    pub fn unsupported(identifier: &str) -> Self {
        Self::UnsupportedLanguage {
            identifier: identifier.to_string(),
        }
    }

    /// True when the request itself was wrong and retrying it unchanged cannot help.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::UnsupportedLanguage { .. })
    }
}
