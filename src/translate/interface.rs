/// Translate interface - wire types plus the seams between the HTTP layer, the
/// translation core and the model runtime

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::TranslateError;
use super::resolver::ResolvedLanguage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    /// Model code the target identifier resolved to, e.g. `fra_Latn` for `FR`.
    pub target_language: String,
}

/// What the HTTP layer talks to.
#[async_trait]
pub trait TranslateInterface: Send + Sync {
    /// Translate one request end to end.
    async fn translate(&self, request: TranslateRequest)
        -> Result<TranslateResponse, TranslateError>;

    /// Identifier of the loaded model, reported by `/health`.
    fn model_name(&self) -> &str;
}

/// Read-only view of a tokenizer vocabulary.
pub trait TokenVocabulary: Send + Sync {
    /// Id of `token` when the model knows it as a language marker.
    /// Never returns the unknown-token id.
    fn language_marker_id(&self, token: &str) -> Option<u32>;

    /// Plain token-to-id conversion. Tokens outside the vocabulary map to
    /// [`TokenVocabulary::unk_token_id`].
    fn token_to_id(&self, token: &str) -> u32;

    fn unk_token_id(&self) -> u32;
}

/// Model inputs for one sentence, already framed with the source-language marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    pub tokens: Vec<String>,
    pub ids: Vec<u32>,
}

/// Blocking model runtime. Every call may take from milliseconds to seconds, so
/// callers keep these off the async executor.
pub trait TranslationBackend: TokenVocabulary {
    /// Tokenize `text` conditioned on `source`. The language is an argument rather
    /// than tokenizer state, so concurrent calls cannot see each other's source.
    fn encode(&self, text: &str, source: &ResolvedLanguage) -> anyhow::Result<EncodedInput>;

    /// Run generation with the first output token forced to `forced_bos_token_id`.
    /// Returns one id sequence per hypothesis, best first.
    fn generate(
        &self,
        input: &EncodedInput,
        forced_bos_token_id: u32,
        max_length: usize,
    ) -> anyhow::Result<Vec<Vec<u32>>>;

    /// Turn generated ids back into text, dropping control and language tokens.
    fn decode(&self, ids: &[u32]) -> anyhow::Result<String>;
}
