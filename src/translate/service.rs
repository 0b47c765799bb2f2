use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::error::TranslateError;
use super::interface::{
    TranslateInterface, TranslateRequest, TranslateResponse, TranslationBackend,
};
use super::languages::LanguageAliases;
use super::resolver::{LanguageResolver, ResolvedLanguage};

/// Upper bound on generated tokens per request.
pub const MAX_OUTPUT_LENGTH: usize = 512;

/// Upper bound on encoded input tokens, markers included. The runtime would
/// silently truncate anything longer.
pub const MAX_INPUT_LENGTH: usize = 1024;

/// Runs one translation: resolve both languages, encode, force the target marker,
/// generate and decode.
pub struct TranslatorService {
    model_name: String,
    resolver: LanguageResolver,
    backend: Arc<dyn TranslationBackend>,
    timeout: Duration,
}

impl TranslatorService {
    pub fn new<B>(
        model_name: impl Into<String>,
        backend: Arc<B>,
        aliases: LanguageAliases,
        timeout: Duration,
    ) -> Self
    where
        B: TranslationBackend + 'static,
    {
        let resolver = LanguageResolver::new(aliases, backend.clone());
        Self {
            model_name: model_name.into(),
            resolver,
            backend,
            timeout,
        }
    }

    /// Translate `text`, returning the decoded output and the resolved target code.
    pub async fn translate_text(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<(String, ResolvedLanguage), TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::InvalidInput(
                "Text to translate must not be empty".to_string(),
            ));
        }

        let source = self.resolver.resolve(source_language)?;
        let target = self.resolver.resolve(target_language)?;

        // Vocabulary membership and "usable as a forced start token" can differ, so
        // the target gets a second check against the token-to-id mapping.
        let forced_bos_token_id = self.backend.token_to_id(target.as_str());
        if forced_bos_token_id == self.backend.unk_token_id() {
            warn!("Target {} has no forced start token", target);
            return Err(TranslateError::UnsupportedLanguage {
                identifier: target_language.to_string(),
            });
        }

        debug!(
            "Translating {} chars {} -> {} (forced start id {})",
            text.len(),
            source,
            target,
            forced_bos_token_id
        );

        let backend = self.backend.clone();
        let text = text.to_string();
        let job = tokio::task::spawn_blocking(move || -> Result<String, TranslateError> {
            let input = backend
                .encode(&text, &source)
                .map_err(TranslateError::Backend)?;
            if input.ids.len() > MAX_INPUT_LENGTH {
                return Err(TranslateError::InvalidInput(format!(
                    "Text is too long: {} tokens, at most {} allowed",
                    input.ids.len(),
                    MAX_INPUT_LENGTH
                )));
            }
            let sequences = backend
                .generate(&input, forced_bos_token_id, MAX_OUTPUT_LENGTH)
                .map_err(TranslateError::Backend)?;
            let best = sequences.into_iter().next().ok_or_else(|| {
                TranslateError::Backend(anyhow!("model returned no output sequence"))
            })?;
            backend.decode(&best).map_err(TranslateError::Backend)
        });

        // On expiry the blocking job keeps running detached; it owns everything it
        // touches, so later requests are unaffected.
        let translated = match tokio::time::timeout(self.timeout, job).await {
            Err(_) => {
                warn!("Translation exceeded {:?}", self.timeout);
                return Err(TranslateError::Timeout(self.timeout));
            }
            Ok(Err(join_error)) => {
                error!("Translation task aborted: {}", join_error);
                return Err(TranslateError::Backend(anyhow::Error::new(join_error)));
            }
            Ok(Ok(result)) => result.map_err(|e| {
                if let TranslateError::Backend(inner) = &e {
                    error!("Backend failure: {:#}", inner);
                }
                e
            })?,
        };

        Ok((translated, target))
    }
}

#[async_trait]
impl TranslateInterface for TranslatorService {
    async fn translate(
        &self,
        request: TranslateRequest,
    ) -> Result<TranslateResponse, TranslateError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("translate", %request_id);

        async {
            let (translated_text, target) = self
                .translate_text(
                    &request.text,
                    &request.source_language,
                    &request.target_language,
                )
                .await?;

            info!("Translated into {}", target);
            Ok::<_, TranslateError>(TranslateResponse {
                translated_text,
                target_language: target.into_string(),
            })
        }
        .instrument(span)
        .await
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
