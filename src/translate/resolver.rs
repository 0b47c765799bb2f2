use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::error::TranslateError;
use super::interface::TokenVocabulary;
use super::languages::LanguageAliases;

/// A language code the loaded model accepts as a conditioning token.
///
/// Only [`LanguageResolver::resolve`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResolvedLanguage(String);

impl ResolvedLanguage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedLanguage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps caller-supplied language identifiers onto model language codes.
///
/// Aliases win outright. Anything else must be a language marker in the live
/// vocabulary, matched case-sensitively.
pub struct LanguageResolver {
    aliases: LanguageAliases,
    vocabulary: Arc<dyn TokenVocabulary>,
}

impl LanguageResolver {
    pub fn new(aliases: LanguageAliases, vocabulary: Arc<dyn TokenVocabulary>) -> Self {
        Self {
            aliases,
            vocabulary,
        }
    }

    pub fn resolve(&self, identifier: &str) -> Result<ResolvedLanguage, TranslateError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(TranslateError::InvalidInput(
                "Language code must be provided".to_string(),
            ));
        }

        if let Some(code) = self.aliases.lookup(trimmed) {
            return Ok(ResolvedLanguage(code.to_string()));
        }

        match self.vocabulary.language_marker_id(trimmed) {
            Some(id) if id != self.vocabulary.unk_token_id() => {
                Ok(ResolvedLanguage(trimmed.to_string()))
            }
            _ => {
                debug!("No alias or language marker for {:?}", identifier);
                Err(TranslateError::unsupported(identifier))
            }
        }
    }
}
