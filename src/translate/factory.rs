use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use hf_hub::api::sync::ApiBuilder;
use tracing::{debug, info, warn};

use super::ct2::{Ct2Backend, Ct2Options};
use super::languages::LanguageAliases;
use super::service::TranslatorService;
use crate::config::Settings;

const REQUIRED_FILES: &[&str] = &["model.bin", "config.json", "tokenizer.json"];
const VOCABULARY_FILES: &[&str] = &["shared_vocabulary.json", "shared_vocabulary.txt"];

/// Builds the translator from settings. Everything here runs once at startup and
/// any failure is fatal.
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Blocking: may download model files and always loads weights.
    pub fn create(settings: &Settings) -> Result<TranslatorService> {
        info!("Initializing translator for model: {}", settings.model_name);

        let aliases = LanguageAliases::with_overrides(&settings.language_aliases)?;
        info!("{} language aliases configured", aliases.len());
        for (alias, code) in aliases.iter() {
            debug!("  {} -> {}", alias, code);
        }
        let model_dir = Self::locate_model(&settings.model_name, &settings.cache_path())?;

        let options = Ct2Options {
            device: settings.device.clone(),
            device_index: settings.device_index,
            num_threads: settings.num_threads,
            beam_size: settings.beam_size,
        };
        let backend = Arc::new(Ct2Backend::load(&model_dir, &options)?);

        Ok(TranslatorService::new(
            settings.model_name.clone(),
            backend,
            aliases,
            settings.request_timeout(),
        ))
    }

    /// A local directory is used as is; anything else is treated as a Hub
    /// repository id and fetched into `cache_dir`.
    pub fn locate_model(model_name: &str, cache_dir: &Path) -> Result<PathBuf> {
        let local = Path::new(model_name);
        if local.is_dir() {
            Self::check_local_model(local)?;
            return Ok(local.to_path_buf());
        }

        info!(
            "Fetching {} from the Hugging Face Hub into {}",
            model_name,
            cache_dir.display()
        );
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;

        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.to_path_buf())
            .build()
            .context("Failed to initialize Hugging Face Hub client")?;
        let repo = api.model(model_name.to_string());

        let mut model_bin = None;
        for file in REQUIRED_FILES {
            let path = repo
                .get(file)
                .with_context(|| format!("Failed to fetch {} from {}", file, model_name))?;
            if *file == "model.bin" {
                model_bin = Some(path);
            }
        }

        let mut vocabulary_found = false;
        for file in VOCABULARY_FILES {
            match repo.get(file) {
                Ok(_) => {
                    vocabulary_found = true;
                    break;
                }
                Err(e) => warn!("{} not available in {}: {}", file, model_name, e),
            }
        }
        if !vocabulary_found {
            anyhow::bail!(
                "{} has no shared vocabulary file (tried {:?})",
                model_name,
                VOCABULARY_FILES
            );
        }

        // All files of one revision land in the same snapshot directory.
        model_bin
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .with_context(|| format!("Could not determine snapshot directory for {}", model_name))
    }

    fn check_local_model(dir: &Path) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_FILES
            .iter()
            .copied()
            .filter(|file| !dir.join(file).is_file())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Model directory {} is missing {:?}",
                dir.display(),
                missing
            );
        }
        if !VOCABULARY_FILES.iter().any(|file| dir.join(file).is_file()) {
            anyhow::bail!(
                "Model directory {} has no shared vocabulary file (expected one of {:?})",
                dir.display(),
                VOCABULARY_FILES
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "translator-backend-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn complete_local_directory_is_used_directly() {
        let dir = scratch_dir("complete");
        for file in ["model.bin", "config.json", "tokenizer.json", "shared_vocabulary.txt"] {
            std::fs::write(dir.join(file), b"").unwrap();
        }

        let located = TranslatorFactory::locate_model(dir.to_str().unwrap(), &dir).unwrap();
        assert_eq!(located, dir);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn incomplete_local_directory_names_missing_files() {
        let dir = scratch_dir("incomplete");
        std::fs::write(dir.join("model.bin"), b"").unwrap();

        let err = TranslatorFactory::locate_model(dir.to_str().unwrap(), &dir).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("tokenizer.json"), "{message}");
        assert!(message.contains("config.json"), "{message}");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn local_directory_without_vocabulary_is_rejected() {
        let dir = scratch_dir("no-vocab");
        for file in REQUIRED_FILES {
            std::fs::write(dir.join(file), b"").unwrap();
        }

        let err = TranslatorFactory::locate_model(dir.to_str().unwrap(), &dir).unwrap_err();
        assert!(err.to_string().contains("vocabulary"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn real_model_settings() -> Settings {
        let model = std::env::var("TRANSLATOR_TEST_MODEL")
            .expect("set TRANSLATOR_TEST_MODEL to a CTranslate2 NLLB model dir or Hub id");
        let json = serde_json::json!({
            "model_name": model,
            "transformers_cache": std::env::temp_dir().join("translator-backend-cache"),
        });
        Settings::from_builder(config::Config::builder().add_source(config::File::from_str(
            &json.to_string(),
            config::FileFormat::Json,
        )))
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a converted model (TRANSLATOR_TEST_MODEL)"]
    async fn english_to_french_smoke() {
        let service = TranslatorFactory::create(&real_model_settings()).unwrap();

        let (text, target) = service.translate_text("Hello", "EN", "FR").await.unwrap();
        println!("translated: {text}");
        assert!(!text.trim().is_empty());
        assert_ne!(text, "Hello");
        assert_eq!(target.as_str(), "fra_Latn");
    }

    #[tokio::test]
    #[ignore = "requires a converted model (TRANSLATOR_TEST_MODEL)"]
    async fn round_trip_smoke() {
        let service = TranslatorFactory::create(&real_model_settings()).unwrap();

        let original = "The weather is nice today.";
        let (french, _) = service.translate_text(original, "EN", "FR").await.unwrap();
        let (back, _) = service.translate_text(&french, "FR", "EN").await.unwrap();
        println!("{original} -> {french} -> {back}");
        // Loose similarity only; exact round trips are not expected.
        assert!(back.to_lowercase().contains("weather") || back.to_lowercase().contains("today"));
    }
}
