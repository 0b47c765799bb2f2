//! CTranslate2 runtime with a Hugging Face tokenizer.
//!
//! The tokenizer is only used for its vocabulary and sentencepiece splitting; the
//! source-language framing its post-processor would add is done here explicitly,
//! so no per-request state is ever written into it.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ct2rs::sys::Translator;
use ct2rs::{Config, Device, TranslationOptions};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::interface::{EncodedInput, TokenVocabulary, TranslationBackend};
use super::resolver::ResolvedLanguage;
use super::service::MAX_INPUT_LENGTH;

const UNK_TOKEN: &str = "<unk>";
const EOS_TOKEN: &str = "</s>";
const CONTROL_TOKENS: &[&str] = &["<s>", "</s>", "<pad>", "<unk>", "<mask>"];

/// Runtime knobs for the CTranslate2 translator.
#[derive(Debug, Clone)]
pub struct Ct2Options {
    pub device: String,
    pub device_index: i32,
    pub num_threads: usize,
    pub beam_size: usize,
}

impl Default for Ct2Options {
    fn default() -> Self {
        Self {
            device: "cpu".to_string(),
            device_index: 0,
            num_threads: 0,
            beam_size: 1,
        }
    }
}

pub struct Ct2Backend {
    translator: Translator,
    tokenizer: Tokenizer,
    language_markers: HashMap<String, u32>,
    unk_id: u32,
    beam_size: usize,
}

impl Ct2Backend {
    /// Load `model.bin` and `tokenizer.json` from `model_dir`.
    pub fn load(model_dir: &Path, options: &Ct2Options) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!(
                "Failed to load tokenizer from {}: {}",
                tokenizer_path.display(),
                e
            )
        })?;

        let unk_id = tokenizer
            .token_to_id(UNK_TOKEN)
            .ok_or_else(|| anyhow!("Tokenizer has no {} token", UNK_TOKEN))?;
        if tokenizer.token_to_id(EOS_TOKEN).is_none() {
            anyhow::bail!("Tokenizer has no {} token", EOS_TOKEN);
        }

        let language_markers = language_markers(&tokenizer);
        if language_markers.is_empty() {
            anyhow::bail!(
                "Tokenizer at {} defines no language marker tokens; is this a multilingual model?",
                tokenizer_path.display()
            );
        }
        info!("Tokenizer knows {} language markers", language_markers.len());

        let mut config = Config::default();
        config.device = parse_device(&options.device)?;
        config.device_indices = vec![options.device_index];
        config.num_threads_per_replica = options.num_threads;

        info!(
            "Loading CTranslate2 model from {} (device: {}, beam size: {})",
            model_dir.display(),
            options.device,
            options.beam_size
        );
        let translator = Translator::new(model_dir, &config).with_context(|| {
            format!("Failed to load CTranslate2 model from {}", model_dir.display())
        })?;

        Ok(Self {
            translator,
            tokenizer,
            language_markers,
            unk_id,
            beam_size: options.beam_size.max(1),
        })
    }
}

/// Special added tokens that are not sequence control tokens.
fn language_markers(tokenizer: &Tokenizer) -> HashMap<String, u32> {
    tokenizer
        .get_added_tokens_decoder()
        .into_iter()
        .filter(|(_, token)| token.special && !CONTROL_TOKENS.contains(&token.content.as_str()))
        .map(|(id, token)| (token.content, id))
        .collect()
}

fn parse_device(device: &str) -> Result<Device> {
    match device.to_lowercase().as_str() {
        "cpu" => Ok(Device::CPU),
        "cuda" => Ok(Device::CUDA),
        "auto" => {
            if cuda_visible() {
                Ok(Device::CUDA)
            } else {
                Ok(Device::CPU)
            }
        }
        other => Err(anyhow!(
            "Invalid device '{}'. Valid options: cpu, cuda, auto",
            other
        )),
    }
}

fn cuda_visible() -> bool {
    if Path::new("/dev/nvidia0").exists() {
        return true;
    }
    match std::env::var("CUDA_VISIBLE_DEVICES") {
        Ok(val) => !val.is_empty() && val != "-1",
        Err(_) => std::env::var("NVIDIA_VISIBLE_DEVICES").is_ok(),
    }
}

impl TokenVocabulary for Ct2Backend {
    fn language_marker_id(&self, token: &str) -> Option<u32> {
        self.language_markers
            .get(token)
            .copied()
            .filter(|id| *id != self.unk_id)
    }

    fn token_to_id(&self, token: &str) -> u32 {
        self.tokenizer.token_to_id(token).unwrap_or(self.unk_id)
    }

    fn unk_token_id(&self) -> u32 {
        self.unk_id
    }
}

impl TranslationBackend for Ct2Backend {
    fn encode(&self, text: &str, source: &ResolvedLanguage) -> Result<EncodedInput> {
        frame_source(&self.tokenizer, text, source.as_str(), self.unk_id)
    }

    fn generate(
        &self,
        input: &EncodedInput,
        forced_bos_token_id: u32,
        max_length: usize,
    ) -> Result<Vec<Vec<u32>>> {
        let forced = self
            .tokenizer
            .id_to_token(forced_bos_token_id)
            .ok_or_else(|| anyhow!("No token for forced start id {}", forced_bos_token_id))?;

        if input.ids.len() > MAX_INPUT_LENGTH {
            warn!(
                "Input of {} tokens exceeds {} and will be truncated",
                input.ids.len(),
                MAX_INPUT_LENGTH
            );
        }

        let options: TranslationOptions<String, String> = TranslationOptions {
            beam_size: self.beam_size,
            max_input_length: MAX_INPUT_LENGTH,
            max_decoding_length: max_length,
            num_hypotheses: 1,
            ..Default::default()
        };

        debug!(
            "Generating from {} input tokens (first id {:?})",
            input.ids.len(),
            input.ids.first()
        );
        let source = vec![input.tokens.clone()];
        let target_prefix = vec![vec![forced]];
        let results = self
            .translator
            .translate_batch_with_target_prefix(&source, &target_prefix, &options, None)
            .context("Generation failed")?;

        let hypotheses = results
            .into_iter()
            .next()
            .map(|result| result.hypotheses)
            .unwrap_or_default();
        debug!("Generated {} hypotheses", hypotheses.len());

        Ok(hypotheses
            .iter()
            .map(|tokens| tokens_to_ids(&self.tokenizer, tokens, self.unk_id))
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        decode_ids(&self.tokenizer, ids)
    }
}

/// Encode `text` without the tokenizer's post-processor and frame it as
/// `[source marker] pieces... </s>`.
fn frame_source(
    tokenizer: &Tokenizer,
    text: &str,
    source_marker: &str,
    unk_id: u32,
) -> Result<EncodedInput> {
    let encoding = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

    let lookup = |token: &str| tokenizer.token_to_id(token).unwrap_or(unk_id);

    let mut tokens = Vec::with_capacity(encoding.len() + 2);
    let mut ids = Vec::with_capacity(encoding.len() + 2);
    tokens.push(source_marker.to_string());
    ids.push(lookup(source_marker));
    tokens.extend(encoding.get_tokens().iter().cloned());
    ids.extend_from_slice(encoding.get_ids());
    tokens.push(EOS_TOKEN.to_string());
    ids.push(lookup(EOS_TOKEN));

    Ok(EncodedInput { tokens, ids })
}

fn tokens_to_ids(tokenizer: &Tokenizer, tokens: &[String], unk_id: u32) -> Vec<u32> {
    tokens
        .iter()
        .map(|token| tokenizer.token_to_id(token).unwrap_or(unk_id))
        .collect()
}

/// Special tokens, the forced target marker included, are skipped.
fn decode_ids(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    let text = tokenizer
        .decode(ids, true)
        .map_err(|e| anyhow!("Decoding failed: {}", e))?;
    Ok(text.trim().to_string())
}
