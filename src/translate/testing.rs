//! In-memory backend for exercising the core without model files.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::interface::{EncodedInput, TokenVocabulary, TranslationBackend};
use super::resolver::ResolvedLanguage;

const CONTROL_TOKENS: &[&str] = &["<s>", "<pad>", "</s>", "<unk>"];
const UNK_ID: u32 = 3;
const EOS_ID: u32 = 2;
const MARKER_BASE: u32 = 1000;
const WORD_BASE: u32 = 5000;

const NLLB_MARKERS: &[&str] = &[
    "eng_Latn", "fra_Latn", "spa_Latn", "deu_Latn", "por_Latn", "ita_Latn", "nld_Latn",
    "rus_Cyrl", "arb_Arab", "zho_Hans", "jpn_Jpan", "kor_Hang", "xho_Latn",
];

/// Echo "model": the generated sequence is the forced token, then the encoded
/// source marker and words. Decoding joins tokens with spaces and drops control
/// tokens, so outputs read like `fra_Latn eng_Latn Hello world`.
pub struct ScriptedBackend {
    markers: HashMap<String, u32>,
    unforceable: HashSet<String>,
    words: Mutex<Vec<String>>,
    generate_calls: AtomicUsize,
    generate_delay: Duration,
    fail_generation: bool,
}

impl ScriptedBackend {
    pub fn with_markers(markers: &[&str]) -> Self {
        let markers = markers
            .iter()
            .zip(MARKER_BASE..)
            .map(|(m, id)| (m.to_string(), id))
            .collect();
        Self {
            markers,
            unforceable: HashSet::new(),
            words: Mutex::new(vec!["▁the".to_string()]),
            generate_calls: AtomicUsize::new(0),
            generate_delay: Duration::ZERO,
            fail_generation: false,
        }
    }

    pub fn nllb_like() -> Self {
        Self::with_markers(NLLB_MARKERS)
    }

    /// Keep `marker` a language marker but make token-to-id conversion miss it.
    pub fn unforceable(mut self, marker: &str) -> Self {
        self.unforceable.insert(marker.to_string());
        self
    }

    pub fn generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn intern(&self, word: &str) -> u32 {
        let mut words = self.words.lock().unwrap();
        let index = match words.iter().position(|w| w == word) {
            Some(index) => index,
            None => {
                words.push(word.to_string());
                words.len() - 1
            }
        };
        WORD_BASE + index as u32
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        if id >= WORD_BASE {
            let words = self.words.lock().unwrap();
            return words.get((id - WORD_BASE) as usize).cloned();
        }
        if id < MARKER_BASE {
            return CONTROL_TOKENS.get(id as usize).map(|t| t.to_string());
        }
        self.markers
            .iter()
            .find(|(_, marker_id)| **marker_id == id)
            .map(|(marker, _)| marker.clone())
    }
}

impl TokenVocabulary for ScriptedBackend {
    fn language_marker_id(&self, token: &str) -> Option<u32> {
        self.markers.get(token).copied()
    }

    fn token_to_id(&self, token: &str) -> u32 {
        if self.unforceable.contains(token) {
            return UNK_ID;
        }
        if let Some(id) = self.markers.get(token) {
            return *id;
        }
        if let Some(index) = CONTROL_TOKENS.iter().position(|t| *t == token) {
            return index as u32;
        }
        let words = self.words.lock().unwrap();
        words
            .iter()
            .position(|w| w == token)
            .map_or(UNK_ID, |index| WORD_BASE + index as u32)
    }

    fn unk_token_id(&self) -> u32 {
        UNK_ID
    }
}

impl TranslationBackend for ScriptedBackend {
    fn encode(&self, text: &str, source: &ResolvedLanguage) -> anyhow::Result<EncodedInput> {
        let marker_id = self
            .language_marker_id(source.as_str())
            .ok_or_else(|| anyhow::anyhow!("no marker for {source}"))?;

        let mut tokens = vec![source.to_string()];
        let mut ids = vec![marker_id];
        for word in text.split_whitespace() {
            ids.push(self.intern(word));
            tokens.push(word.to_string());
        }
        tokens.push("</s>".to_string());
        ids.push(EOS_ID);

        Ok(EncodedInput { tokens, ids })
    }

    fn generate(
        &self,
        input: &EncodedInput,
        forced_bos_token_id: u32,
        max_length: usize,
    ) -> anyhow::Result<Vec<Vec<u32>>> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.generate_delay.is_zero() {
            std::thread::sleep(self.generate_delay);
        }
        if self.fail_generation {
            anyhow::bail!("scripted generation failure");
        }

        let mut output = vec![forced_bos_token_id];
        output.extend(input.ids.iter().copied());
        output.truncate(max_length);
        Ok(vec![output])
    }

    fn decode(&self, ids: &[u32]) -> anyhow::Result<String> {
        let tokens: Vec<String> = ids
            .iter()
            .filter_map(|id| self.id_to_token(*id))
            .filter(|t| !CONTROL_TOKENS.contains(&t.as_str()))
            .collect();
        Ok(tokens.join(" "))
    }
}
