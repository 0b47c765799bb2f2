use std::sync::{Arc, OnceLock};

use crate::config::Settings;
use crate::translate::{TranslateError, TranslateInterface};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    translator: Arc<OnceLock<Arc<dyn TranslateInterface>>>,
}

/// Whether the model handle exists yet.
pub enum Readiness {
    Loading,
    Ready(Arc<dyn TranslateInterface>),
}

impl AppState {
    /// State with no translator; requests get `ModelUnavailable` until
    /// [`AppState::mark_ready`] is called.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            translator: Arc::new(OnceLock::new()),
        }
    }

    pub fn with_translator(settings: Settings, translator: Arc<dyn TranslateInterface>) -> Self {
        let state = Self::new(settings);
        state.mark_ready(translator);
        state
    }

    /// Install the translator. Only the first call has any effect.
    pub fn mark_ready(&self, translator: Arc<dyn TranslateInterface>) -> bool {
        self.translator.set(translator).is_ok()
    }

    pub fn readiness(&self) -> Readiness {
        match self.translator.get() {
            Some(translator) => Readiness::Ready(translator.clone()),
            None => Readiness::Loading,
        }
    }

    pub fn translator(&self) -> Result<Arc<dyn TranslateInterface>, TranslateError> {
        match self.readiness() {
            Readiness::Ready(translator) => Ok(translator),
            Readiness::Loading => Err(TranslateError::ModelUnavailable),
        }
    }
}
