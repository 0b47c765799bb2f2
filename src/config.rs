use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

/// Service settings, read from an optional config file and then overridden by
/// environment variables (`MODEL_NAME`, `API_PORT`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub debug_mode: bool,

    /// Local model directory or Hugging Face Hub repository id.
    #[serde(default)]
    pub model_name: String,

    /// Where downloaded model artifacts are stored.
    #[serde(default = "default_transformers_cache")]
    pub transformers_cache: String,

    #[serde(default = "default_device")]
    pub device: String, // "cpu", "cuda", "auto"

    #[serde(default)]
    pub device_index: i32,

    /// 0 lets the runtime decide.
    #[serde(default)]
    pub num_threads: usize,

    #[serde(default = "default_beam_size")]
    pub beam_size: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra short codes on top of the built-in ones, e.g. `{"JA": "jpn_Jpan"}`.
    #[serde(default)]
    pub language_aliases: HashMap<String, String>,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_transformers_cache() -> String {
    "/app/model_cache".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_beam_size() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Settings {
    /// Load the config file at `CONFIG_PATH` (or `conf.*` in the working
    /// directory, if any), then the process environment. `.env` must already
    /// have been applied to the environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var("CONFIG_PATH") {
            Ok(path) => File::with_name(&path).required(true),
            Err(_) => File::with_name("conf").required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(Environment::default().try_parsing(true));
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            anyhow::bail!("MODEL_NAME must be provided");
        }
        let valid_devices = ["cpu", "cuda", "auto"];
        if !valid_devices.contains(&self.device.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid device '{}'. Must be one of: {:?}",
                self.device,
                valid_devices
            );
        }
        if self.beam_size == 0 {
            anyhow::bail!("beam_size must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.transformers_cache)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
