//! Layered configuration.
//!
//! Values are resolved in order, later layers winning:
//! 1. Built-in defaults
//! 2. `config.json` in the platform config directory (`feedback-lens/`)
//! 3. Environment (a `.env` file is loaded first when present)
//! 4. CLI flags, applied by the binary

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_BATCH_SIZE;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const APP_NAME: &str = "feedback-lens";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gemini API key. Usually supplied through `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Feedback lines per classification call.
    pub batch_size: usize,
    /// Request timeout for each classification call.
    pub timeout_secs: u64,
    /// Replaces the built-in system instruction when set.
    pub system_instruction: Option<String>,
    /// Labels the classifier should prefer.
    pub suggested_labels: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: 120,
            system_instruction: None,
            suggested_labels: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load the config file and apply environment overrides.
    /// Falls back to defaults if the file is missing or fails to parse.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let mut config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn try_load() -> Result<Self> {
        let config_path = config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&config_path)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply environment overrides. Unparsable numbers are ignored with a warning.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = var("FEEDBACK_LENS_MODEL") {
            self.model = model;
        }
        if let Some(url) = var("FEEDBACK_LENS_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = var("FEEDBACK_LENS_BATCH_SIZE") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => self.batch_size = n,
                _ => tracing::warn!("Ignoring invalid FEEDBACK_LENS_BATCH_SIZE: {}", raw),
            }
        }
        if let Some(raw) = var("FEEDBACK_LENS_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(n) => self.timeout_secs = n,
                Err(_) => tracing::warn!("Ignoring invalid FEEDBACK_LENS_TIMEOUT_SECS: {}", raw),
            }
        }
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// A copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}
