//! Project configuration stored in `PROJECT/engineer.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::preset::Preset;
use crate::io::backend::DEFAULT_BASE_URL;

pub const CONFIG_FILE: &str = "engineer.toml";

/// Per-project settings (TOML).
///
/// Every field is optional in the file. Command-line flags take precedence
/// over anything set here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineerConfig {
    /// Model identifier sent with every chat completion.
    pub model: String,

    pub temperature: f64,

    /// Base of the OpenAI-compatible API; `/chat/completions` is appended.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Preset run when `--steps` is not given.
    pub steps: String,
}

impl Default for EngineerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-16k-0613".to_string(),
            temperature: 0.1,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            steps: Preset::Default.as_str().to_string(),
        }
    }
}

impl EngineerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            ));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("base_url must be non-empty"));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(anyhow!("api_key_env must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineerConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineerConfig> {
    if !path.exists() {
        return Ok(EngineerConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
