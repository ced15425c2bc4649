use crate::backend::Backend;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_steps: usize,
    pub autopilot: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: "google/gemini-2.5-flash-preview".to_string(),
            // Filled in from the backend when left empty.
            base_url: String::new(),
            timeout_seconds: 120,
            max_steps: 10,
            autopilot: false,
        }
    }
}

pub fn load_or_create() -> Result<Config> {
    let xdg_dirs = xdg::BaseDirectories::new();
    let config_path = xdg_dirs.place_config_file("tern/config.toml")?;

    if !config_path.exists() {
        let mut default_config = Config::default();
        default_config.base_url = default_config.backend.config().base_url;
        let toml_string = toml::to_string_pretty(&default_config)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, toml_string)?;

        println!("Created default config at: {}", config_path.display());
        return Ok(default_config);
    }

    let config_string = fs::read_to_string(&config_path)?;
    let mut config: Config = toml::from_str(&config_string)?;

    // Zero values fall back to defaults; the sanitized config is written
    // back so the file always shows every available option.
    let defaults = Config::default();
    if config.model.is_empty() {
        config.model = defaults.model;
    }
    if config.base_url.is_empty() {
        config.base_url = config.backend.config().base_url;
    }
    if config.timeout_seconds == 0 {
        config.timeout_seconds = defaults.timeout_seconds;
    }
    if config.max_steps == 0 {
        config.max_steps = defaults.max_steps;
    }

    let final_toml_string = toml::to_string_pretty(&config)?;
    if final_toml_string != config_string {
        fs::write(&config_path, final_toml_string)?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("model = \"qwen3\"").unwrap();
        assert_eq!(config.model, "qwen3");
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.backend, Backend::Openrouter);
        assert!(!config.autopilot);
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let config: Config = toml::from_str("backend = \"ollama\"").unwrap();
        assert_eq!(config.backend, Backend::Ollama);
    }
}
