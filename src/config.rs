use crate::error::Result;
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = ".config/export_risk.toml";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: String,
    pub logging: LoggingSection,
    pub llm: LlmSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "riskstore/stats.db".to_string(),
            logging: LoggingSection::default(),
            llm: LlmSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which service, if any, fills gaps the regex pass leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Regex extraction only.
    #[default]
    Heuristics,
    Ollama,
    /// Any OpenAI-compatible endpoint; key from `LLM_API_KEY`.
    Remote,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    /// Invoice text beyond this many characters is not sent.
    pub max_prompt_chars: usize,
    pub timeout_secs: u64,
    pub ollama: EndpointSection,
    pub remote: EndpointSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            max_prompt_chars: 6000,
            timeout_secs: 60,
            ollama: EndpointSection {
                base_url: "http://localhost:11434/v1".to_string(),
                model: "llama3.1".to_string(),
            },
            remote: EndpointSection {
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
                model: "gemini-1.5-flash".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing file means all defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.db_path, "riskstore/stats.db");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.llm.backend, LlmBackend::Heuristics);
        assert_eq!(cfg.llm.max_prompt_chars, 6000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            db_path = "/tmp/risk.db"

            [llm]
            backend = "ollama"

            [llm.ollama]
            base_url = "http://gpu-box:11434/v1"
            model = "qwen3:8b"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.db_path, "/tmp/risk.db");
        assert_eq!(cfg.llm.backend, LlmBackend::Ollama);
        assert_eq!(cfg.llm.ollama.model, "qwen3:8b");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.llm.remote.model, "gemini-1.5-flash");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = toml::from_str::<Config>("[llm]\nbackend = \"carrier-pigeon\"");
        assert!(err.is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = Config::load_or_default("definitely/not/here.toml").unwrap();
        assert_eq!(cfg.llm.backend, LlmBackend::Heuristics);
    }
}
