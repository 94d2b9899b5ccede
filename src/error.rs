// src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the I/O glue around the risk core.
///
/// The core itself (normalization, rules, simulation, explanation) is total
/// and never produces one of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("stats store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The inference backend answered, but not with something usable.
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("stats store lock poisoned")]
    Poisoned,
}

impl Error {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }
}
