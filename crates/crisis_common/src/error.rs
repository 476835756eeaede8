//! Error types shared by the crisis monitor crates.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrisisError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid execution payload: {0}")]
    Payload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CrisisError {
    /// Short machine-readable kind, used in JSON error bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CrisisError::Config(_) => "config",
            CrisisError::Payload(_) => "payload",
            CrisisError::Io(_) => "io",
            CrisisError::Json(_) => "json",
            CrisisError::Toml(_) => "toml",
        }
    }
}

pub type Result<T> = std::result::Result<T, CrisisError>;
