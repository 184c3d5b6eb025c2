//! Bot configuration: one entry per platform connection.
//!
//! The config is human-owned TOML. Each `[[apis]]` entry describes one
//! platform connection; tokens are referenced via environment variable
//! names so the file itself never holds secrets.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for our schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A platform entry is structurally valid but semantically wrong.
    #[error("api entry {index}: {reason}")]
    Invalid {
        /// Index of the offending `[[apis]]` entry.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Platform connections to start.
    pub apis: Vec<ApiConfig>,
}

/// One platform connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiConfig {
    /// VK community long-poll connection.
    Vk {
        /// Instance descriptor used in opaque ids.
        descriptor: String,
        /// VK community (group) id.
        group_id: i64,
        /// Environment variable names holding access tokens.
        token_envs: Vec<String>,
    },
    /// Telegram bot long-poll connection.
    Telegram {
        /// Instance descriptor used in opaque ids.
        descriptor: String,
        /// Bot username (without `@`).
        username: String,
        /// Environment variable name holding the bot token.
        bot_token_env: String,
        /// Long-poll timeout for `getUpdates`, in seconds.
        #[serde(default = "default_poll_timeout")]
        poll_timeout_seconds: u32,
    },
    /// Discord gateway connection.
    Discord {
        /// Instance descriptor used in opaque ids.
        descriptor: String,
        /// Environment variable name holding the bot token.
        token_env: String,
    },
}

fn default_poll_timeout() -> u32 {
    30
}

impl Config {
    /// Load and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check per-entry requirements the schema alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, api) in self.apis.iter().enumerate() {
            let invalid = |reason: &str| ConfigError::Invalid {
                index,
                reason: reason.to_string(),
            };
            match api {
                ApiConfig::Vk {
                    descriptor,
                    group_id,
                    token_envs,
                } => {
                    if descriptor.is_empty() {
                        return Err(invalid("missing descriptor"));
                    }
                    if *group_id <= 0 {
                        return Err(invalid("vk group_id must be positive"));
                    }
                    if token_envs.is_empty() {
                        return Err(invalid("missing vk token_envs"));
                    }
                }
                ApiConfig::Telegram {
                    descriptor,
                    username,
                    bot_token_env,
                    ..
                } => {
                    if descriptor.is_empty() {
                        return Err(invalid("missing descriptor"));
                    }
                    if username.is_empty() {
                        return Err(invalid("missing telegram username"));
                    }
                    if bot_token_env.is_empty() {
                        return Err(invalid("missing telegram bot_token_env"));
                    }
                }
                ApiConfig::Discord {
                    descriptor,
                    token_env,
                } => {
                    if descriptor.is_empty() {
                        return Err(invalid("missing descriptor"));
                    }
                    if token_env.is_empty() {
                        return Err(invalid("missing discord token_env"));
                    }
                }
            }
        }
        Ok(())
    }
}
