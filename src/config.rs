// src/config.rs
//! Dispatcher configuration.
//!
//! Resolution order:
//! 1) $FEED_DISPATCH_CONFIG_PATH (must exist when set)
//! 2) config/dispatch.toml
//! 3) config/dispatch.json
//! 4) built-in defaults
//!
//! `FEED_DISPATCH_MAX_MESSAGE_LENGTH` overrides the message limit afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::formatter::DISCORD_MESSAGE_LIMIT;

pub const ENV_CONFIG_PATH: &str = "FEED_DISPATCH_CONFIG_PATH";
pub const ENV_MAX_MESSAGE_LENGTH: &str = "FEED_DISPATCH_MAX_MESSAGE_LENGTH";

pub const DEFAULT_CONFIG_TOML: &str = "config/dispatch.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/dispatch.json";

pub const DEFAULT_MAX_EMBEDS: usize = 10;
pub const DEFAULT_THREAD_NAME_LENGTH: usize = 100;
pub const DEFAULT_SPLIT_CHAR: &str = "\n";
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

fn default_max_message_length() -> usize {
    DISCORD_MESSAGE_LIMIT
}
fn default_max_embeds() -> usize {
    DEFAULT_MAX_EMBEDS
}
fn default_max_thread_name_length() -> usize {
    DEFAULT_THREAD_NAME_LENGTH
}
fn default_split_char() -> String {
    DEFAULT_SPLIT_CHAR.to_string()
}
fn default_discord_api_base() -> String {
    DEFAULT_DISCORD_API_BASE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-chunk content limit, prepend/append characters included.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "default_max_embeds")]
    pub max_embeds: usize,
    /// Forum thread titles are cut to this many chars.
    #[serde(default = "default_max_thread_name_length")]
    pub max_thread_name_length: usize,
    /// Used when a connection enables splitting without a split character.
    #[serde(default = "default_split_char")]
    pub default_split_char: String,
    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
            max_embeds: default_max_embeds(),
            max_thread_name_length: default_max_thread_name_length(),
            default_split_char: default_split_char(),
            discord_api_base: default_discord_api_base(),
        }
    }
}

impl DispatchConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension with a
    /// content-sniffing fallback.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)?;
        cfg.validated()
    }

    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_CONFIG_PATH,
                    reason: format!("{} does not exist", pb.display()),
                });
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_TOML).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_TOML))?
        } else if Path::new(DEFAULT_CONFIG_JSON).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_JSON))?
        } else {
            Self::default()
        };

        if let Some(limit) = parse_limit_env(std::env::var(ENV_MAX_MESSAGE_LENGTH).ok()) {
            cfg.max_message_length = limit;
        }

        tracing::debug!(target: "dispatch", config = ?cfg, "dispatch config loaded");
        cfg.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.max_message_length == 0 || self.max_message_length > DISCORD_MESSAGE_LIMIT {
            return Err(ConfigError::InvalidValue {
                key: "max_message_length",
                reason: format!("must be within 1..={DISCORD_MESSAGE_LIMIT}"),
            });
        }
        if self.max_thread_name_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_thread_name_length",
                reason: "must be positive".into(),
            });
        }
        Ok(self)
    }
}

// unparsable or zero values are ignored, like an unset variable
fn parse_limit_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DispatchConfig, ConfigError> {
    let try_toml_first = hint_ext == "toml" || (hint_ext != "json" && !s.trim_start().starts_with('{'));
    if try_toml_first {
        if let Ok(v) = toml::from_str::<DispatchConfig>(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str::<DispatchConfig>(s) {
        return Ok(v);
    }
    if !try_toml_first {
        if let Ok(v) = toml::from_str::<DispatchConfig>(s) {
            return Ok(v);
        }
    }
    Err(ConfigError::UnsupportedFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_fill_defaults() {
        let t = parse_config("max_message_length = 1500\n", "toml").unwrap();
        assert_eq!(t.max_message_length, 1500);
        assert_eq!(t.max_embeds, DEFAULT_MAX_EMBEDS);

        let j = parse_config(r#"{"default_split_char": " "}"#, "json").unwrap();
        assert_eq!(j.default_split_char, " ");
        assert_eq!(j.max_message_length, DISCORD_MESSAGE_LIMIT);
    }

    #[test]
    fn garbage_is_unsupported() {
        assert!(matches!(
            parse_config("max_message_length = [", ""),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[test]
    fn limits_are_validated() {
        let cfg = DispatchConfig {
            max_message_length: 5000,
            ..Default::default()
        };
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn env_limit_parsing() {
        assert_eq!(parse_limit_env(Some(" 1200 ".into())), Some(1200));
        assert_eq!(parse_limit_env(Some("0".into())), None);
        assert_eq!(parse_limit_env(Some("abc".into())), None);
        assert_eq!(parse_limit_env(None), None);
    }
}
