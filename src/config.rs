use std::str::FromStr;

use crate::error::ConfigError;

/// Alert channel settings: a bot credential and the chat it posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Configuration for the Frame Sentinel service loaded from environment variables.
///
/// All values are optional and fall back to defaults that talk to the public
/// OpenAI and Telegram endpoints. A missing alert channel disables alerting
/// for that category only.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fallback credential for the vision service.
    ///
    /// Used whenever a request does not carry its own `api_key`.
    /// Environment variable: `OPENAI_API_KEY`
    pub default_api_key: Option<String>,

    /// Chat completions endpoint of the vision service.
    /// Environment variable: `VISION_API_URL`
    pub vision_api_url: String,

    /// Model identifier sent with every analysis request.
    /// Environment variable: `VISION_MODEL`
    pub vision_model: String,

    /// Response-size budget for a single analysis.
    /// Environment variable: `VISION_MAX_TOKENS`
    pub vision_max_tokens: u32,

    /// Per-attempt timeout for the vision request.
    /// Environment variable: `VISION_TIMEOUT_SECONDS`
    pub vision_timeout_seconds: u64,

    /// Maximum number of rate-limit retries for one request.
    /// Environment variable: `RATE_LIMIT_MAX_RETRIES`
    pub rate_limit_max_retries: u32,

    /// Cap on the total time one request may spend sleeping on rate limits.
    /// Environment variable: `RATE_LIMIT_MAX_WAIT_SECONDS`
    pub rate_limit_max_wait_seconds: u64,

    /// Base URL of the Telegram Bot API.
    /// Environment variable: `TELEGRAM_API_URL`
    pub telegram_api_url: String,

    /// Channel receiving hand gesture alerts.
    /// Environment variables: `PEACESIGN_BOT_TOKEN`, `PEACESIGN_CHAT_ID`
    pub gesture_channel: Option<ChannelConfig>,

    /// Channel receiving weapon alerts. Defaults to the gesture channel's
    /// token and chat when unset.
    /// Environment variables: `WEAPON_BOT_TOKEN`, `WEAPON_CHAT_ID`
    pub weapon_channel: Option<ChannelConfig>,

    /// Interface the HTTP server binds to.
    /// Environment variable: `HOST`
    pub host: String,

    /// Port the HTTP server listens on.
    /// Environment variable: `PORT`
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value cannot be parsed, or if a chat id is
    /// configured without any bot token to post with.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let config = frame_sentinel::Config::load().expect("Failed to load configuration");
    /// ```
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gesture_token = get("PEACESIGN_BOT_TOKEN");
        let gesture_chat = get("PEACESIGN_CHAT_ID");
        let weapon_token = get("WEAPON_BOT_TOKEN").or_else(|| gesture_token.clone());
        let weapon_chat = get("WEAPON_CHAT_ID").or_else(|| gesture_chat.clone());

        let gesture_channel = channel(gesture_token, gesture_chat, "PEACESIGN_BOT_TOKEN")?;
        let weapon_channel = channel(weapon_token, weapon_chat, "WEAPON_BOT_TOKEN")?;

        Ok(Config {
            default_api_key: get("OPENAI_API_KEY"),
            vision_api_url: get("VISION_API_URL")
                .unwrap_or_else(|| constants::DEFAULT_VISION_API_URL.to_string()),
            vision_model: get("VISION_MODEL")
                .unwrap_or_else(|| constants::DEFAULT_VISION_MODEL.to_string()),
            vision_max_tokens: parse_or(get("VISION_MAX_TOKENS"), "VISION_MAX_TOKENS", 100)?,
            vision_timeout_seconds: parse_or(
                get("VISION_TIMEOUT_SECONDS"),
                "VISION_TIMEOUT_SECONDS",
                30,
            )?,
            rate_limit_max_retries: parse_or(
                get("RATE_LIMIT_MAX_RETRIES"),
                "RATE_LIMIT_MAX_RETRIES",
                5,
            )?,
            rate_limit_max_wait_seconds: parse_or(
                get("RATE_LIMIT_MAX_WAIT_SECONDS"),
                "RATE_LIMIT_MAX_WAIT_SECONDS",
                300,
            )?,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| constants::DEFAULT_TELEGRAM_API_URL.to_string()),
            gesture_channel,
            weapon_channel,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), "PORT", 5000)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn channel(
    token: Option<String>,
    chat_id: Option<String>,
    token_var: &str,
) -> Result<Option<ChannelConfig>, ConfigError> {
    match (token, chat_id) {
        (Some(bot_token), Some(chat_id)) => Ok(Some(ChannelConfig { bot_token, chat_id })),
        (None, Some(_)) => Err(ConfigError::MissingEnvVar {
            var_name: token_var.to_string(),
        }),
        _ => Ok(None),
    }
}

fn parse_or<T>(value: Option<String>, field: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Application constants used throughout the system.
pub mod constants {
    pub const DEFAULT_VISION_API_URL: &str = "https://api.openai.com/v1/chat/completions";

    pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

    pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

    /// Maximum accepted JSON request body (16 MiB).
    pub const MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;

    /// Caption length limit of the messaging platform, in characters.
    pub const CAPTION_LIMIT: usize = 1000;

    /// Fixed JPEG quality used when re-encoding frames.
    pub const JPEG_QUALITY: u8 = 95;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.vision_model, "gpt-4o-mini");
        assert_eq!(config.vision_max_tokens, 100);
        assert_eq!(config.port, 5000);
        assert!(config.default_api_key.is_none());
        assert!(config.gesture_channel.is_none());
        assert!(config.weapon_channel.is_none());
    }

    #[test]
    fn weapon_channel_falls_back_to_gesture_channel() {
        let config = load(&[
            ("PEACESIGN_BOT_TOKEN", "123:abc"),
            ("PEACESIGN_CHAT_ID", "-100"),
        ])
        .unwrap();
        assert_eq!(config.gesture_channel, config.weapon_channel);
        assert!(config.gesture_channel.is_some());
    }

    #[test]
    fn chat_without_token_is_rejected() {
        let result = load(&[("WEAPON_CHAT_ID", "-42")]);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar { .. })));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let result = load(&[("PORT", "eighty")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
