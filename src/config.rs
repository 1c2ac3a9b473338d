//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default source tag stamped on every lead.
pub const DEFAULT_LEAD_SOURCE: &str = "WhatsApp";

/// Bot configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Directory for transport session state (polling offsets, credentials).
    pub session_dir: PathBuf,
    /// CSV file that accumulates confirmed leads.
    pub leads_path: PathBuf,
    /// Value written to the `Origem` column.
    pub lead_source: String,
    /// Pause between the typing indicator and each reply.
    pub typing_delay: Duration,
    /// Sessions idle longer than this are evicted. `None` keeps them forever.
    pub session_idle_timeout: Option<Duration>,
    /// Telegram bot token. Telegram is disabled when unset.
    pub telegram_token: Option<SecretString>,
    /// Telegram usernames / numeric IDs allowed to talk to the bot (`*` = everyone).
    pub telegram_allowed_users: Vec<String>,
    /// Whether the stdin/stdout channel is enabled.
    pub cli_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from(".bot_session"),
            leads_path: PathBuf::from("leads.csv"),
            lead_source: DEFAULT_LEAD_SOURCE.to_string(),
            typing_delay: Duration::from_millis(3000),
            session_idle_timeout: None,
            telegram_token: None,
            telegram_allowed_users: vec!["*".to_string()],
            cli_enabled: true,
        }
    }
}

impl BotConfig {
    /// Build config from environment variables, falling back to defaults
    /// relative to the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let session_dir = lookup("SESSION_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.session_dir);

        let leads_path = lookup("LEADS_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.leads_path);

        let lead_source = lookup("LEAD_SOURCE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.lead_source);

        let typing_delay = match lookup("TYPING_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_u64("TYPING_DELAY_MS", &raw)?),
            None => defaults.typing_delay,
        };

        let session_idle_timeout = match lookup("SESSION_IDLE_TIMEOUT_SECS") {
            Some(raw) => match parse_u64("SESSION_IDLE_TIMEOUT_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.session_idle_timeout,
        };

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let telegram_allowed_users: Vec<String> = lookup("TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // CLI defaults on only when there is no real transport.
        let cli_enabled = match lookup("LEADBOT_CLI") {
            Some(raw) => parse_bool("LEADBOT_CLI", &raw)?,
            None => telegram_token.is_none(),
        };

        Ok(Self {
            session_dir,
            leads_path,
            lead_source,
            typing_delay,
            session_idle_timeout,
            telegram_token,
            telegram_allowed_users,
            cli_enabled,
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a non-negative integer, got {raw:?}"),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {raw:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.session_dir, PathBuf::from(".bot_session"));
        assert_eq!(config.leads_path, PathBuf::from("leads.csv"));
        assert_eq!(config.lead_source, "WhatsApp");
        assert_eq!(config.typing_delay, Duration::from_millis(3000));
        assert!(config.session_idle_timeout.is_none());
        assert!(config.telegram_token.is_none());
        assert!(config.cli_enabled);
    }

    #[test]
    fn paths_and_timings_from_env() {
        let config = config_from(&[
            ("SESSION_DIR", "/data/session"),
            ("LEADS_PATH", "/data/out/leads.csv"),
            ("TYPING_DELAY_MS", "250"),
            ("SESSION_IDLE_TIMEOUT_SECS", "3600"),
        ])
        .unwrap();
        assert_eq!(config.session_dir, PathBuf::from("/data/session"));
        assert_eq!(config.leads_path, PathBuf::from("/data/out/leads.csv"));
        assert_eq!(config.typing_delay, Duration::from_millis(250));
        assert_eq!(config.session_idle_timeout, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn zero_idle_timeout_disables_eviction() {
        let config = config_from(&[("SESSION_IDLE_TIMEOUT_SECS", "0")]).unwrap();
        assert!(config.session_idle_timeout.is_none());
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = config_from(&[("TYPING_DELAY_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TYPING_DELAY_MS"));
    }

    #[test]
    fn telegram_token_turns_cli_off_by_default() {
        let config = config_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:ABC"),
            ("TELEGRAM_ALLOWED_USERS", "alice, 42 ,"),
        ])
        .unwrap();
        assert_eq!(
            config.telegram_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("123:ABC".to_string())
        );
        assert_eq!(config.telegram_allowed_users, vec!["alice", "42"]);
        assert!(!config.cli_enabled);
    }

    #[test]
    fn cli_flag_overrides_default() {
        let config = config_from(&[("TELEGRAM_BOT_TOKEN", "t"), ("LEADBOT_CLI", "yes")]).unwrap();
        assert!(config.cli_enabled);

        let err = config_from(&[("LEADBOT_CLI", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
