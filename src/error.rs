//! Error types for leadbot.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("No channels enabled. {hint}")]
    NoChannels { hint: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("No channel registered under {name}")]
    NotFound { name: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Lead ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to write lead ledger at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
