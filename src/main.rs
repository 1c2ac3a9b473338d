use std::sync::Arc;

use leadbot::bot::Bot;
use leadbot::channels::{Channel, ChannelManager, CliChannel, TelegramChannel};
use leadbot::config::BotConfig;
use leadbot::dialogue::DialogueEngine;
use leadbot::leads::{CsvLedger, LeadLedger};
use leadbot::sessions::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 leadbot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Leads: {}", config.leads_path.display());
    eprintln!("   Session dir: {}", config.session_dir.display());
    eprintln!("   Typing delay: {}ms", config.typing_delay.as_millis());
    match config.session_idle_timeout {
        Some(t) => eprintln!("   Session idle timeout: {}s", t.as_secs()),
        None => eprintln!("   Session idle timeout: never"),
    }

    // ── Core ─────────────────────────────────────────────────────────────
    let ledger: Arc<dyn LeadLedger> = Arc::new(CsvLedger::new(config.leads_path.clone()));
    let sessions = SessionStore::new();
    let engine = Arc::new(DialogueEngine::new(
        sessions,
        ledger,
        config.typing_delay,
        config.lead_source.clone(),
    ));

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    if let Some(ref token) = config.telegram_token {
        let allowed = &config.telegram_allowed_users;
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if allowed.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                allowed.join(", ")
            }
        );
        let telegram = TelegramChannel::new(
            token.clone(),
            allowed.clone(),
            config.session_dir.clone(),
        );
        if let Err(e) = telegram.health_check().await {
            tracing::warn!("Telegram health check failed: {e}");
        }
        channels.add(Box::new(telegram));
    }

    if config.cli_enabled {
        channels.add(Box::new(CliChannel::new()));
    }

    eprintln!("   Channels: {}\n", channels.names().join(", "));

    Bot::new(config, engine, channels).run().await?;

    Ok(())
}
