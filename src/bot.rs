//! Main bot loop and per-sender dispatch.
//!
//! Messages from every channel arrive on one merged stream. The dispatcher
//! hands each one to a worker task owned by its sender identity, so one
//! sender's messages are handled strictly in order while different senders
//! proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::config::BotConfig;
use crate::dialogue::DialogueEngine;
use crate::error::{ConfigError, Error};
use crate::sessions::spawn_pruning_task;

/// How often idle workers are retired.
const WORKER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for queued replies to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

struct Worker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
    last_dispatch: Instant,
}

/// Routes messages to one sequential worker per sender identity.
pub struct Dispatcher {
    engine: Arc<DialogueEngine>,
    channels: Arc<ChannelManager>,
    workers: HashMap<String, Worker>,
    /// Workers whose queue was closed but may still be finishing a message.
    retired: HashMap<String, JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(engine: Arc<DialogueEngine>, channels: Arc<ChannelManager>) -> Self {
        Self {
            engine,
            channels,
            workers: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// Number of live workers.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a message on its sender's worker, spawning one if needed.
    pub fn dispatch(&mut self, msg: IncomingMessage) {
        let key = msg.user_id.clone();

        let msg = if let Some(worker) = self.workers.get_mut(&key) {
            match worker.tx.send(msg) {
                Ok(()) => {
                    worker.last_dispatch = Instant::now();
                    return;
                }
                Err(mpsc::error::SendError(msg)) => msg,
            }
        } else {
            msg
        };

        // Still present here only if the worker died (panicked).
        if self.workers.remove(&key).is_some() {
            tracing::warn!(user_id = %key, "Session worker gone, respawning");
        }

        let worker = self.spawn_worker(&key);
        // A freshly created receiver is alive, so this cannot fail.
        let _ = worker.tx.send(msg);
        self.workers.insert(key, worker);
    }

    fn spawn_worker(&mut self, key: &str) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let engine = Arc::clone(&self.engine);
        let channels = Arc::clone(&self.channels);
        let previous = self.retired.remove(key);
        let user_id = key.to_string();

        let handle = tokio::spawn(async move {
            // Never overlap with a retired worker for the same sender.
            if let Some(prev) = previous {
                let _ = prev.await;
            }
            while let Some(msg) = rx.recv().await {
                if let Err(e) = engine.handle(&channels, &msg).await {
                    tracing::error!(user_id = %user_id, channel = %msg.channel, "Failed to deliver reply: {e}");
                }
            }
            tracing::debug!(user_id = %user_id, "Session worker stopped");
        });

        Worker {
            tx,
            handle,
            last_dispatch: Instant::now(),
        }
    }

    /// Close the queues of workers idle for longer than `max_idle`.
    pub fn retire_idle(&mut self, max_idle: Duration) -> usize {
        let idle: Vec<String> = self
            .workers
            .iter()
            .filter(|(_, w)| w.last_dispatch.elapsed() > max_idle)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &idle {
            if let Some(worker) = self.workers.remove(key) {
                // Dropping the sender lets the worker drain and exit.
                drop(worker.tx);
                self.retired.insert(key.clone(), worker.handle);
            }
        }
        self.retired.retain(|_, h| !h.is_finished());
        idle.len()
    }

    /// Close every queue and wait for queued messages to be handled.
    pub async fn shutdown(mut self, grace: Duration) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .drain()
            .map(|(_, w)| w.handle)
            .chain(self.retired.drain().map(|(_, h)| h))
            .collect();

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!("Timed out waiting for session workers to finish");
        }
    }
}

/// The bot: channels in, dialogue engine in the middle, replies out.
pub struct Bot {
    config: BotConfig,
    engine: Arc<DialogueEngine>,
    channels: Arc<ChannelManager>,
}

impl Bot {
    pub fn new(config: BotConfig, engine: Arc<DialogueEngine>, channels: ChannelManager) -> Self {
        Self {
            config,
            engine,
            channels: Arc::new(channels),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), Error> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels {
                hint: "Set TELEGRAM_BOT_TOKEN or LEADBOT_CLI=1.".into(),
            }
            .into());
        }

        let mut message_stream = self.channels.start_all().await?;

        let idle_timeout = self.config.session_idle_timeout;
        let pruning_handle = idle_timeout
            .map(|t| spawn_pruning_task(Arc::clone(self.engine.sessions()), t));

        let mut dispatcher = Dispatcher::new(Arc::clone(&self.engine), Arc::clone(&self.channels));
        let mut sweep = tokio::time::interval(WORKER_SWEEP_INTERVAL);
        sweep.tick().await; // Skip immediate first tick

        tracing::info!(channels = ?self.channels.names(), "Bot ready and listening");

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => dispatcher.dispatch(m),
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
                _ = sweep.tick() => {
                    if let Some(max_idle) = idle_timeout {
                        let retired = dispatcher.retire_idle(max_idle);
                        if retired > 0 {
                            tracing::debug!(retired, "Retired idle session workers");
                        }
                    }
                }
            }
        }

        tracing::info!("Bot shutting down...");
        dispatcher.shutdown(SHUTDOWN_GRACE).await;
        if let Some(handle) = pruning_handle {
            handle.abort();
        }
        self.channels.shutdown_all().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::channels::{Channel, MessageStream, OutgoingResponse};
    use crate::dialogue::DialogueState;
    use crate::error::{ChannelError, LedgerError};
    use crate::leads::{Lead, LeadLedger};
    use crate::sessions::SessionStore;

    struct Sink {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl Channel for Sink {
        fn name(&self) -> &str {
            "test"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn respond(
            &self,
            msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((msg.user_id.clone(), response.content));
            Ok(())
        }
    }

    struct NullLedger;

    #[async_trait]
    impl LeadLedger for NullLedger {
        async fn append(&self, _lead: &Lead) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    fn dispatcher(delay: Duration) -> (Dispatcher, Arc<SessionStore>, Arc<Mutex<Vec<(String, String)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut channels = ChannelManager::new();
        channels.add(Box::new(Sink {
            sent: Arc::clone(&sent),
        }));
        let store = SessionStore::new();
        let engine = Arc::new(DialogueEngine::new(
            Arc::clone(&store),
            Arc::new(NullLedger),
            delay,
            "WhatsApp",
        ));
        (Dispatcher::new(engine, Arc::new(channels)), store, sent)
    }

    fn msg(user: &str, text: &str) -> IncomingMessage {
        IncomingMessage::new("test", user, text)
    }

    #[tokio::test]
    async fn run_without_channels_is_a_config_error() {
        let engine = Arc::new(DialogueEngine::new(
            SessionStore::new(),
            Arc::new(NullLedger),
            Duration::ZERO,
            "WhatsApp",
        ));
        let bot = Bot::new(BotConfig::default(), engine, ChannelManager::new());
        let err = bot.run().await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NoChannels { .. })));
    }

    #[tokio::test]
    async fn burst_from_one_sender_is_handled_in_order() {
        let (mut d, store, sent) = dispatcher(Duration::from_millis(5));
        for text in ["oi", "3", "Maria Silva", "maria@ex.com", "83996438245"] {
            d.dispatch(msg("alice", text));
        }
        assert_eq!(d.active_workers(), 1);
        d.shutdown(Duration::from_secs(5)).await;

        assert_eq!(store.get("alice").await.unwrap().state, DialogueState::Confirming);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 5);
        assert!(sent[4].1.contains("Nome: Maria Silva"));
    }

    #[tokio::test]
    async fn senders_get_separate_workers_and_sessions() {
        let (mut d, store, _) = dispatcher(Duration::ZERO);
        d.dispatch(msg("alice", "oi"));
        d.dispatch(msg("bob", "oi"));
        d.dispatch(msg("alice", "1"));
        assert_eq!(d.active_workers(), 2);
        d.shutdown(Duration::from_secs(5)).await;

        assert_eq!(store.get("alice").await.unwrap().state, DialogueState::CollectingName);
        assert_eq!(store.get("bob").await.unwrap().state, DialogueState::ChoosingSubject);
    }

    #[tokio::test]
    async fn retired_worker_is_replaced_without_losing_order() {
        let (mut d, store, _) = dispatcher(Duration::from_millis(5));
        d.dispatch(msg("alice", "oi"));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(d.retire_idle(Duration::from_millis(1)), 1);
        assert_eq!(d.active_workers(), 0);

        d.dispatch(msg("alice", "4"));
        d.shutdown(Duration::from_secs(5)).await;

        let session = store.get("alice").await.unwrap();
        assert_eq!(session.state, DialogueState::CollectingName);
        assert_eq!(session.subject, Some(crate::dialogue::Subject::MonthlyAccounting));
    }
}
