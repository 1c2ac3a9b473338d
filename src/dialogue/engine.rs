//! DialogueEngine — loads a sender's session, runs the transition, writes the
//! session back and executes the effects.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};

use super::messages::DayPeriod;
use super::state::DialogueState;
use super::transition::{Effect, TurnContext, transition};
use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;
use crate::leads::LeadLedger;
use crate::sessions::SessionStore;

/// Drives conversations for every sender identity.
pub struct DialogueEngine {
    sessions: Arc<SessionStore>,
    ledger: Arc<dyn LeadLedger>,
    typing_delay: Duration,
    lead_source: String,
}

impl DialogueEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        ledger: Arc<dyn LeadLedger>,
        typing_delay: Duration,
        lead_source: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            typing_delay,
            lead_source: lead_source.into(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn turn_context(&self) -> TurnContext {
        TurnContext {
            period: DayPeriod::of(&Local::now()),
            now: Utc::now(),
            lead_source: self.lead_source.clone(),
        }
    }

    /// Process one inbound message and return the sender's new state.
    ///
    /// Must not run concurrently for the same sender. The session is written
    /// back before any effect runs, so a failed send never rolls it back.
    pub async fn handle(
        &self,
        channels: &ChannelManager,
        msg: &IncomingMessage,
    ) -> Result<DialogueState, ChannelError> {
        let session = self.sessions.get_or_create(&msg.user_id).await;
        let from = session.state;

        let result = transition(&session, &msg.content, &self.turn_context());
        let to = result.session.state;
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");

        if from == DialogueState::Unknown {
            tracing::warn!(user_id = %msg.user_id, "Unrecognized session state, restarting");
        }
        tracing::debug!(user_id = %msg.user_id, channel = %msg.channel, %from, %to, "Dialogue transition");

        self.sessions.put(&msg.user_id, result.session).await;

        for effect in result.effects {
            match effect {
                Effect::PersistLead(lead) => {
                    if let Err(e) = self.ledger.append(&lead).await {
                        // The user already confirmed; re-asking would not help.
                        tracing::error!(user_id = %msg.user_id, "Failed to persist lead: {e}");
                    }
                }
                Effect::Reply(text) => self.reply(channels, msg, text).await?,
            }
        }

        Ok(to)
    }

    /// Typing indicator, pause, then the text. Indicator failures are ignored.
    async fn reply(
        &self,
        channels: &ChannelManager,
        msg: &IncomingMessage,
        text: String,
    ) -> Result<(), ChannelError> {
        if let Err(e) = channels.send_status(msg, StatusUpdate::Typing).await {
            tracing::warn!(user_id = %msg.user_id, "Typing indicator failed: {e}");
        }
        if !self.typing_delay.is_zero() {
            tokio::time::sleep(self.typing_delay).await;
        }
        channels.respond(msg, OutgoingResponse::text(text)).await
    }
}
