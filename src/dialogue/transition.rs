//! Pure transition function.
//!
//! Given a session and one inbound text, computes the next session and the
//! effects to run. No I/O happens here; the engine executes the effects.

use chrono::{DateTime, Utc};

use super::messages::{self, DayPeriod};
use super::state::{Contact, DialogueState, Session};
use super::subject::classify;
use super::validate::{extract_phone, is_affirmative, is_negative, normalize_email, normalize_name};
use crate::leads::Lead;

/// Side effects to execute after a transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show the typing indicator, wait, then send this text to the sender.
    Reply(String),
    /// Append a lead to the ledger.
    PersistLead(Lead),
}

/// Environment a single turn is decided in.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Local time-of-day bucket for greetings.
    pub period: DayPeriod,
    /// Timestamp stamped on a lead confirmed during this turn.
    pub now: DateTime<Utc>,
    /// Source tag for leads.
    pub lead_source: String,
}

/// Result of a transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(session: Session) -> Self {
        Self {
            session,
            effects: Vec::new(),
        }
    }

    fn reply(mut self, text: impl Into<String>) -> Self {
        self.effects.push(Effect::Reply(text.into()));
        self
    }

    fn persist(mut self, lead: Lead) -> Self {
        self.effects.push(Effect::PersistLead(lead));
        self
    }

    /// Texts of all reply effects, in order.
    pub fn replies(&self) -> Vec<&str> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Reply(text) => Some(text.as_str()),
                Effect::PersistLead(_) => None,
            })
            .collect()
    }

    /// The lead persisted by this transition, if any.
    pub fn lead(&self) -> Option<&Lead> {
        self.effects.iter().find_map(|e| match e {
            Effect::PersistLead(lead) => Some(lead),
            Effect::Reply(_) => None,
        })
    }
}

/// Decide the next session and effects for one inbound message.
pub fn transition(session: &Session, input: &str, ctx: &TurnContext) -> Transition {
    let mut next = session.clone();

    match session.state {
        DialogueState::Menu => {
            next.state = DialogueState::ChoosingSubject;
            Transition::new(next).reply(messages::greeting(ctx.period))
        }

        DialogueState::ChoosingSubject => match classify(input) {
            Some(subject) => {
                next.subject = Some(subject);
                next.state = DialogueState::CollectingName;
                Transition::new(next).reply(messages::ASK_NAME)
            }
            None => Transition::new(next).reply(messages::not_understood(ctx.period)),
        },

        DialogueState::CollectingName => match normalize_name(input) {
            Some(name) => {
                next.contact.name = name;
                next.state = DialogueState::CollectingEmail;
                Transition::new(next).reply(messages::ASK_EMAIL)
            }
            None => Transition::new(next).reply(messages::ASK_NAME_AGAIN),
        },

        DialogueState::CollectingEmail => match normalize_email(input) {
            Some(email) => {
                next.contact.email = email;
                next.state = DialogueState::CollectingPhone;
                Transition::new(next).reply(messages::ASK_PHONE)
            }
            None => Transition::new(next).reply(messages::INVALID_EMAIL),
        },

        DialogueState::CollectingPhone => match extract_phone(input) {
            Some(phone) => {
                next.contact.phone = phone;
                next.state = DialogueState::Confirming;
                let summary = messages::summary(next.subject, &next.contact);
                Transition::new(next).reply(summary)
            }
            None => Transition::new(next).reply(messages::INVALID_PHONE),
        },

        DialogueState::Confirming => {
            if is_affirmative(input) {
                let lead = Lead::from_session(session, &ctx.lead_source, ctx.now);
                next.state = DialogueState::Done;
                Transition::new(next)
                    .persist(lead)
                    .reply(messages::CONFIRMED)
            } else if is_negative(input) {
                next.contact = Contact::default();
                next.state = DialogueState::CollectingName;
                Transition::new(next)
                    .reply(messages::LETS_FIX)
                    .reply(messages::ASK_NAME)
            } else {
                let text = messages::answer_yes_or_no(session.subject, &session.contact);
                Transition::new(next).reply(text)
            }
        }

        DialogueState::Done => Transition::new(next).reply(messages::AWAITING_REVIEW),

        DialogueState::Unknown => {
            let mut fresh = Session::new();
            fresh.state = DialogueState::ChoosingSubject;
            Transition::new(fresh).reply(messages::restart(ctx.period))
        }
    }
}
