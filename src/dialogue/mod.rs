//! Dialogue engine — the scripted lead-collection conversation.
//!
//! Each sender identity walks a linear form: pick a subject, then name,
//! email and phone, then confirm. Every step validates its input in place
//! and re-prompts on failure. A confirmed form becomes a [`Lead`].
//!
//! [`transition`] decides; [`DialogueEngine`] executes the resulting
//! effects against a channel and the lead ledger.
//!
//! [`Lead`]: crate::leads::Lead

pub mod engine;
pub mod messages;
pub mod state;
pub mod subject;
pub mod transition;
pub mod validate;

pub use engine::DialogueEngine;
pub use messages::DayPeriod;
pub use state::{Contact, DialogueState, Session};
pub use subject::Subject;
pub use transition::{Effect, Transition, TurnContext, transition};
