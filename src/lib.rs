//! leadbot — scripted lead-intake chat bot.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod leads;
pub mod sessions;
