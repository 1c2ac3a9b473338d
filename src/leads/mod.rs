//! Lead records and the append-only ledger they are written to.

pub mod ledger;
pub mod model;

pub use ledger::{CsvLedger, LEDGER_HEADER, LeadLedger};
pub use model::Lead;
