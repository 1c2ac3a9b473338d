//! Lead record produced when a user confirms their data.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::dialogue::Session;

/// A qualified contact, written once to the ledger and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub subject: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub source: String,
    pub submitted_at: DateTime<Utc>,
}

impl Lead {
    /// Build a lead from a confirmed session.
    pub fn from_session(session: &Session, source: &str, submitted_at: DateTime<Utc>) -> Self {
        Self {
            subject: session.subject_label().to_string(),
            name: session.contact.name.clone(),
            email: session.contact.email.clone(),
            phone: session.contact.phone.clone(),
            source: source.to_string(),
            submitted_at,
        }
    }

    /// Submission time as ISO-8601 UTC with millisecond precision.
    pub fn submitted_at_iso(&self) -> String {
        self.submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Fields in ledger column order.
    pub fn columns(&self) -> [String; 6] {
        [
            self.subject.clone(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.source.clone(),
            self.submitted_at_iso(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::dialogue::{Contact, DialogueState, Subject};

    #[test]
    fn built_from_confirmed_session() {
        let session = Session {
            state: DialogueState::Confirming,
            subject: Some(Subject::CompanyFormation),
            contact: Contact {
                name: "Maria Silva".into(),
                email: "maria@ex.com".into(),
                phone: "83996438245".into(),
            },
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let lead = Lead::from_session(&session, "WhatsApp", at);

        assert_eq!(lead.subject, "Abertura de empresa");
        assert_eq!(lead.name, "Maria Silva");
        assert_eq!(lead.source, "WhatsApp");
        assert_eq!(lead.submitted_at_iso(), "2024-03-05T14:07:09.000Z");
        assert_eq!(lead.columns()[3], "83996438245");
    }
}
