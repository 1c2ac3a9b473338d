//! Dialogue state machine — tracks which collection step a sender is in.

use serde::{Deserialize, Serialize};

use super::subject::Subject;

/// The steps of the lead-collection conversation.
///
/// Progresses linearly: Menu → ChoosingSubject → CollectingName →
/// CollectingEmail → CollectingPhone → Confirming → Done. A negative
/// confirmation loops back to CollectingName.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Menu,
    ChoosingSubject,
    CollectingName,
    CollectingEmail,
    CollectingPhone,
    Confirming,
    Done,
    /// A stored state value that could not be recognized.
    #[serde(other)]
    Unknown,
}

impl DialogueState {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying in place (a re-prompt) is always allowed except out of `Unknown`.
    pub fn can_transition_to(&self, target: DialogueState) -> bool {
        use DialogueState::*;
        if *self == target && *self != Unknown {
            return true;
        }
        matches!(
            (self, target),
            (Menu, ChoosingSubject)
                | (ChoosingSubject, CollectingName)
                | (CollectingName, CollectingEmail)
                | (CollectingEmail, CollectingPhone)
                | (CollectingPhone, Confirming)
                | (Confirming, Done)
                | (Confirming, CollectingName)
                | (Unknown, ChoosingSubject)
        )
    }
}

impl std::fmt::Display for DialogueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Menu => "menu",
            Self::ChoosingSubject => "choosing_subject",
            Self::CollectingName => "collecting_name",
            Self::CollectingEmail => "collecting_email",
            Self::CollectingPhone => "collecting_phone",
            Self::Confirming => "confirming",
            Self::Done => "done",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Contact details collected field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Contact {
    /// Whether no field has been filled yet.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.phone.is_empty()
    }
}

/// Conversation record for one sender identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Current step.
    pub state: DialogueState,
    /// Chosen subject. Survives a "redo data" loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    /// Contact fields, wiped wholesale on a negative confirmation.
    #[serde(default)]
    pub contact: Contact,
}

impl Session {
    /// A fresh session at the menu with nothing collected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject label, or an empty string when none was chosen.
    pub fn subject_label(&self) -> &'static str {
        self.subject.map(|s| s.label()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DialogueState; 8] = [
        DialogueState::Menu,
        DialogueState::ChoosingSubject,
        DialogueState::CollectingName,
        DialogueState::CollectingEmail,
        DialogueState::CollectingPhone,
        DialogueState::Confirming,
        DialogueState::Done,
        DialogueState::Unknown,
    ];

    #[test]
    fn forward_chain_is_valid() {
        use DialogueState::*;
        let chain = [
            (Menu, ChoosingSubject),
            (ChoosingSubject, CollectingName),
            (CollectingName, CollectingEmail),
            (CollectingEmail, CollectingPhone),
            (CollectingPhone, Confirming),
            (Confirming, Done),
        ];
        for (from, to) in chain {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn rejection_loops_back_to_name() {
        assert!(DialogueState::Confirming.can_transition_to(DialogueState::CollectingName));
    }

    #[test]
    fn invalid_transitions() {
        use DialogueState::*;
        assert!(!Menu.can_transition_to(CollectingName));
        assert!(!CollectingName.can_transition_to(CollectingPhone));
        assert!(!CollectingEmail.can_transition_to(CollectingName));
        assert!(!Done.can_transition_to(Menu));
        assert!(!Done.can_transition_to(CollectingName));
        assert!(!Unknown.can_transition_to(Unknown));
    }

    #[test]
    fn default_is_menu() {
        assert_eq!(DialogueState::default(), DialogueState::Menu);
        assert_eq!(Session::new().state, DialogueState::Menu);
    }

    #[test]
    fn display_matches_serde() {
        for state in ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{state}\""), json, "Display and serde should match for {state:?}");
        }
    }

    #[test]
    fn unrecognized_state_deserializes_as_unknown() {
        let state: DialogueState = serde_json::from_str("\"final\"").unwrap();
        assert_eq!(state, DialogueState::Unknown);
    }

    #[test]
    fn new_session_is_at_menu_and_empty() {
        let session = Session::new();
        assert_eq!(session.state, DialogueState::Menu);
        assert!(session.subject.is_none());
        assert!(session.contact.is_empty());
        assert_eq!(session.subject_label(), "");
    }
}
