//! Subject menu and free-text subject classification.
//!
//! A user may answer the menu with the literal digit or by typing what they
//! want. Digits are checked first; otherwise the diacritic-folded text is
//! matched against an ordered keyword table, first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::validate::fold;

/// The five subjects offered in the greeting menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    CompanyFormation,
    TaxConsulting,
    IncomeTaxReturn,
    MonthlyAccounting,
    Other,
}

impl Subject {
    /// Menu order. Index + 1 is the digit shown to the user.
    pub const ALL: [Subject; 5] = [
        Subject::CompanyFormation,
        Subject::TaxConsulting,
        Subject::IncomeTaxReturn,
        Subject::MonthlyAccounting,
        Subject::Other,
    ];

    /// Human-readable label, as shown in the menu and written to the ledger.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CompanyFormation => "Abertura de empresa",
            Self::TaxConsulting => "Consultoria tributária",
            Self::IncomeTaxReturn => "Declaração de imposto de renda",
            Self::MonthlyAccounting => "Serviços de contabilidade mensal",
            Self::Other => "Outro assunto",
        }
    }

    /// The menu digit for this subject (1..=5).
    pub fn number(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Look up a subject by its exact menu digit.
    pub fn from_digit(input: &str) -> Option<Subject> {
        match input {
            "1" => Some(Self::CompanyFormation),
            "2" => Some(Self::TaxConsulting),
            "3" => Some(Self::IncomeTaxReturn),
            "4" => Some(Self::MonthlyAccounting),
            "5" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A keyword rule: every regex in `all_of` must match the folded input.
struct SubjectRule {
    all_of: Vec<Regex>,
    subject: Subject,
}

impl SubjectRule {
    fn new(patterns: &[&str], subject: Subject) -> Self {
        Self {
            all_of: patterns
                .iter()
                .map(|p| Regex::new(p).expect("subject pattern is valid"))
                .collect(),
            subject,
        }
    }

    fn matches(&self, folded: &str) -> bool {
        self.all_of.iter().all(|r| r.is_match(folded))
    }
}

static RULES: LazyLock<Vec<SubjectRule>> = LazyLock::new(|| {
    vec![
        SubjectRule::new(&["abertura", "empresa"], Subject::CompanyFormation),
        SubjectRule::new(&["consultoria|tributaria"], Subject::TaxConsulting),
        SubjectRule::new(&[r"imposto de renda|declarac?a?o|^ir\b"], Subject::IncomeTaxReturn),
        SubjectRule::new(&["contabilidade|mensal"], Subject::MonthlyAccounting),
        SubjectRule::new(&["outro|duvida"], Subject::Other),
    ]
});

/// Match free text against the keyword table only (no digit lookup).
pub fn match_keywords(input: &str) -> Option<Subject> {
    let folded = fold(input);
    RULES.iter().find(|r| r.matches(&folded)).map(|r| r.subject)
}

/// Classify a menu answer: exact digit first, then keyword fallback.
pub fn classify(input: &str) -> Option<Subject> {
    Subject::from_digit(input.trim()).or_else(|| match_keywords(input))
}
