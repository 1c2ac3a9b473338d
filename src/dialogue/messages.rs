//! Outbound message templates (pt-BR).

use chrono::Timelike;

use super::state::Contact;
use super::subject::Subject;

/// Time-of-day bucket used to pick the greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    /// Bucket a local hour: [5, 12) morning, [12, 18) afternoon, else evening.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    /// Bucket the hour of a timestamp in its own timezone.
    pub fn of<T: Timelike>(time: &T) -> Self {
        Self::from_hour(time.hour())
    }

    pub fn salutation(&self) -> &'static str {
        match self {
            Self::Morning => "Bom Dia",
            Self::Afternoon => "Boa Tarde",
            Self::Evening => "Boa Noite",
        }
    }
}

pub const ASK_NAME: &str = "Perfeito!\nPara retornarmos o contato, preciso de algumas informações:\n\nDigite para mim o seu *nome*.";
pub const ASK_NAME_AGAIN: &str = "Consegui entender só parcialmente. Pode enviar seu *nome completo*?";
pub const ASK_EMAIL: &str = "Agora, me diga o seu *e-mail*.";
pub const INVALID_EMAIL: &str = "Hmm, esse e-mail parece inválido. Tente no formato *nome@dominio.com*.";
pub const ASK_PHONE: &str = "Por fim, me fale o seu *WhatsApp* (com DDD).";
pub const INVALID_PHONE: &str = "Não reconheci o número. Envie com *DDD* (ex.: 83996438245).";
pub const CONFIRMED: &str = "Obrigado pelas informações! ✅\nNossa equipe vai entrar em contato em breve.";
pub const LETS_FIX: &str = "Sem problemas! Vamos corrigir os dados.";
pub const AWAITING_REVIEW: &str = "Agradecemos pelo contato. Nossa equipe já está analisando suas informações e logo falará com você. Aguarde um momento, por favor.";

/// Greeting with the numbered subject menu.
pub fn greeting(period: DayPeriod) -> String {
    let menu = Subject::ALL
        .iter()
        .map(|s| format!("{} {}", s.number(), s.label()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}!\n\nPara agilizar seu atendimento,\nsobre qual assunto deseja falar?\n\n{menu}",
        period.salutation()
    )
}

/// Menu answer not recognized.
pub fn not_understood(period: DayPeriod) -> String {
    format!("Não entendi. Por favor, escolha *1 a 5*.\n\n{}", greeting(period))
}

/// Recovery after an unrecognized session state.
pub fn restart(period: DayPeriod) -> String {
    format!("Vamos recomeçar.\n\n{}", greeting(period))
}

/// Backslash-escape the characters that chat Markdown treats as markup, so a
/// user-typed value is shown exactly as it was stored.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Summary of the collected data with the yes/no question.
pub fn summary(subject: Option<Subject>, contact: &Contact) -> String {
    format!(
        "Você digitou:\n\n\
         Assunto: {}\n\
         Nome: {}\n\
         E-mail: {}\n\
         WhatsApp: {}\n\n\
         Está correto?\n\n\
         *Sim* / *Não*",
        subject.map(|s| s.label()).unwrap_or("-"),
        escape_markdown(&contact.name),
        escape_markdown(&contact.email),
        escape_markdown(&contact.phone)
    )
}

/// Confirmation answer was neither yes nor no.
pub fn answer_yes_or_no(subject: Option<Subject>, contact: &Contact) -> String {
    format!("Por favor, responda *Sim* ou *Não*.\n\n{}", summary(subject, contact))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    #[test]
    fn hour_buckets() {
        assert_eq!(DayPeriod::from_hour(6), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(14), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(20), DayPeriod::Evening);
    }

    #[test]
    fn bucket_edges() {
        assert_eq!(DayPeriod::from_hour(4), DayPeriod::Evening);
        assert_eq!(DayPeriod::from_hour(5), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(11), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(12), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(17), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(18), DayPeriod::Evening);
        assert_eq!(DayPeriod::from_hour(0), DayPeriod::Evening);
    }

    #[test]
    fn period_of_timestamp() {
        let t = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert_eq!(DayPeriod::of(&t), DayPeriod::Afternoon);
    }

    #[test]
    fn greeting_variants() {
        assert!(greeting(DayPeriod::Morning).starts_with("Bom Dia!"));
        assert!(greeting(DayPeriod::Afternoon).starts_with("Boa Tarde!"));
        assert!(greeting(DayPeriod::Evening).starts_with("Boa Noite!"));
    }

    #[test]
    fn greeting_lists_five_numbered_subjects() {
        let text = greeting(DayPeriod::Morning);
        assert!(text.contains("1 Abertura de empresa"));
        assert!(text.contains("2 Consultoria tributária"));
        assert!(text.contains("3 Declaração de imposto de renda"));
        assert!(text.contains("4 Serviços de contabilidade mensal"));
        assert!(text.contains("5 Outro assunto"));
    }

    #[test]
    fn summary_includes_all_fields() {
        let contact = Contact {
            name: "Maria Silva".into(),
            email: "maria@ex.com".into(),
            phone: "83996438245".into(),
        };
        let text = summary(Some(Subject::TaxConsulting), &contact);
        assert!(text.contains("Assunto: Consultoria tributária"));
        assert!(text.contains("Nome: Maria Silva"));
        assert!(text.contains("E-mail: maria@ex.com"));
        assert!(text.contains("WhatsApp: 83996438245"));
        assert!(text.ends_with("*Sim* / *Não*"));
    }

    #[test]
    fn summary_escapes_markup_in_typed_fields() {
        let contact = Contact {
            name: "Ana *Admin* [x]".into(),
            email: "a_b_c@ex.com".into(),
            phone: "83996438245".into(),
        };
        let text = summary(Some(Subject::Other), &contact);
        assert!(text.contains(r"E-mail: a\_b\_c@ex.com"));
        assert!(text.contains(r"Nome: Ana \*Admin\* \[x]"));
        assert!(text.ends_with("*Sim* / *Não*"));
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(escape_markdown("Maria Silva"), "Maria Silva");
        assert_eq!(escape_markdown("x`y"), r"x\`y");
    }

    #[test]
    fn reprompts_embed_their_base_message() {
        assert!(not_understood(DayPeriod::Evening).ends_with(&greeting(DayPeriod::Evening)));
        assert!(restart(DayPeriod::Morning).starts_with("Vamos recomeçar."));
        let contact = Contact::default();
        assert!(answer_yes_or_no(None, &contact).ends_with(&summary(None, &contact)));
    }
}
