//! Message templates and `{placeholder}` rendering

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Which channel a template is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Email,
    Sms,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Email => "email",
            TemplateKind::Sms => "sms",
        }
    }

    /// Built-in text used when no template has been saved
    pub fn default_text(&self) -> &'static str {
        match self {
            TemplateKind::Email => DEFAULT_EMAIL_TEMPLATE,
            TemplateKind::Sms => DEFAULT_SMS_TEMPLATE,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "email" | "mail" => Ok(TemplateKind::Email),
            "sms" => Ok(TemplateKind::Sms),
            other => Err(Error::validation(format!("Unknown template kind: {}", other))),
        }
    }
}

const DEFAULT_EMAIL_TEMPLATE: &str = "Przypomnienie o płatności

Szanowny/a {kontrahent},

Informujemy, że faktura nr {nr_faktury} w wysokości {kwota} PLN z dnia {data_faktury} jest przeterminowana.

Od upływu terminu płatności minęło już {dni_po_terminie} dni.

Prosimy o niezwłoczne uregulowanie zaległej płatności.

W przypadku pytań prosimy o kontakt.

Z poważaniem,
Dział Windykacji";

const DEFAULT_SMS_TEMPLATE: &str = "Przypomnienie: Faktura {nr_faktury} na kwotę {kwota} zł z dnia {data_faktury} jest przeterminowana o {dni_po_terminie} dni. Prosimy o pilne uregulowanie.";

/// A fixed value usable in every template (bank account, company name, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

impl Placeholder {
    pub fn new(name: impl Into<String>, value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}

/// Placeholders offered when none have been saved
pub fn default_placeholders() -> Vec<Placeholder> {
    vec![
        Placeholder::new("numer_konta", "PL12345678901234567890123456", "Numer konta bankowego"),
        Placeholder::new("nazwa_firmy", "Nazwa Firmy Sp. z o.o.", "Nazwa firmy windykacyjnej"),
        Placeholder::new("email_kontaktowy", "windykacja@example.com", "Email kontaktowy"),
        Placeholder::new("telefon_kontaktowy", "+48 123 456 789", "Telefon kontaktowy"),
    ]
}

/// Substitute `{name}` placeholders from `context`
///
/// `{{` and `}}` produce literal braces. An unknown name, an empty `{}` or
/// an unbalanced brace is a `TemplateFormat` error; nothing is emitted
/// half-rendered.
pub fn render_template(template: &str, context: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    if c == '{' {
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(Error::template(format!("unclosed '{{' at position {}", pos)));
                }
                let key = name.trim();
                if key.is_empty() {
                    return Err(Error::template(format!("empty placeholder at position {}", pos)));
                }
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => return Err(Error::template(format!("unknown placeholder '{{{}}}'", key))),
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(Error::template(format!("single '}}' at position {}", pos)));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Merge constant placeholders under record values (record wins)
pub fn build_context(
    record_context: BTreeMap<String, String>,
    placeholders: &[Placeholder],
) -> BTreeMap<String, String> {
    let mut ctx: BTreeMap<String, String> = placeholders
        .iter()
        .map(|p| (p.name.clone(), p.value.clone()))
        .collect();
    ctx.extend(record_context);
    ctx
}
