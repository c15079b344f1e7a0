//! Message Templates — per-level subject/body with `{{ key }}` placeholders

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

use crate::record::Record;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("PLACEHOLDER regex should compile")
});

/// Errors parsing a template document.
#[derive(Debug, Error)]
pub enum TemplateParseError {
    #[error("template is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("template must be a JSON object")]
    NotAnObject,

    #[error("template field `{0}` is missing or not a string")]
    MissingField(&'static str),
}

/// A template document: named fields, of which `subject` and `body` are
/// required strings.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    fields: BTreeMap<String, Value>,
}

impl MessageTemplate {
    pub fn from_json(raw: &str) -> Result<Self, TemplateParseError> {
        let Value::Object(map) = serde_json::from_str::<Value>(raw)? else {
            return Err(TemplateParseError::NotAnObject);
        };
        let fields: BTreeMap<String, Value> = map.into_iter().collect();
        for required in ["subject", "body"] {
            if !matches!(fields.get(required), Some(Value::String(_))) {
                return Err(TemplateParseError::MissingField(required));
            }
        }
        Ok(Self { fields })
    }

    /// Substitute placeholders into every string-valued field.
    pub fn render(&self, placeholders: &Placeholders) -> RenderedTemplate {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => Value::String(placeholders.substitute(s)),
                    other => other.clone(),
                };
                (name.clone(), value)
            })
            .collect();
        RenderedTemplate { fields }
    }
}

/// A template after placeholder substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    fields: BTreeMap<String, Value>,
}

impl RenderedTemplate {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn subject(&self) -> &str {
        self.field("subject").unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        self.field("body").unwrap_or_default()
    }
}

/// Placeholder values available to templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<String, String>,
}

impl Placeholders {
    /// `jcTitle`, `jcId` and `jcContact` for `record`.
    pub fn for_record(record: &Record) -> Self {
        Self::default()
            .with("jcTitle", &record.title)
            .with("jcId", &record.id)
            .with("jcContact", record.primary_contact())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Replace every known `{{ key }}`; unknown ones stay verbatim.
    pub fn substitute(&self, text: &str) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures| match self.values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_with_and_without_spaces() {
        let p = Placeholders::default().with("jcTitle", "Neuro JC");
        assert_eq!(p.substitute("Hi {{ jcTitle }}!"), "Hi Neuro JC!");
        assert_eq!(p.substitute("Hi {{jcTitle}}!"), "Hi Neuro JC!");
    }

    #[test]
    fn test_unknown_placeholders_are_left_verbatim() {
        let p = Placeholders::default().with("jcTitle", "Neuro JC");
        assert_eq!(
            p.substitute("{{ jcTitle }} / {{ unknown }}"),
            "Neuro JC / {{ unknown }}"
        );
    }

    #[test]
    fn test_replacement_values_are_not_expanded() {
        let p = Placeholders::default().with("jcTitle", "$1 {{ jcTitle }}");
        assert_eq!(p.substitute("{{ jcTitle }}"), "$1 {{ jcTitle }}");
    }

    #[test]
    fn test_render_touches_every_string_field() {
        let template = MessageTemplate::from_json(
            r#"{"subject": "Update {{ jcTitle }}", "body": "<p>{{ jcTitle }}</p>",
                "preheader": "{{ jcTitle }} is stale", "priority": 3}"#,
        )
        .unwrap();
        let rendered = template.render(&Placeholders::default().with("jcTitle", "X"));
        assert_eq!(rendered.subject(), "Update X");
        assert_eq!(rendered.body(), "<p>X</p>");
        assert_eq!(rendered.field("preheader"), Some("X is stale"));
        assert_eq!(rendered.field("priority"), None);
    }

    #[test]
    fn test_from_json_rejects_bad_documents() {
        assert!(matches!(
            MessageTemplate::from_json("not json"),
            Err(TemplateParseError::InvalidJson(_))
        ));
        assert!(matches!(
            MessageTemplate::from_json("[1, 2]"),
            Err(TemplateParseError::NotAnObject)
        ));
        assert!(matches!(
            MessageTemplate::from_json(r#"{"subject": "s"}"#),
            Err(TemplateParseError::MissingField("body"))
        ));
    }
}
