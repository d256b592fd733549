//! Localized string formatting with positional arguments and plural forms.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum LocArg {
    Int(i64),
    Text(String),
}

impl fmt::Display for LocArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocArg::Int(value) => write!(f, "{value}"),
            LocArg::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for LocArg {
    fn from(value: i64) -> Self {
        LocArg::Int(value)
    }
}

impl From<u8> for LocArg {
    fn from(value: u8) -> Self {
        LocArg::Int(value as i64)
    }
}

impl From<u32> for LocArg {
    fn from(value: u32) -> Self {
        LocArg::Int(value as i64)
    }
}

impl From<&str> for LocArg {
    fn from(value: &str) -> Self {
        LocArg::Text(value.to_string())
    }
}

impl From<String> for LocArg {
    fn from(value: String) -> Self {
        LocArg::Text(value)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LocalizationError {
    #[error("no localized string for key '{0}'")]
    UnknownKey(String),
    #[error("string '{key}' references argument {{{index}}} but only {provided} were given")]
    MissingArgument {
        key: String,
        index: usize,
        provided: usize,
    },
    #[error("string '{key}' has an unterminated placeholder")]
    MalformedTemplate { key: String },
}

/// Formatter contract consumed by the core for UI-facing text.
pub trait Localizer {
    fn format(&self, key: &str, args: &[LocArg]) -> Result<String, LocalizationError>;

    /// Selects the singular or plural form of `key` by `count`, then formats it.
    fn plural(&self, key: &str, count: i64, args: &[LocArg]) -> Result<String, LocalizationError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringEntry {
    Plain(String),
    Plural { one: String, other: String },
}

impl StringEntry {
    fn template(&self, count: Option<i64>) -> &str {
        match (self, count) {
            (StringEntry::Plain(text), _) => text,
            (StringEntry::Plural { one, .. }, Some(1)) => one,
            (StringEntry::Plural { other, .. }, _) => other,
        }
    }
}

/// Key → template table loaded from a language file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StringCatalog {
    #[serde(default)]
    language: String,
    #[serde(default)]
    entries: HashMap<String, StringEntry>,
}

impl StringCatalog {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: StringEntry) {
        self.entries.insert(key.into(), entry);
    }

    fn render(
        &self,
        key: &str,
        count: Option<i64>,
        args: &[LocArg],
    ) -> Result<String, LocalizationError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| LocalizationError::UnknownKey(key.to_string()))?;
        substitute(key, entry.template(count), args)
    }
}

impl Localizer for StringCatalog {
    fn format(&self, key: &str, args: &[LocArg]) -> Result<String, LocalizationError> {
        self.render(key, None, args)
    }

    fn plural(&self, key: &str, count: i64, args: &[LocArg]) -> Result<String, LocalizationError> {
        self.render(key, Some(count), args)
    }
}

fn substitute(key: &str, template: &str, args: &[LocArg]) -> Result<String, LocalizationError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| LocalizationError::MalformedTemplate {
                key: key.to_string(),
            })?;
        let index: usize =
            after[..close]
                .trim()
                .parse()
                .map_err(|_| LocalizationError::MalformedTemplate {
                    key: key.to_string(),
                })?;
        let arg = args.get(index).ok_or(LocalizationError::MissingArgument {
            key: key.to_string(),
            index,
            provided: args.len(),
        })?;
        out.push_str(&arg.to_string());
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StringCatalog {
        StringCatalog::from_json_str(
            r#"{
                "language": "en",
                "entries": {
                    "greeting": "Welcome, {0} of {1}.",
                    "remaining": {"one": "{0} more invention", "other": "{0} more inventions"}
                }
            }"#,
        )
        .expect("catalog should parse")
    }

    #[test]
    fn positional_arguments_are_substituted() {
        let text = catalog()
            .format("greeting", &["Envoy".into(), "the Vattori".into()])
            .expect("format succeeds");
        assert_eq!(text, "Welcome, Envoy of the Vattori.");
    }

    #[test]
    fn plural_form_follows_count() {
        let catalog = catalog();
        assert_eq!(
            catalog.plural("remaining", 1, &[1i64.into()]).unwrap(),
            "1 more invention"
        );
        assert_eq!(
            catalog.plural("remaining", 2, &[2i64.into()]).unwrap(),
            "2 more inventions"
        );
    }

    #[test]
    fn missing_argument_is_reported() {
        let err = catalog()
            .format("greeting", &["Envoy".into()])
            .expect_err("second argument missing");
        assert_eq!(
            err,
            LocalizationError::MissingArgument {
                key: "greeting".to_string(),
                index: 1,
                provided: 1
            }
        );
    }

    #[test]
    fn unknown_key_is_reported() {
        let err = catalog().format("nope", &[]).expect_err("key is absent");
        assert_eq!(err, LocalizationError::UnknownKey("nope".to_string()));
    }
}
