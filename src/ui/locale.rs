//! Locale Tables
//!
//! Nested JSON string tables addressed by dot paths (`game.lockpick.title`).
//! A missing key, or a key that resolves to a non-string, yields the fallback.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Locale loading errors.
#[derive(Debug, Error)]
pub enum LocaleError {
    /// File could not be read.
    #[error("failed to read locale file: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid JSON.
    #[error("invalid locale json: {0}")]
    Parse(#[from] serde_json::Error),
    /// Locale name would escape the locale directory.
    #[error("invalid locale name: {0}")]
    InvalidName(String),
}

/// A loaded translation table.
#[derive(Debug, Clone)]
pub struct Translations {
    locale: String,
    table: Value,
}

impl Default for Translations {
    fn default() -> Self {
        Self::empty("en")
    }
}

impl Translations {
    /// Table with no entries; every lookup returns its fallback.
    pub fn empty(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            table: Value::Object(Default::default()),
        }
    }

    /// Build from an already-parsed table.
    pub fn from_value(locale: impl Into<String>, table: Value) -> Self {
        Self { locale: locale.into(), table }
    }

    /// Load `{dir}/{locale}.json`.
    pub fn load(dir: &Path, locale: &str) -> Result<Self, LocaleError> {
        let valid = !locale.is_empty()
            && locale
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(LocaleError::InvalidName(locale.to_string()));
        }
        let raw = std::fs::read_to_string(dir.join(format!("{locale}.json")))?;
        let table = serde_json::from_str(&raw)?;
        Ok(Self::from_value(locale, table))
    }

    /// Active locale name.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Look up `key`, returning `fallback` when absent or not a string.
    pub fn get(&self, key: &str, fallback: &str) -> String {
        key.split('.')
            .try_fold(&self.table, |node, part| node.get(part))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    }

    /// Tier badge text: `tier.{lower}` or the upper-cased label.
    pub fn format_tier(&self, tier: &str) -> String {
        if tier.is_empty() {
            return String::new();
        }
        self.get(&format!("tier.{}", tier.to_lowercase()), &tier.to_uppercase())
    }
}
