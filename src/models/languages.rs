use crate::utils::{Result, TranslatorError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub code: String,
    pub name: String,
}

impl Language {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Target languages the service accepts.
#[derive(Debug, Clone)]
pub struct LanguageSet {
    languages: Vec<Language>,
}

impl LanguageSet {
    pub fn new(languages: Vec<Language>) -> Self {
        Self { languages }
    }

    /// Accepts either the code (`fr`) or the English name (`French`), case-insensitively.
    pub fn resolve(&self, requested: &str) -> Result<&Language> {
        let requested = requested.trim();
        self.languages
            .iter()
            .find(|l| {
                l.code.eq_ignore_ascii_case(requested) || l.name.eq_ignore_ascii_case(requested)
            })
            .ok_or_else(|| TranslatorError::UnsupportedLanguage(requested.to_string()))
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}

impl Default for LanguageSet {
    fn default() -> Self {
        Self::new(default_languages())
    }
}

pub fn default_languages() -> Vec<Language> {
    vec![
        Language::new("fr", "French"),
        Language::new("en", "English"),
        Language::new("es", "Spanish"),
        Language::new("it", "Italian"),
        Language::new("de", "German"),
    ]
}
