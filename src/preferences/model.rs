//! Per-conversation preference data models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single preference value as sent by the front end.
///
/// Settings and onboarding answers are opaque pass-through data, so the
/// value space is an open union rather than a closed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<PreferenceValue>),
}

impl PreferenceValue {
    /// Truthiness for toggles: `true` or the string `"true"`.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Non-blank textual answers held by this value.
    ///
    /// A bare string counts as a one-element list.
    pub fn answers(&self) -> Vec<&str> {
        match self {
            Self::Text(s) => non_blank(s).into_iter().collect(),
            Self::List(items) => items
                .iter()
                .filter_map(|item| item.as_text().and_then(non_blank))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl From<bool> for PreferenceValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for PreferenceValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<&str>> for PreferenceValue {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(PreferenceValue::from).collect())
    }
}

/// Display and behaviour toggles, keyed by front-end setting name.
pub type Settings = BTreeMap<String, PreferenceValue>;

/// Onboarding answers, keyed by question identifier.
pub type OnboardingData = BTreeMap<String, PreferenceValue>;

/// Well-known setting names.
pub mod setting_keys {
    pub const SIMPLER_LANGUAGE: &str = "simplerLanguage";
    pub const SHORT_ANSWERS: &str = "shortAnswers";
    pub const SHOW_SOURCES: &str = "showSources";
    pub const LANGUAGE: &str = "language";
}

/// Onboarding question identifiers (step numbers in the onboarding flow).
pub mod onboarding_keys {
    /// Allergies, intolerances and food preferences.
    pub const ALLERGIES: &str = "2";
    /// Health conditions.
    pub const HEALTH_CONDITIONS: &str = "3";
}

/// Response language used when none (or an unknown one) is configured.
pub const DEFAULT_LANGUAGE: &str = "no";

/// Default settings: every toggle off, default language.
pub fn default_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert(setting_keys::SIMPLER_LANGUAGE.to_string(), false.into());
    settings.insert(setting_keys::SHORT_ANSWERS.to_string(), false.into());
    settings.insert(setting_keys::SHOW_SOURCES.to_string(), false.into());
    settings.insert(setting_keys::LANGUAGE.to_string(), DEFAULT_LANGUAGE.into());
    settings
}

/// Stored personalization state for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRecord {
    pub settings: Settings,
    pub onboarding_data: OnboardingData,
    /// Last time this record was written. `None` for the default record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PreferencesRecord {
    fn default() -> Self {
        Self {
            settings: default_settings(),
            onboarding_data: OnboardingData::new(),
            updated_at: None,
        }
    }
}

/// A partial write: each present field replaces the stored one wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesUpdate {
    pub settings: Option<Settings>,
    pub onboarding_data: Option<OnboardingData>,
}

impl PreferencesUpdate {
    pub fn new(settings: Option<Settings>, onboarding_data: Option<OnboardingData>) -> Self {
        Self {
            settings,
            onboarding_data,
        }
    }

    /// True when neither field was supplied.
    pub fn is_empty(&self) -> bool {
        self.settings.is_none() && self.onboarding_data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_shape() {
        let json = serde_json::to_value(PreferencesRecord::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "settings": {
                    "language": "no",
                    "shortAnswers": false,
                    "showSources": false,
                    "simplerLanguage": false
                },
                "onboardingData": {}
            })
        );
    }

    #[test]
    fn open_values_deserialize() {
        let settings: Settings = serde_json::from_str(
            r#"{"simplerLanguage": true, "textSize": 3, "language": "en", "tags": ["a"], "x": null}"#,
        )
        .unwrap();
        assert_eq!(settings["simplerLanguage"], PreferenceValue::Bool(true));
        assert!(matches!(settings["textSize"], PreferenceValue::Number(_)));
        assert_eq!(settings["language"].as_text(), Some("en"));
        assert_eq!(settings["tags"], PreferenceValue::from(vec!["a"]));
        assert_eq!(settings["x"], PreferenceValue::Null);
    }

    #[test]
    fn toggle_truthiness() {
        assert!(PreferenceValue::Bool(true).is_enabled());
        assert!(PreferenceValue::from("TRUE").is_enabled());
        assert!(!PreferenceValue::from("yes").is_enabled());
        assert!(!PreferenceValue::Bool(false).is_enabled());
        assert!(!PreferenceValue::Null.is_enabled());
    }

    #[test]
    fn answers_skip_blanks_and_non_text() {
        let value = PreferenceValue::List(vec![
            " Nøtter ".into(),
            "".into(),
            PreferenceValue::Bool(true),
            "Laktose".into(),
        ]);
        assert_eq!(value.answers(), vec!["Nøtter", "Laktose"]);
        assert_eq!(PreferenceValue::from("Gluten").answers(), vec!["Gluten"]);
        assert!(PreferenceValue::from("   ").answers().is_empty());
        assert!(PreferenceValue::Null.answers().is_empty());
    }

    #[test]
    fn update_emptiness() {
        assert!(PreferencesUpdate::default().is_empty());
        assert!(!PreferencesUpdate::new(Some(Settings::new()), None).is_empty());
    }
}
