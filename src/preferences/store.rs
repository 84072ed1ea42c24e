//! Preference store — per-conversation preferences keyed by thread id.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::model::{PreferencesRecord, PreferencesUpdate};

/// Storage seam for preference records.
///
/// Both operations are total: an unknown thread yields the default record,
/// and an upsert always succeeds. Concurrent upserts for the same thread are
/// last-writer-wins.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored record for `thread_id`, or the default record.
    async fn get(&self, thread_id: &str) -> PreferencesRecord;

    /// Whether a record has been written for `thread_id`.
    async fn contains(&self, thread_id: &str) -> bool;

    /// Create or partially overwrite the record for `thread_id`.
    ///
    /// Each field present in `update` replaces the stored field as a whole;
    /// absent fields are left untouched. Returns the record as stored.
    async fn upsert(&self, thread_id: &str, update: PreferencesUpdate) -> PreferencesRecord;
}

/// Process-lifetime store backed by a map behind a `RwLock`.
///
/// Nothing is persisted; records vanish when the process exits.
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    records: RwLock<HashMap<String, PreferencesRecord>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations with a stored record.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, thread_id: &str) -> PreferencesRecord {
        self.records
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn contains(&self, thread_id: &str) -> bool {
        self.records.read().await.contains_key(thread_id)
    }

    async fn upsert(&self, thread_id: &str, update: PreferencesUpdate) -> PreferencesRecord {
        let mut records = self.records.write().await;
        let created = !records.contains_key(thread_id);
        let record = records.entry(thread_id.to_string()).or_default();

        let replaced_settings = update.settings.is_some();
        let replaced_onboarding = update.onboarding_data.is_some();
        if let Some(settings) = update.settings {
            record.settings = settings;
        }
        if let Some(onboarding) = update.onboarding_data {
            record.onboarding_data = onboarding;
        }
        record.updated_at = Some(chrono::Utc::now());

        debug!(
            thread_id = %thread_id,
            created,
            replaced_settings,
            replaced_onboarding,
            "Preferences upserted"
        );

        record.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::model::{OnboardingData, PreferenceValue, Settings};

    fn settings(key: &str, value: i64) -> Settings {
        let mut s = Settings::new();
        s.insert(key.to_string(), PreferenceValue::Number(value.into()));
        s
    }

    fn onboarding(answers: Vec<&str>) -> OnboardingData {
        let mut o = OnboardingData::new();
        o.insert("2".to_string(), answers.into());
        o
    }

    #[tokio::test]
    async fn unknown_thread_returns_default() {
        let store = InMemoryPreferenceStore::new();
        assert_eq!(store.get("thread_missing").await, PreferencesRecord::default());
        assert!(!store.contains("thread_missing").await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn settings_are_overwritten_not_merged() {
        let store = InMemoryPreferenceStore::new();
        store
            .upsert(
                "t1",
                PreferencesUpdate::new(Some(settings("a", 1)), Some(onboarding(vec!["Nøtter"]))),
            )
            .await;
        store
            .upsert("t1", PreferencesUpdate::new(Some(settings("b", 2)), None))
            .await;

        let record = store.get("t1").await;
        assert_eq!(record.settings, settings("b", 2));
        assert_eq!(record.onboarding_data, onboarding(vec!["Nøtter"]));
        assert!(record.updated_at.is_some());
    }

    #[tokio::test]
    async fn onboarding_only_update_keeps_settings() {
        let store = InMemoryPreferenceStore::new();
        store
            .upsert("t1", PreferencesUpdate::new(Some(settings("a", 1)), None))
            .await;
        let record = store
            .upsert("t1", PreferencesUpdate::new(None, Some(onboarding(vec!["Egg"]))))
            .await;
        assert_eq!(record.settings, settings("a", 1));
        assert_eq!(record.onboarding_data, onboarding(vec!["Egg"]));
    }

    #[tokio::test]
    async fn first_upsert_fills_missing_fields_with_defaults() {
        let store = InMemoryPreferenceStore::new();
        let record = store
            .upsert("t1", PreferencesUpdate::new(None, Some(onboarding(vec!["Fisk"]))))
            .await;
        assert_eq!(record.settings, PreferencesRecord::default().settings);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_keys_stored_as_is() {
        let store = InMemoryPreferenceStore::new();
        let mut s = Settings::new();
        s.insert("highContrast".to_string(), true.into());
        s.insert("textSize".to_string(), "large".into());
        store.upsert("t1", PreferencesUpdate::new(Some(s.clone()), None)).await;
        assert_eq!(store.get("t1").await.settings, s);
    }

    #[tokio::test]
    async fn threads_are_independent() {
        let store = InMemoryPreferenceStore::new();
        store
            .upsert("t1", PreferencesUpdate::new(Some(settings("a", 1)), None))
            .await;
        assert_eq!(store.get("t2").await, PreferencesRecord::default());
        assert!(store.contains("t1").await);
        assert!(!store.contains("t2").await);
    }
}
