//! Per-conversation personalization: settings, onboarding answers, and the
//! instruction text composed from them.
//!
//! Preferences live in a `PreferenceStore` keyed by the agent thread id. On
//! the first turn of a thread the composer folds them into a context block
//! that is prefixed onto the user's message.

pub mod model;
pub mod prompts;
pub mod store;

pub use model::{
    OnboardingData, PreferenceValue, PreferencesRecord, PreferencesUpdate, Settings,
};
pub use prompts::{compose, with_context_block};
pub use store::{InMemoryPreferenceStore, PreferenceStore};
