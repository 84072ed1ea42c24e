//! Instruction text built from a conversation's preferences.
//!
//! The composed text is prefixed onto the first user message of a thread so
//! the agent picks up the user's settings and onboarding answers.

use super::model::{
    DEFAULT_LANGUAGE, OnboardingData, Settings, onboarding_keys, setting_keys,
};

const PERSONA_PREAMBLE: &str = "Du er NutriBot, en hjelpsom ernæringsassistent for eldre.";

const SECTION_SEPARATOR: &str = "\n\n";

/// Toggle sentences, appended in this order when enabled.
const TOGGLE_INSTRUCTIONS: &[(&str, &str)] = &[
    (
        setting_keys::SIMPLER_LANGUAGE,
        "Bruk enkelt språk og korte setninger. Unngå fagtermer.",
    ),
    (
        setting_keys::SHORT_ANSWERS,
        "Hold svarene korte og konsise, maksimum 3-4 setninger.",
    ),
    (
        setting_keys::SHOW_SOURCES,
        "Inkluder alltid kilder til informasjonen.",
    ),
];

const LANGUAGE_DIRECTIVES: &[(&str, &str)] = &[
    ("no", "Svar på norsk."),
    ("en", "Answer in English."),
    ("sv", "Svara på svenska."),
    ("da", "Svar på dansk."),
];

/// Opening marker of the context block prefixed onto a first message.
pub const CONTEXT_OPEN: &str = "[KONTEKST]";
/// Closing marker of the context block.
pub const CONTEXT_CLOSE: &str = "[/KONTEKST]";

/// Fold settings and onboarding answers into one instruction string.
///
/// Never returns an empty string: with no inputs the result is the persona
/// preamble followed by the default language directive.
pub fn compose(settings: &Settings, onboarding: &OnboardingData) -> String {
    let mut parts = vec![PERSONA_PREAMBLE.to_string()];

    let allergies = answers_for(onboarding, onboarding_keys::ALLERGIES);
    if !allergies.is_empty() {
        parts.push(format!(
            "Brukeren har følgende allergier eller kostpreferanser: {}. Ta hensyn til dette i alle anbefalinger.",
            allergies.join(", ")
        ));
    }

    let conditions = answers_for(onboarding, onboarding_keys::HEALTH_CONDITIONS);
    if !conditions.is_empty() {
        parts.push(format!(
            "Brukeren har følgende helseutfordringer: {}. Tilpass kostholdsrådene til disse tilstandene.",
            conditions.join(", ")
        ));
    }

    for (key, sentence) in TOGGLE_INSTRUCTIONS {
        if settings.get(*key).is_some_and(|v| v.is_enabled()) {
            parts.push((*sentence).to_string());
        }
    }

    let language = settings
        .get(setting_keys::LANGUAGE)
        .and_then(|v| v.as_text())
        .map(str::trim)
        .unwrap_or(DEFAULT_LANGUAGE);
    parts.push(language_directive(language).to_string());

    parts.join(SECTION_SEPARATOR)
}

/// Directive for a language code, falling back to the default language.
pub fn language_directive(code: &str) -> &'static str {
    lookup_language(code)
        .or_else(|| lookup_language(DEFAULT_LANGUAGE))
        .unwrap_or("Svar på norsk.")
}

fn lookup_language(code: &str) -> Option<&'static str> {
    LANGUAGE_DIRECTIVES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, directive)| *directive)
}

fn answers_for<'a>(onboarding: &'a OnboardingData, key: &str) -> Vec<&'a str> {
    onboarding.get(key).map(|v| v.answers()).unwrap_or_default()
}

/// Wrap instructions in a delimited context block ahead of the user's text.
pub fn with_context_block(instructions: &str, user_text: &str) -> String {
    format!("{CONTEXT_OPEN}\n{instructions}\n{CONTEXT_CLOSE}\n\n{user_text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::model::{PreferenceValue, default_settings};

    fn settings(pairs: &[(&str, PreferenceValue)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn onboarding(pairs: &[(&str, Vec<&str>)]) -> OnboardingData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PreferenceValue::from(v.clone())))
            .collect()
    }

    #[test]
    fn empty_inputs_give_preamble_and_default_language() {
        let text = compose(&Settings::new(), &OnboardingData::new());
        assert_eq!(
            text,
            "Du er NutriBot, en hjelpsom ernæringsassistent for eldre.\n\nSvar på norsk."
        );
    }

    #[test]
    fn all_toggles_off_matches_empty() {
        let mut s = default_settings();
        s.remove(setting_keys::LANGUAGE);
        assert_eq!(
            compose(&s, &OnboardingData::new()),
            compose(&Settings::new(), &OnboardingData::new())
        );
    }

    #[test]
    fn toggles_follow_fixed_order() {
        let a = settings(&[
            (setting_keys::SHOW_SOURCES, true.into()),
            (setting_keys::SHORT_ANSWERS, true.into()),
            (setting_keys::SIMPLER_LANGUAGE, true.into()),
        ]);
        let text = compose(&a, &OnboardingData::new());

        let simpler = text.find("Bruk enkelt språk").unwrap();
        let short = text.find("Hold svarene korte").unwrap();
        let sources = text.find("Inkluder alltid kilder").unwrap();
        assert!(simpler < short && short < sources);
        assert!(text.ends_with("Svar på norsk."));
    }

    #[test]
    fn allergies_are_comma_joined_in_one_sentence() {
        let text = compose(
            &Settings::new(),
            &onboarding(&[(onboarding_keys::ALLERGIES, vec!["nuts", "dairy"])]),
        );
        assert!(text.contains(
            "Brukeren har følgende allergier eller kostpreferanser: nuts, dairy. Ta hensyn til dette i alle anbefalinger."
        ));
        assert!(!text.contains("helseutfordringer"));
    }

    #[test]
    fn empty_allergy_list_adds_nothing() {
        let text = compose(
            &Settings::new(),
            &onboarding(&[(onboarding_keys::ALLERGIES, vec![])]),
        );
        assert!(!text.contains("allergier"));
        let blanks = compose(
            &Settings::new(),
            &onboarding(&[(onboarding_keys::ALLERGIES, vec!["", "  "])]),
        );
        assert!(!blanks.contains("allergier"));
    }

    #[test]
    fn health_conditions_sentence() {
        let text = compose(
            &Settings::new(),
            &onboarding(&[(onboarding_keys::HEALTH_CONDITIONS, vec!["Diabetes", "Blodtrykk"])]),
        );
        assert!(text.contains("helseutfordringer: Diabetes, Blodtrykk. Tilpass kostholdsrådene"));
    }

    #[test]
    fn onboarding_precedes_toggles() {
        let text = compose(
            &settings(&[(setting_keys::SHORT_ANSWERS, true.into())]),
            &onboarding(&[
                (onboarding_keys::HEALTH_CONDITIONS, vec!["Diabetes"]),
                (onboarding_keys::ALLERGIES, vec!["Gluten"]),
            ]),
        );
        let allergy = text.find("allergier").unwrap();
        let health = text.find("helseutfordringer").unwrap();
        let short = text.find("Hold svarene").unwrap();
        assert!(allergy < health && health < short);
    }

    #[test]
    fn known_languages_and_fallback() {
        for (code, expected) in [
            ("en", "Answer in English."),
            ("sv", "Svara på svenska."),
            ("da", "Svar på dansk."),
            ("no", "Svar på norsk."),
            ("fr", "Svar på norsk."),
            ("", "Svar på norsk."),
        ] {
            let text = compose(
                &settings(&[(setting_keys::LANGUAGE, code.into())]),
                &OnboardingData::new(),
            );
            assert!(text.ends_with(expected), "code {code:?} gave {text:?}");
        }
    }

    #[test]
    fn non_string_language_falls_back() {
        let text = compose(
            &settings(&[(setting_keys::LANGUAGE, true.into())]),
            &OnboardingData::new(),
        );
        assert!(text.ends_with("Svar på norsk."));
    }

    #[test]
    fn compose_is_deterministic() {
        let s = settings(&[
            (setting_keys::SIMPLER_LANGUAGE, true.into()),
            (setting_keys::LANGUAGE, "en".into()),
            ("unknownToggle", true.into()),
        ]);
        let o = onboarding(&[(onboarding_keys::ALLERGIES, vec!["Egg"])]);
        assert_eq!(compose(&s, &o), compose(&s, &o));
    }

    #[test]
    fn context_block_wraps_instructions() {
        let wrapped = with_context_block("Svar på norsk.", "Hei");
        assert_eq!(wrapped, "[KONTEKST]\nSvar på norsk.\n[/KONTEKST]\n\nHei");
    }
}
