//! Core domain types shared across brancheck crates.
//!
//! These types carry no IO and no async. Anything that touches the
//! filesystem, the network, or the runtime lives in the sibling crates;
//! this crate only defines the vocabulary they exchange.

use serde::Deserialize;

// ============================================================================
// API Key
// ============================================================================

/// Gemini API key.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing
/// accidental credential disclosure in logs or error messages.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

// ============================================================================
// Validation Status
// ============================================================================

/// Outcome of checking the typed branch name against the configured pattern.
///
/// `PatternBroken` means the *pattern* was malformed, not the input; it is a
/// configuration problem surfaced to the user, never a crash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationStatus {
    /// No check has run yet for the current input.
    #[default]
    Unchecked,
    /// The branch field was empty when the check ran.
    EmptyInput,
    Valid,
    Invalid,
    /// The configured pattern failed to compile; carries the compile error.
    PatternBroken(String),
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStatus::Unchecked => write!(f, "not checked yet"),
            ValidationStatus::EmptyInput => write!(f, "branch name is empty"),
            ValidationStatus::Valid => write!(f, "✅ valid branch name"),
            ValidationStatus::Invalid => write!(f, "❌ invalid branch name"),
            ValidationStatus::PatternBroken(e) => write!(f, "pattern is invalid: {e}"),
        }
    }
}

// ============================================================================
// Prompt Templates
// ============================================================================

/// A prompt template with `{branch}` and `{description}` placeholders.
///
/// Templates come from the config file as plain strings; rendering is a
/// literal substitution, not a templating language.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    #[must_use]
    pub fn render(&self, branch: &str, description: &str) -> String {
        self.0
            .replace("{branch}", branch)
            .replace("{description}", description)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Suggestion Parsing
// ============================================================================

/// Split a generated response into display items.
///
/// The model is asked for whitespace-separated candidates; empty fragments
/// are dropped so doubled separators never produce blank list rows.
#[must_use]
pub fn split_suggestion_items(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn api_key_exposes_inner_value_on_request() {
        let key = ApiKey::new("k-123");
        assert_eq!(key.expose_secret(), "k-123");
    }

    #[test]
    fn validation_status_defaults_to_unchecked() {
        assert_eq!(ValidationStatus::default(), ValidationStatus::Unchecked);
    }

    #[test]
    fn pattern_broken_display_carries_compile_error() {
        let status = ValidationStatus::PatternBroken("unclosed group".into());
        assert!(status.to_string().contains("unclosed group"));
    }

    #[test]
    fn prompt_template_renders_placeholders() {
        let template = PromptTemplate::new("Suggest names like {branch} ({description})");
        assert_eq!(
            template.render("feature/1-login", "oauth flow"),
            "Suggest names like feature/1-login (oauth flow)"
        );
    }

    #[test]
    fn prompt_template_without_placeholders_is_unchanged() {
        let template = PromptTemplate::new("fixed prompt");
        assert_eq!(template.render("x", "y"), "fixed prompt");
    }

    #[test]
    fn prompt_template_deserializes_from_bare_string() {
        let template: PromptTemplate = serde_json::from_value(serde_json::json!("p {branch}")).unwrap();
        assert_eq!(template.as_str(), "p {branch}");
    }

    #[test]
    fn split_suggestion_items_drops_empty_fragments() {
        let items = split_suggestion_items("feature/1-a  feature/2-b\nfeature/3-c ");
        assert_eq!(items, ["feature/1-a", "feature/2-b", "feature/3-c"]);
    }

    #[test]
    fn split_suggestion_items_of_empty_text_is_empty() {
        assert!(split_suggestion_items("   \n ").is_empty());
    }
}
