//! Configuration loading and resolution.
//!
//! Raw TOML deserialization structs (with `Option` fields) stay private to
//! the loading path; [`Settings::resolve`] turns them into a fully-defaulted
//! value at the parse boundary, so the rest of the application never deals
//! with missing fields.

use brancheck_types::{ApiKey, PromptTemplate};
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

const DEFAULT_DEBOUNCE_SECONDS: f32 = 3.0;
const DEFAULT_STEP_SECONDS: f32 = 1.0;
const DEFAULT_PATTERN: &str = r"^(feature|bugfix)/\d+-.+$";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_SUGGEST_PROMPT: &str = "Propose five git branch names close to \"{branch}\" that \
     match the convention <type>/<ticket>-<slug>. Extra context: {description}. Reply with the \
     names only, separated by single spaces.";

const DEFAULT_INFER_PROMPT: &str = "Given the git branch name \"{branch}\" and the note \
     \"{description}\", list the development tasks this branch most likely covers, as short \
     kebab-case phrases separated by single spaces.";

#[derive(Debug, Default, Deserialize)]
pub struct BrancheckConfig {
    pub app: Option<AppConfig>,
    pub branch: Option<BranchConfig>,
    pub google: Option<GeminiConfig>,
    pub prompts: Option<PromptsConfig>,
}

/// Debounce timing knobs.
///
/// ```toml
/// [app]
/// debounce_seconds = 3.0
/// step_seconds = 1.0
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub debounce_seconds: Option<f32>,
    pub step_seconds: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BranchConfig {
    /// Regex the branch name must match. Compiled at check time so a broken
    /// pattern degrades to a status message instead of a startup failure.
    pub pattern: Option<String>,
}

/// Google Gemini API settings.
///
/// ```toml
/// [google]
/// api_key = "..."
/// model = "gemini-2.5-flash"
/// ```
#[derive(Default, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

// Manual Debug impl to prevent leaking the API key in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptsConfig {
    pub suggest: Option<PromptTemplate>,
    pub infer: Option<PromptTemplate>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl BrancheckConfig {
    /// Load the config file, if one exists.
    ///
    /// `Ok(None)` means "no file" and is not an error; the caller resolves
    /// defaults. Read and parse failures are surfaced so a user's typo does
    /// not silently fall back to defaults.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        read_from(path).map(Some)
    }
}

fn read_from(path: PathBuf) -> Result<BrancheckConfig, ConfigError> {
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            return Err(ConfigError::Read { path, source: err });
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(err) => {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            Err(ConfigError::Parse { path, source: err })
        }
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".brancheck").join("config.toml"))
}

/// Fully-resolved application settings. Every field has a value.
#[derive(Debug, Clone)]
pub struct Settings {
    pub debounce: Duration,
    pub step: Duration,
    pub pattern: String,
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub base_url: String,
    pub suggest_prompt: PromptTemplate,
    pub infer_prompt: PromptTemplate,
}

impl Settings {
    /// Resolve raw config (or its absence) into settings, falling back to
    /// [`API_KEY_ENV_VAR`] when the file does not set a key.
    #[must_use]
    pub fn resolve(config: Option<BrancheckConfig>) -> Self {
        let env_key = env::var(API_KEY_ENV_VAR).ok().filter(|k| !k.is_empty());
        Self::resolve_inner(config, env_key)
    }

    fn resolve_inner(config: Option<BrancheckConfig>, env_key: Option<String>) -> Self {
        let config = config.unwrap_or_default();
        let app = config.app.unwrap_or_default();
        let branch = config.branch.unwrap_or_default();
        let google = config.google.unwrap_or_default();
        let prompts = config.prompts.unwrap_or_default();

        let api_key = google.api_key.or(env_key).map(ApiKey::new);
        if api_key.is_none() {
            tracing::warn!(
                "No Gemini API key in config or {API_KEY_ENV_VAR}; AI checks will report this"
            );
        }

        Self {
            debounce: positive_seconds(
                app.debounce_seconds,
                DEFAULT_DEBOUNCE_SECONDS,
                "app.debounce_seconds",
            ),
            step: positive_seconds(app.step_seconds, DEFAULT_STEP_SECONDS, "app.step_seconds"),
            pattern: branch.pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_owned()),
            api_key,
            model: google.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: google
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            suggest_prompt: prompts
                .suggest
                .unwrap_or_else(|| PromptTemplate::new(DEFAULT_SUGGEST_PROMPT)),
            infer_prompt: prompts
                .infer
                .unwrap_or_else(|| PromptTemplate::new(DEFAULT_INFER_PROMPT)),
        }
    }
}

/// Accept only finite, strictly positive durations; anything else keeps the
/// default. The timer rejects non-positive values at construction, so this
/// filter keeps bad config a warning instead of a startup error.
fn positive_seconds(value: Option<f32>, default: f32, field: &str) -> Duration {
    let seconds = match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        Some(v) => {
            tracing::warn!("Ignoring non-positive {field} = {v}; using {default}");
            default
        }
        None => default,
    };
    Duration::from_secs_f32(seconds)
}
