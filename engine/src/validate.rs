//! Branch-name validation against the configured pattern.

use regex::Regex;

/// The configured pattern failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PatternError(#[from] regex::Error);

/// Check `input` against `pattern`.
///
/// The pattern is compiled at call time: it comes from user-editable config,
/// and a typo there must surface as a [`PatternError`] the status line can
/// show, not as a startup failure. One compile per debounce cycle is cheap.
pub fn validate(input: &str, pattern: &str) -> Result<bool, PatternError> {
    let regex = Regex::new(pattern)?;
    Ok(regex.is_match(input))
}
