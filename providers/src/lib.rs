//! Gemini text-generation client.
//!
//! The surrounding application consumes exactly one operation from this
//! crate: [`GeminiClient::generate`], which sends a prompt to the
//! `models/{model}:generateContent` endpoint and returns the first
//! candidate's text. There is deliberately no retry or backoff layer here;
//! a failed request surfaces as a [`RequestError`] and the caller decides
//! what to show the user.

use std::sync::OnceLock;
use std::time::Duration;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 30;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared hardened HTTP client: HTTPS-only, no redirects, bounded timeouts.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .https_only(true)
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build hardened HTTP client: {e}. Using minimal fallback.");
                reqwest::Client::builder()
                    .https_only(true)
                    .redirect(reqwest::redirect::Policy::none())
                    .build()
                    .expect("Minimal hardened HTTP client must build; cannot proceed without TLS")
            })
    })
}

/// Transport or protocol failure of the generate operation.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Read an error response body with a hard cap, so a misbehaving upstream
/// cannot balloon memory or flood the status line.
pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(mut text) => {
            if text.len() > MAX_ERROR_BODY_BYTES {
                text.truncate(MAX_ERROR_BODY_BYTES);
                text.push_str("...(truncated)");
            }
            text
        }
        Err(e) => format!("<unreadable error body: {e}>"),
    }
}

/// Google Gemini `generateContent` implementation.
///
/// Communicates with `{base_url}/models/{model}:generateContent`
/// (non-streaming). The request body is the minimal `contents`/`parts`
/// shape; the response is deserialized into typed candidate structs.
pub mod gemini;

pub use gemini::GeminiClient;
