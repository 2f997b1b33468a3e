use crate::{GEMINI_API_BASE_URL, RequestError, http_client, read_capped_error_body};
use brancheck_types::ApiKey;
use serde::Deserialize;
use serde_json::json;

/// Client for the Gemini `generateContent` endpoint.
///
/// Cheap to clone: the underlying `reqwest::Client` is an `Arc` internally,
/// so every bound callback can hold its own copy.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    #[must_use]
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            http: http_client().clone(),
            api_key,
            model: model.into(),
            base_url: GEMINI_API_BASE_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the shared hardened client (tests inject a plain client here,
    /// since the default refuses non-HTTPS endpoints).
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a prompt and return the generated text.
    ///
    /// `Ok(None)` means the upstream answered successfully but produced no
    /// usable candidate text; callers render that as "no suggestions" rather
    /// than an error.
    pub async fn generate(&self, prompt: &str) -> Result<Option<String>, RequestError> {
        let url = format!(
            "{base}/models/{model}:generateContent",
            base = self.base_url,
            model = self.model
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = read_capped_error_body(response).await;
            tracing::warn!(%status, "Gemini generateContent failed");
            return Err(RequestError::Status { status, body });
        }

        let data: GenerateResponse = response.json().await?;
        Ok(extract_text(data))
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Option<String> {
    let candidate = response.candidates?.into_iter().next()?;
    let parts = candidate.content?.parts?;

    let text: String = parts.into_iter().filter_map(|part| part.text).collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(ApiKey::new("test-key"), "gemini-2.5-flash")
            .with_base_url(server.uri())
            .with_http_client(reqwest::Client::new())
    }

    #[tokio::test]
    async fn generate_extracts_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "name this branch" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "feature/1-login" }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = test_client(&server)
            .generate("name this branch")
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("feature/1-login"));
    }

    #[tokio::test]
    async fn generate_concatenates_text_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "feature/1-a " }, { "text": "feature/2-b" }] }
                }]
            })))
            .mount(&server)
            .await;

        let text = test_client(&server).generate("p").await.unwrap();
        assert_eq!(text.as_deref(), Some("feature/1-a feature/2-b"));
    }

    #[tokio::test]
    async fn generate_returns_none_when_no_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let text = test_client(&server).generate("p").await.unwrap();
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn generate_returns_none_for_blank_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
            })))
            .mount(&server)
            .await;

        let text = test_client(&server).generate("p").await.unwrap();
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn generate_maps_http_error_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = test_client(&server).generate("p").await.unwrap_err();
        match err {
            RequestError::Status { status, body } => {
                assert_eq!(status, reqwest::StatusCode::TOO_MANY_REQUESTS);
                assert!(body.contains("quota exceeded"));
            }
            RequestError::Transport(e) => panic!("expected status error, got transport: {e}"),
        }
    }

    #[tokio::test]
    async fn generate_maps_unreachable_host_to_transport() {
        let client = GeminiClient::new(ApiKey::new("k"), "m")
            .with_base_url("http://127.0.0.1:1")
            .with_http_client(reqwest::Client::new());

        let err = client.generate("p").await.unwrap_err();
        assert!(matches!(err, RequestError::Transport(_)));
    }
}
