use super::{RewriteError, Rewriter};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Google Gemini `generateContent` client. One instance serves the whole
/// process; the rotation policy swaps the key in place on quota failures.
pub struct GeminiRewriter {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

impl GeminiRewriter {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Map an HTTP failure to the rotation taxonomy. The structured status
    /// code decides first; the error message is only a fallback.
    fn classify_http_failure(status: StatusCode, body: &str) -> RewriteError {
        let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.error);
        let (api_status, message) = match detail {
            Some(e) => (e.status, e.message),
            None => (String::new(), body.chars().take(300).collect()),
        };
        let description = format!("gemini {} {}: {}", status.as_u16(), api_status, message);

        match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                RewriteError::ApiKey(description)
            }
            StatusCode::BAD_REQUEST if api_status == "INVALID_ARGUMENT" || api_status == "API_KEY_INVALID" => {
                // Invalid-key errors surface as 400 INVALID_ARGUMENT; let the
                // message heuristics separate them from genuine bad requests.
                RewriteError::from_message(description)
            }
            _ => RewriteError::from_message(description),
        }
    }
}

#[async_trait]
impl Rewriter for GeminiRewriter {
    async fn rewrite(&self, prompt: &str) -> Result<String, RewriteError> {
        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| RewriteError::Transient(format!("gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_http_failure(status, &body));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| RewriteError::Transient(format!("gemini response decode failed: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .concat()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(RewriteError::Transient("empty response from gemini".into()));
        }

        Ok(text)
    }

    fn set_api_key(&mut self, key: &str) {
        self.api_key = key.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_classifies_as_api_key_error() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = GeminiRewriter::classify_http_failure(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(err.is_api_key_error());
    }

    #[test]
    fn test_invalid_key_400_classifies_as_api_key_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = GeminiRewriter::classify_http_failure(StatusCode::BAD_REQUEST, body);
        assert!(err.is_api_key_error());
    }

    #[test]
    fn test_500_classifies_as_transient() {
        let body = r#"{"error":{"code":500,"message":"Internal error","status":"INTERNAL"}}"#;
        let err = GeminiRewriter::classify_http_failure(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(!err.is_api_key_error());
    }

    #[test]
    fn test_unstructured_body_falls_back_to_substring_heuristics() {
        let err = GeminiRewriter::classify_http_failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream quota exhausted",
        );
        assert!(err.is_api_key_error());
    }
}
