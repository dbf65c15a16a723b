pub mod gemini;
pub mod parse;
pub mod prompt;
pub mod rotation;

use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of the rewrite service, classified so the rotation policy
/// can decide between rotating credentials and backing off. Structured
/// status information is preferred; message substrings are the fallback for
/// unstructured transports.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Quota exhaustion, rate limiting, or an invalid credential. Rotating
    /// to another key may help.
    #[error("rewrite credential rejected: {0}")]
    ApiKey(String),

    /// Anything else: network failures, 5xx responses, empty model output.
    /// Retried with backoff.
    #[error("transient rewrite failure: {0}")]
    Transient(String),
}

impl RewriteError {
    /// Classify an unstructured error message the way quota failures show up
    /// in provider error strings.
    pub fn from_message(message: String) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("quota")
            || lowered.contains("rate limit")
            || lowered.contains("resource_exhausted")
            || lowered.contains("api key not valid")
            || lowered.contains("api_key_invalid")
        {
            RewriteError::ApiKey(message)
        } else {
            RewriteError::Transient(message)
        }
    }

    pub fn is_api_key_error(&self) -> bool {
        matches!(self, RewriteError::ApiKey(_))
    }
}

/// Parsed, validated output of a rewrite call: all three text fields are
/// guaranteed non-empty, the title is plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub seo_score: u32,
}

#[async_trait]
pub trait Rewriter: Send + Sync {
    /// One raw call to the generative-text service: prompt in, unparsed
    /// response text out.
    async fn rewrite(&self, prompt: &str) -> Result<String, RewriteError>;

    /// Swap the active credential (used by the rotation policy).
    fn set_api_key(&mut self, key: &str);
}
