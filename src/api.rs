//! Generative language model access with exponential backoff retry logic.
//!
//! This module provides the single seam through which the pipeline talks to
//! the hosted language model (Gemini's `generateContent` REST endpoint).
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async prompt-in, text-out interaction
//! - [`GeminiClient`]: `reqwest` implementation against the Gemini REST API
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! Selection, drafting and keyword extraction are generic over `AskAsync`,
//! so tests drive them with scripted fakes.
//!
//! # Retry Strategy
//!
//! - Retry count comes from configuration (default 0: a single attempt)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::LlmError;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for async language model interaction.
///
/// Implementors send a prompt to a model and return its text reply.
/// This abstraction allows for different backends or decorators (like retry logic).
pub trait AskAsync {
    /// Send `prompt` to the model and receive its reply.
    async fn ask(&self, prompt: &str) -> Result<String, LlmError>;
}

impl<T: AskAsync> AskAsync for &T {
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).ask(prompt).await
    }
}

/// Wrapper that retries a failed [`AskAsync`] call with exponential backoff.
///
/// Constructed with `max_retries = 0` it is a pass-through: drafting errors
/// then surface on the first failure and abort only their own category.
/// Selection and keyword extraction have their own fallbacks either way.
///
/// ```text
/// delay(n) = min(base_delay * 2^(n-1), 30s) + jitter(0..=250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// # Arguments
    ///
    /// * `inner` - The model client to wrap
    /// * `max_retries` - Extra attempts after the first failure
    /// * `base_delay` - Delay before the first retry
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    /// Saturates instead of overflowing for any retry count.
    fn backoff(&self, retry: usize) -> StdDuration {
        let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "debug", skip_all, fields(max_retries = self.max_retries))]
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        let started = Instant::now();
        let mut retry = 0usize;

        loop {
            let err = match self.inner.ask(prompt).await {
                Ok(reply) => {
                    if retry > 0 {
                        debug!(retry, "Model call recovered");
                    }
                    return Ok(reply);
                }
                Err(err) => err,
            };

            if retry >= self.max_retries {
                if self.max_retries > 0 {
                    error!(
                        attempts = retry + 1,
                        elapsed_ms = started.elapsed().as_millis(),
                        error = %err,
                        "Model call failed after all retries"
                    );
                }
                return Err(err);
            }

            retry += 1;
            let jitter = StdDuration::from_millis(rng().random_range(0..=250));
            let delay = self.backoff(retry) + jitter;
            warn!(retry, ?delay, error = %err, "Model call failed; backing off");
            sleep(delay).await;
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

/// Client for Gemini's `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client; its timeout bounds every call
    /// * `base_url` - API root, e.g. `https://generativelanguage.googleapis.com`
    /// * `model` - Model name, e.g. `gemini-2.5-flash`
    /// * `api_key` - Sent in the `x-goog-api-key` header
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl AskAsync for GeminiClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let t0 = Instant::now();
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), elapsed_ms = t0.elapsed().as_millis(), "Model API call failed");
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        let candidate = parsed.candidates.into_iter().next();
        let finish_reason = candidate
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| "none".to_string());
        let text: String = candidate
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse(finish_reason));
        }
        debug!(
            elapsed_ms = t0.elapsed().as_millis(),
            chars = text.len(),
            %finish_reason,
            "Model replied"
        );
        Ok(text)
    }
}
