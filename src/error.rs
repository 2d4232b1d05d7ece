//! Error types for each stage of the pipeline.
//!
//! Every external call gets its own error enum so that callers can tell an
//! empty result apart from a step that failed and was skipped. Only
//! [`GenerateError`] (and therefore [`PipelineError`]) ever aborts work, and
//! only for a single category.

use thiserror::Error;

/// Failure while fetching or parsing one feed, or scraping one article.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("feed parse error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Failure talking to the generative language model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("model returned no text (finish reason: {0})")]
    EmptyResponse(String),
    #[error("API key is not configured")]
    MissingApiKey,
}

/// Failure looking up a stock photo.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("access key is not configured")]
    MissingAccessKey,
}

/// Failure building or relaying the editor's email.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("mail credentials are not configured")]
    MissingCredentials,
}

/// Failure producing the draft for one category.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{stage} generation failed: {source}")]
    Llm {
        stage: &'static str,
        #[source]
        source: LlmError,
    },
}

/// Failure that aborted one category of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Failure loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unknown category: {0} (expected tech, bio or patent)")]
    UnknownCategory(String),
}
