//! Error types shared by every component of the crawl engine.
//!
//! Construction errors (`InvalidUrl`, `InvalidMethod`, `Configuration`) are
//! returned synchronously to the caller. Everything that happens after a
//! request has been submitted is reported through `Spider::on_error` or the
//! log, and never stops the engine.

use reqwest::StatusCode;
use thiserror::Error;

/// The error type for all crawl engine operations.
#[derive(Debug, Error)]
pub enum SpiderError {
    /// The request URL could not be parsed.
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The request method is not a valid HTTP method token.
    #[error("invalid http method '{0}'")]
    InvalidMethod(String),

    /// The crawler was configured with inconsistent settings.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The HTTP client failed (connection, timeout, too many redirects, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server kept answering with a retryable status code.
    #[error("giving up on {url} after {attempts} attempts: status {status}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        attempts: usize,
    },

    /// A rendered request was submitted but no renderer is configured.
    #[error("no renderer configured for rendered request {0}")]
    RendererUnavailable(String),

    /// The rendering backend failed.
    #[error("rendering error: {0}")]
    Rendering(String),

    /// A caller callback reported a failure.
    #[error("callback error: {0}")]
    Callback(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The crawl was stopped by a repeated interrupt signal.
    #[error("crawl interrupted")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpiderError {
    /// Creates a callback error from any displayable message.
    pub fn callback(message: impl std::fmt::Display) -> Self {
        Self::Callback(message.to_string())
    }

    /// Returns `true` for errors the retry policy should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rendering(_) | Self::Io(_))
    }
}
