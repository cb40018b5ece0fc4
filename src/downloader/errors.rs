// Error taxonomy for configuration, dispatch, failover and metadata probing

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::artifacts::AuthArtifact;
use super::policy::RetryPolicy;

/// Bad input to the configuration builder or one of its validators.
///
/// Always local: never retried and never sent over the network.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field} '{value}': {reason}")]
pub struct ValidationError {
    /// Name of the offending field, as it appears in the request configuration.
    pub field: &'static str,
    /// The rejected input, rendered as text.
    pub value: String,
    pub reason: String,
    /// Underlying field error when the failure comes from a nested validator.
    #[source]
    pub cause: Option<WatermarkError>,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn watermark(value: impl Into<String>, cause: WatermarkError) -> Self {
        Self {
            field: "watermark",
            value: value.into(),
            reason: format!("failed to validate watermark values: {}", cause),
            cause: Some(cause),
        }
    }
}

/// Field-level watermark failure, embedded in the [`ValidationError`] for `watermark`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatermarkError {
    #[error("watermark input is not valid JSON: {0}")]
    Malformed(String),
    #[error("watermark input must be an array or an object")]
    UnexpectedShape,
    #[error("watermark {0} is required")]
    Missing(&'static str),
    #[error("watermark url '{0}' is not a valid absolute URL")]
    InvalidUrl(String),
    #[error("watermark position '{0}' must be a predefined label or x:y")]
    InvalidPosition(String),
    #[error("watermark scale '{0}' must be a positive number")]
    InvalidScale(String),
    #[error("watermark opacity '{0}' must be a number between 0 and 1")]
    InvalidOpacity(String),
}

/// Terminal failure of one endpoint, after retries were exhausted or
/// on the first non-retryable failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The endpoint answered, but with a non-2xx status or an application-level error body.
    #[error("{endpoint} failed with HTTP {status}{} after {attempts} attempt(s)", upstream_detail(.code, .text))]
    Upstream {
        endpoint: String,
        status: u16,
        code: Option<String>,
        text: Option<String>,
        attempts: u32,
    },

    /// The request never produced a response (connection refused, TLS, DNS, read timeout).
    #[error("{endpoint} is unreachable: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response whose body could not be understood.
    #[error("{endpoint} returned an unreadable response: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// The per-endpoint time bound elapsed.
    #[error("{endpoint} did not answer within {after:?}")]
    Timeout { endpoint: String, after: Duration },

    /// The caller went away; in-flight work and pending delays were abandoned.
    #[error("dispatch to {endpoint} was cancelled")]
    Cancelled { endpoint: String },
}

impl DispatchError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Upstream { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::InvalidResponse { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Cancelled { endpoint } => endpoint,
        }
    }

    /// Structured error code reported by the upstream, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Upstream { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// A failure is retried only when its code is listed as retryable or the status is exactly 500.
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            Self::Upstream { status, code, .. } => {
                *status == 500 || code.as_deref().is_some_and(|c| policy.is_retryable_code(c))
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// One endpoint's recorded failure inside an [`AggregateError`].
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: DispatchError,
}

/// Every endpoint of a failover chain failed.
#[derive(Debug, Default)]
pub struct AggregateError {
    /// Per-endpoint failures, in the order the endpoints were tried.
    pub failures: Vec<EndpointFailure>,
}

impl AggregateError {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when the chain stopped because the caller cancelled it.
    pub fn was_cancelled(&self) -> bool {
        self.failures.last().is_some_and(|f| f.error.is_cancelled())
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no endpoints configured");
        }
        write!(f, "all {} endpoint(s) failed", self.failures.len())?;
        for (index, failure) in self.failures.iter().enumerate() {
            write!(f, "\n  {}. {}", index + 1, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Credential refresh failed.
#[derive(Debug, Error)]
pub enum ArtifactFetchError {
    #[error("artifact source unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("artifact source answered HTTP {0}")]
    Status(u16),
    #[error("artifact is malformed: {0}")]
    Malformed(String),
}

/// A failed refresh, carrying the previously cached artifact when one exists.
///
/// Non-fatal when `stale` is present; the caller decides whether stale is acceptable.
#[derive(Debug, Error)]
#[error("{error}{}", stale_note(.stale))]
pub struct ArtifactUnavailable {
    #[source]
    pub error: ArtifactFetchError,
    pub stale: Option<Arc<AuthArtifact>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported URL: {url}")]
pub struct UnsupportedUrlError {
    pub url: String,
}

/// Failures of the metadata provider.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("extraction failed: {0}")]
    Execution(String),
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
    #[error("parse error: {0}")]
    Parse(String),
}

fn upstream_detail(code: &Option<String>, text: &Option<String>) -> String {
    let mut detail = String::new();
    if let Some(code) = code {
        detail.push_str(&format!(" [{}]", code));
    }
    if let Some(text) = text {
        detail.push_str(&format!(": {}", text));
    }
    detail
}

fn stale_note(stale: &Option<Arc<AuthArtifact>>) -> &'static str {
    if stale.is_some() {
        " (stale artifact available)"
    } else {
        ""
    }
}

/// Failures surfaced by the quality probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedUrlError),
    #[error(transparent)]
    Artifact(#[from] ArtifactUnavailable),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Missing or invalid process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("{0} env variable is missing, media resolver can't start")]
    Missing(&'static str),
    #[error("{name} env variable is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}
