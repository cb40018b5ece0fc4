// Process-level settings read from the environment
//
// Retry settings (ERROR_n, ERROR_RETRY_*) are not held here; they are
// re-read on every dispatch cycle by `RetryPolicy::from_env`.

use std::time::Duration;

use super::errors::SettingsError;
use super::models::EndpointList;
use super::orchestrator::DEFAULT_ENDPOINT_TIMEOUT;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    /// Resolution endpoints, in priority order (`API_URL`, comma-separated).
    pub endpoints: EndpointList,
    pub api_key: String,
    /// Artifact source for the quality probe (`COOKIE_URL`).
    pub cookie_url: Option<String>,
    /// `GLOBAL_AGENT_HTTP_PROXY`
    pub proxy: Option<String>,
    pub request_timeout: Duration,
    pub endpoint_timeout: Duration,
    pub ytdlp_path: Option<String>,
}

impl ResolverSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let endpoints = EndpointList::parse(&optional("API_URL").unwrap_or_default());
        if endpoints.is_empty() {
            return Err(SettingsError::Missing("API_URL"));
        }
        let api_key = optional("API_KEY").ok_or(SettingsError::Missing("API_KEY"))?;

        Ok(Self {
            endpoints,
            api_key,
            cookie_url: optional("COOKIE_URL"),
            proxy: optional("GLOBAL_AGENT_HTTP_PROXY"),
            request_timeout: seconds(
                "REQUEST_TIMEOUT_SECS",
                optional("REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            endpoint_timeout: seconds(
                "ENDPOINT_TIMEOUT_SECS",
                optional("ENDPOINT_TIMEOUT_SECS"),
                DEFAULT_ENDPOINT_TIMEOUT,
            )?,
            ytdlp_path: optional("YTDLP_PATH"),
        })
    }
}

fn seconds(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, SettingsError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(SettingsError::Invalid {
                name,
                reason: format!("expected a positive number of seconds, got {:?}", raw),
            }),
        },
    }
}
