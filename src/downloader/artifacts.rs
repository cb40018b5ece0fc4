// AuthArtifactCache - process-wide credential for metadata queries
//
// Each lookup cycle re-fetches the raw artifact and compares it byte-for-byte
// with the cached one. Identical bytes keep the existing credential (same Arc);
// different bytes build a new credential and replace it. A failed fetch never
// evicts what is cached.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::errors::{ArtifactFetchError, ArtifactUnavailable};

/// Desktop Chrome; the cookie endpoint serves browser clients only.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Where raw artifacts come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch_raw(&self) -> Result<String, ArtifactFetchError>;
}

/// Fetches the artifact body from a URL.
pub struct HttpArtifactSource {
    client: reqwest::Client,
    url: String,
}

impl HttpArtifactSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch_raw(&self) -> Result<String, ArtifactFetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactFetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// What the metadata provider actually consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentCredential {
    /// Value for a `Cookie` request header.
    pub cookie_header: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Deserialize)]
struct CookieEntry {
    name: String,
    value: String,
}

impl AgentCredential {
    /// Derive a credential from a raw artifact.
    ///
    /// Accepts either a JSON array of browser cookies (`[{"name", "value", ...}]`)
    /// or a ready-made cookie string.
    pub fn from_raw(raw: &str, proxy: Option<String>) -> Result<Self, ArtifactFetchError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ArtifactFetchError::Malformed("artifact is empty".to_string()));
        }

        let cookie_header = if trimmed.starts_with('[') {
            let cookies: Vec<CookieEntry> = serde_json::from_str(trimmed)
                .map_err(|e| ArtifactFetchError::Malformed(format!("cookie array: {}", e)))?;
            if cookies.is_empty() {
                return Err(ArtifactFetchError::Malformed(
                    "cookie array is empty".to_string(),
                ));
            }
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; ")
        } else {
            trimmed.to_string()
        };

        Ok(Self {
            cookie_header: Some(cookie_header),
            proxy,
        })
    }

    /// No cookies, only the proxy (when one is configured).
    pub fn proxy_only(proxy: Option<String>) -> Self {
        Self {
            cookie_header: None,
            proxy,
        }
    }
}

#[derive(Debug)]
pub struct AuthArtifact {
    raw: String,
    fetched_at: OffsetDateTime,
    credential: AgentCredential,
}

impl AuthArtifact {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fetched_at(&self) -> OffsetDateTime {
        self.fetched_at
    }

    pub fn credential(&self) -> &AgentCredential {
        &self.credential
    }
}

pub struct AuthArtifactCache {
    source: Arc<dyn ArtifactSource>,
    proxy: Option<String>,
    current: RwLock<Option<Arc<AuthArtifact>>>,
    /// Serializes fetch-compare-replace; readers of `current` never wait on it.
    refresh: tokio::sync::Mutex<()>,
}

impl AuthArtifactCache {
    pub fn new(source: Arc<dyn ArtifactSource>, proxy: Option<String>) -> Self {
        Self {
            source,
            proxy,
            current: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Cached artifact, without touching the source.
    pub fn current(&self) -> Option<Arc<AuthArtifact>> {
        self.current.read().clone()
    }

    /// Refresh from the source and return the artifact to use.
    ///
    /// On failure the error carries the previously cached artifact (if any),
    /// which stays cached.
    pub async fn get_artifact(&self) -> Result<Arc<AuthArtifact>, ArtifactUnavailable> {
        let _guard = self.refresh.lock().await;
        let stale = self.current();

        let raw = match self.source.fetch_raw().await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(stale = stale.is_some(), "auth artifact refresh failed: {}", error);
                return Err(ArtifactUnavailable { error, stale });
            }
        };

        if let Some(current) = &stale {
            if current.raw == raw {
                debug!("auth artifact unchanged");
                return Ok(Arc::clone(current));
            }
        }

        let credential = match AgentCredential::from_raw(&raw, self.proxy.clone()) {
            Ok(credential) => credential,
            Err(error) => {
                warn!("auth artifact rejected: {}", error);
                return Err(ArtifactUnavailable { error, stale });
            }
        };

        let artifact = Arc::new(AuthArtifact {
            raw,
            fetched_at: OffsetDateTime::now_utc(),
            credential,
        });
        *self.current.write() = Some(Arc::clone(&artifact));
        info!(replaced = stale.is_some(), "auth artifact refreshed");
        Ok(artifact)
    }
}

/// Source that replays a fixed script of fetch results, yielding mid-fetch
/// and recording how many fetches were ever in flight at once.
#[cfg(test)]
pub(crate) struct ScriptedSource {
    script: parking_lot::Mutex<std::collections::VecDeque<Result<String, ArtifactFetchError>>>,
    in_flight: std::sync::atomic::AtomicUsize,
    pub(crate) max_in_flight: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedSource {
    pub(crate) fn new(script: Vec<Result<String, ArtifactFetchError>>) -> Self {
        Self {
            script: parking_lot::Mutex::new(script.into()),
            in_flight: std::sync::atomic::AtomicUsize::new(0),
            max_in_flight: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ArtifactSource for ScriptedSource {
    async fn fetch_raw(&self) -> Result<String, ArtifactFetchError> {
        use std::sync::atomic::Ordering::SeqCst;

        let now = self.in_flight.fetch_add(1, SeqCst) + 1;
        self.max_in_flight.fetch_max(now, SeqCst);
        tokio::task::yield_now().await;
        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(Err(ArtifactFetchError::Status(404)));
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, SeqCst);
        result
    }
}
