// QualityProbe - enumerate the qualities a YouTube video is offered in

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use super::traits::InfoExtractor;
use crate::downloader::artifacts::{AgentCredential, AuthArtifactCache};
use crate::downloader::errors::{ArtifactUnavailable, ProbeError, UnsupportedUrlError};
use crate::downloader::format_selector::available_qualities;
use crate::downloader::models::RequestConfiguration;

lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "gaming.youtube.com",
];

/// Video id of a YouTube watch/short/embed URL, or `None` if `url` is not one.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();

    let candidate = if host == "youtu.be" {
        parsed.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host.as_str()) {
        let mut segments = parsed.path_segments()?;
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| VIDEO_ID_RE.is_match(id))
}

pub struct QualityProbe {
    extractor: Arc<dyn InfoExtractor>,
    artifacts: Option<Arc<AuthArtifactCache>>,
    proxy: Option<String>,
}

impl QualityProbe {
    pub fn new(extractor: Arc<dyn InfoExtractor>) -> Self {
        Self {
            extractor,
            artifacts: None,
            proxy: None,
        }
    }

    pub fn with_artifacts(mut self, cache: Arc<AuthArtifactCache>) -> Self {
        self.artifacts = Some(cache);
        self
    }

    /// Proxy used when no artifact cache is configured.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Distinct quality labels (e.g. `["1080", "720"]`) for `url`.
    ///
    /// Zero video renditions is an empty list, not an error.
    pub async fn list_qualities(&self, url: &str) -> Result<Vec<String>, ProbeError> {
        if youtube_video_id(url).is_none() {
            return Err(UnsupportedUrlError {
                url: url.to_string(),
            }
            .into());
        }

        let credential = self.credential().await?;
        let renditions = self
            .extractor
            .extract_formats(url, credential.as_ref())
            .await?;

        let qualities = available_qualities(&renditions);
        info!(
            extractor = self.extractor.name(),
            renditions = renditions.len(),
            qualities = qualities.len(),
            "quality probe finished"
        );
        Ok(qualities)
    }

    /// Probe the source URL of a finalized configuration.
    pub async fn list_qualities_for(
        &self,
        config: &RequestConfiguration,
    ) -> Result<Vec<String>, ProbeError> {
        self.list_qualities(config.source_url()).await
    }

    async fn credential(&self) -> Result<Option<AgentCredential>, ArtifactUnavailable> {
        let Some(cache) = &self.artifacts else {
            return Ok(self
                .proxy
                .clone()
                .map(|proxy| AgentCredential::proxy_only(Some(proxy))));
        };

        match cache.get_artifact().await {
            Ok(artifact) => Ok(Some(artifact.credential().clone())),
            Err(ArtifactUnavailable {
                error,
                stale: Some(stale),
            }) => {
                warn!("probing with stale auth artifact: {}", error);
                Ok(Some(stale.credential().clone()))
            }
            Err(unavailable) => Err(unavailable),
        }
    }
}
