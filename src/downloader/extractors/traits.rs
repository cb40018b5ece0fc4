// InfoExtractor trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::downloader::artifacts::AgentCredential;
use crate::downloader::errors::ExtractionError;

/// One encoded variant offered by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Frames per second
    pub fps: Option<f32>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// Provider quality label (e.g., "1080p60", "720p")
    pub quality_label: Option<String>,
}

impl Rendition {
    /// Carries a video stream (muxed or video-only).
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|v| v != "none")
    }
}

/// Metadata provider queried by the quality probe
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// List every rendition the provider offers for `url`.
    async fn extract_formats(
        &self,
        url: &str,
        credential: Option<&AgentCredential>,
    ) -> Result<Vec<Rendition>, ExtractionError>;
}
