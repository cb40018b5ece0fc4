// ConfigurationBuilder - validated accumulation of user-chosen output options
//
// Every setter validates before it mutates, so a rejected value leaves the
// builder exactly as it was. `build` hands out an immutable snapshot; nothing
// else ever sees the builder while it is still being filled in.

use std::str::FromStr;

use serde_json::Value;

use super::errors::ValidationError;
use super::models::{
    AudioFormat, ClipTime, FilenameStyle, RequestConfiguration, VideoCodec, VideoQuality,
};
use super::watermark::WatermarkValidator;

#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    config: RequestConfiguration,
}

impl ConfigurationBuilder {
    /// Start a configuration for `source_url` with every option at its default.
    pub fn new(source_url: impl Into<String>) -> Result<Self, ValidationError> {
        let source_url = source_url.into();
        let trimmed = source_url.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new("url", source_url, "source URL is required"));
        }

        Ok(Self {
            config: RequestConfiguration {
                source_url: trimmed.to_string(),
                video_quality: VideoQuality::default(),
                video_codec: VideoCodec::default(),
                audio_format: AudioFormat::default(),
                filename_style: FilenameStyle::default(),
                audio_only: false,
                video_only: false,
                mute_audio: false,
                strip_metadata: false,
                tiktok_full_audio: false,
                twitter_gif_convert: false,
                tiktok_prefer_h265: false,
                dub_language: None,
                start_time: None,
                end_time: None,
                duration_limit_minutes: None,
                watermark: None,
            },
        })
    }

    /// Target URL, available before finalization (e.g. for the quality probe).
    pub fn source_url(&self) -> &str {
        &self.config.source_url
    }

    pub fn video_quality(&mut self, quality: &str) -> Result<&mut Self, ValidationError> {
        self.config.video_quality = parse_domain("videoQuality", quality)?;
        Ok(self)
    }

    pub fn video_codec(&mut self, codec: &str) -> Result<&mut Self, ValidationError> {
        self.config.video_codec = parse_domain("youtubeVideoCodec", codec)?;
        Ok(self)
    }

    pub fn audio_format(&mut self, format: &str) -> Result<&mut Self, ValidationError> {
        self.config.audio_format = parse_domain("audioFormat", format)?;
        Ok(self)
    }

    pub fn filename_style(&mut self, style: &str) -> Result<&mut Self, ValidationError> {
        self.config.filename_style = parse_domain("filenameStyle", style)?;
        Ok(self)
    }

    pub fn audio_only(&mut self, enabled: bool) -> &mut Self {
        self.config.audio_only = enabled;
        self
    }

    pub fn video_only(&mut self, enabled: bool) -> &mut Self {
        self.config.video_only = enabled;
        self
    }

    pub fn mute_audio(&mut self, enabled: bool) -> &mut Self {
        self.config.mute_audio = enabled;
        self
    }

    pub fn strip_metadata(&mut self, enabled: bool) -> &mut Self {
        self.config.strip_metadata = enabled;
        self
    }

    /// Original sound instead of the video's audio track (TikTok).
    pub fn tiktok_full_audio(&mut self, enabled: bool) -> &mut Self {
        self.config.tiktok_full_audio = enabled;
        self
    }

    /// Convert Twitter gifs to real .gif files.
    pub fn twitter_gif_convert(&mut self, enabled: bool) -> &mut Self {
        self.config.twitter_gif_convert = enabled;
        self
    }

    /// Prefer 1080p h265 renditions (TikTok).
    pub fn tiktok_prefer_h265(&mut self, enabled: bool) -> &mut Self {
        self.config.tiktok_prefer_h265 = enabled;
        self
    }

    /// Audio track language, sent only when set.
    pub fn dub_language(&mut self, language: &str) -> Result<&mut Self, ValidationError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(ValidationError::new("youtubeDubLang", language, "language tag is empty"));
        }
        self.config.dub_language = Some(language.to_string());
        Ok(self)
    }

    pub fn start_time(&mut self, time: &str) -> Result<&mut Self, ValidationError> {
        self.config.start_time = Some(ClipTime::parse("startTime", time)?);
        Ok(self)
    }

    pub fn end_time(&mut self, time: &str) -> Result<&mut Self, ValidationError> {
        self.config.end_time = Some(ClipTime::parse("endTime", time)?);
        Ok(self)
    }

    /// Maximum media duration in minutes; must be a positive integer.
    pub fn duration_limit(&mut self, minutes: &str) -> Result<&mut Self, ValidationError> {
        let limit = minutes
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| {
                ValidationError::new("durationLimit", minutes, "expected a positive integer")
            })?;
        self.config.duration_limit_minutes = Some(limit);
        Ok(self)
    }

    pub fn watermark(&mut self, watermark: &Value) -> Result<&mut Self, ValidationError> {
        self.config.watermark = Some(WatermarkValidator::validate(watermark)?);
        Ok(self)
    }

    /// Same as [`watermark`](Self::watermark) for the serialized form.
    pub fn watermark_str(&mut self, watermark: &str) -> Result<&mut Self, ValidationError> {
        self.config.watermark = Some(WatermarkValidator::validate_str(watermark)?);
        Ok(self)
    }

    /// Finalize into an immutable configuration.
    ///
    /// Audio-only and video-only together are contradictory and rejected
    /// rather than silently resolved.
    pub fn build(&self) -> Result<RequestConfiguration, ValidationError> {
        if self.config.audio_only && self.config.video_only {
            return Err(ValidationError::new(
                "downloadMode",
                "audio+video",
                "audio-only and video-only are mutually exclusive",
            ));
        }
        Ok(self.config.clone())
    }
}

fn parse_domain<T: FromStr>(field: &'static str, value: &str) -> Result<T, ValidationError> {
    value
        .parse::<T>()
        .map_err(|_| ValidationError::new(field, value, "value is not in the allowed set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{DownloadMode, WatermarkAnchor, WatermarkPosition};
    use serde_json::json;

    fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.video_quality(), VideoQuality::P720);
        assert_eq!(config.video_codec(), VideoCodec::H264);
        assert_eq!(config.audio_format(), AudioFormat::Mp3);
        assert_eq!(config.filename_style(), FilenameStyle::Classic);
        assert_eq!(config.download_mode(), None);
        assert_eq!(config.watermark(), None);
    }

    #[test]
    fn test_empty_source_rejected() {
        let err = ConfigurationBuilder::new("   ").unwrap_err();
        assert_eq!(err.field, "url");
    }

    #[test]
    fn test_domain_values_accepted() {
        for quality in ["max", "2160", "1440", "1080", "720", "480", "360", "240", "144"] {
            let config = builder().video_quality(quality).unwrap().build().unwrap();
            assert_eq!(config.video_quality().as_ref(), quality);
        }
        for codec in ["h264", "av1", "vp9"] {
            let config = builder().video_codec(codec).unwrap().build().unwrap();
            assert_eq!(config.video_codec().as_ref(), codec);
        }
        for format in ["best", "mp3", "ogg", "wav", "opus"] {
            let config = builder().audio_format(format).unwrap().build().unwrap();
            assert_eq!(config.audio_format().as_ref(), format);
        }
        for style in ["classic", "pretty", "basic", "nerdy"] {
            let config = builder().filename_style(style).unwrap().build().unwrap();
            assert_eq!(config.filename_style().as_ref(), style);
        }
    }

    #[test]
    fn test_rejected_value_leaves_state_unchanged() {
        let mut b = builder();
        b.video_quality("1080").unwrap();
        b.video_codec("av1").unwrap();
        b.audio_format("opus").unwrap();
        b.filename_style("nerdy").unwrap();
        b.start_time("00:00:10").unwrap();
        b.duration_limit("5").unwrap();
        let before = b.build().unwrap();

        let err = b.video_quality("4k").unwrap_err();
        assert_eq!(err.field, "videoQuality");
        assert_eq!(err.value, "4k");
        assert!(b.video_codec("h265").is_err());
        assert!(b.audio_format("flac").is_err());
        assert!(b.filename_style("fancy").is_err());
        assert!(b.start_time("99:99:99").is_err());
        assert!(b.duration_limit("0").is_err());
        assert!(b.duration_limit("-3").is_err());
        assert!(b.duration_limit("ten").is_err());
        assert!(b.watermark(&json!({"url": "not-a-url"})).is_err());

        assert_eq!(b.build().unwrap(), before);
    }

    #[test]
    fn test_time_fields() {
        let mut b = builder();
        b.start_time("12:30:00").unwrap().end_time("1690000000").unwrap();
        assert!(b.end_time("abc").is_err());
        let config = b.build().unwrap();
        assert_eq!(config.start_time().unwrap().to_string(), "12:30:00");
        assert_eq!(config.end_time().unwrap().to_string(), "1690000000");
    }

    #[test]
    fn test_watermark_round_trips() {
        let mut b = builder();
        b.watermark(&json!({
            "url": "https://x/a.png",
            "position": "center",
            "scale": 1.5,
            "opacity": 0.5
        }))
        .unwrap();
        let config = b.build().unwrap();
        let spec = config.watermark().unwrap();
        assert_eq!(spec.url, "https://x/a.png");
        assert_eq!(spec.position, WatermarkPosition::Anchor(WatermarkAnchor::Center));

        let payload = serde_json::to_value(config.to_payload()).unwrap();
        assert_eq!(
            payload["watermark"],
            json!({"url": "https://x/a.png", "position": "center", "scale": 1.5, "opacity": 0.5})
        );
    }

    #[test]
    fn test_download_mode() {
        let config = builder().audio_only(true).build().unwrap();
        assert_eq!(config.download_mode(), Some(DownloadMode::Audio));
        assert!(config.flags().audio_only);
        assert!(!config.flags().video_only);

        let config = builder().video_only(true).build().unwrap();
        assert_eq!(config.download_mode(), Some(DownloadMode::Mute));

        let config = builder().mute_audio(true).build().unwrap();
        assert_eq!(config.download_mode(), Some(DownloadMode::Mute));

        let err = builder().audio_only(true).video_only(true).build().unwrap_err();
        assert_eq!(err.field, "downloadMode");
    }

    #[test]
    fn test_payload_omits_unset_fields() {
        let payload = serde_json::to_value(builder().build().unwrap().to_payload()).unwrap();
        assert_eq!(
            payload,
            json!({
                "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "videoQuality": "720",
                "filenameStyle": "classic",
                "disableMetadata": false,
                "twitterGif": false,
                "tiktokH265": false,
                "youtubeVideoCodec": "h264",
                "audioFormat": "mp3"
            })
        );
    }

    #[test]
    fn test_payload_includes_set_fields() {
        let mut b = builder();
        b.dub_language("fr")
            .unwrap()
            .start_time("00:01:00")
            .unwrap()
            .end_time("00:02:00")
            .unwrap()
            .duration_limit("15")
            .unwrap()
            .audio_only(true)
            .strip_metadata(true)
            .tiktok_full_audio(true);
        let payload = serde_json::to_value(b.build().unwrap().to_payload()).unwrap();

        assert_eq!(payload["youtubeDubLang"], "fr");
        assert_eq!(payload["startTime"], "00:01:00");
        assert_eq!(payload["endTime"], "00:02:00");
        assert_eq!(payload["durationLimit"], 15);
        assert_eq!(payload["downloadMode"], "audio");
        assert_eq!(payload["disableMetadata"], true);
        assert_eq!(payload["tiktokFullAudio"], true);
        assert!(payload.get("watermark").is_none());
    }
}
