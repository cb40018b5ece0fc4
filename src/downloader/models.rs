// Common data models for request configuration and dispatch

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use time::macros::format_description;

use super::errors::ValidationError;

/// Output video quality (vertical resolution, or `max`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
pub enum VideoQuality {
    #[strum(serialize = "max")]
    Max,
    #[strum(serialize = "2160")]
    P2160,
    #[strum(serialize = "1440")]
    P1440,
    #[strum(serialize = "1080")]
    P1080,
    #[default]
    #[strum(serialize = "720")]
    P720,
    #[strum(serialize = "480")]
    P480,
    #[strum(serialize = "360")]
    P360,
    #[strum(serialize = "240")]
    P240,
    #[strum(serialize = "144")]
    P144,
}

/// Preferred video codec for providers that offer several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Av1,
    Vp9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AudioFormat {
    Best,
    #[default]
    Mp3,
    Ogg,
    Wav,
    Opus,
}

/// Naming scheme the upstream applies to produced files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FilenameStyle {
    /// Standard naming
    #[default]
    Classic,
    /// More descriptive naming
    Pretty,
    /// Simplistic naming
    Basic,
    /// Detailed naming including additional metadata
    Nerdy,
}

/// Track selection sent as `downloadMode`; absent means audio and video
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DownloadMode {
    Audio,
    Mute,
}

/// Clip boundary: a 24-hour `HH:MM:SS` clock or a plain integer (epoch-like) string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipTime {
    Clock(time::Time),
    /// Optionally signed digits, kept as supplied (no width limit)
    Numeric(String),
}

lazy_static! {
    static ref NUMERIC_RE: Regex = Regex::new(r"^[+-]?\d+$").unwrap();
}

impl ClipTime {
    /// Parse one of the two accepted shapes, naming `field` on failure.
    pub fn parse(field: &'static str, input: &str) -> Result<Self, ValidationError> {
        if NUMERIC_RE.is_match(input) {
            return Ok(Self::Numeric(input.to_string()));
        }

        time::Time::parse(input, format_description!("[hour]:[minute]:[second]"))
            .map(Self::Clock)
            .map_err(|_| {
                ValidationError::new(field, input, "expected HH:MM:SS or an integer timestamp")
            })
    }
}

impl fmt::Display for ClipTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock(t) => write!(f, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()),
            Self::Numeric(n) => f.write_str(n),
        }
    }
}

impl Serialize for ClipTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Predefined overlay anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "camelCase")]
pub enum WatermarkAnchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkPosition {
    Anchor(WatermarkAnchor),
    /// Pixel offset, 1-4 digits on each side of `x:y`; `raw` is the text as supplied
    Offset { x: u16, y: u16, raw: String },
}

impl Default for WatermarkPosition {
    fn default() -> Self {
        Self::Anchor(WatermarkAnchor::default())
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anchor(anchor) => write!(f, "{}", anchor),
            Self::Offset { raw, .. } => f.write_str(raw),
        }
    }
}

impl Serialize for WatermarkPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Validated numeric watermark field; serializes exactly as supplied
/// (`"1.50"` stays a string, `1.5` stays a number).
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkNumber {
    value: f64,
    raw: serde_json::Value,
}

impl WatermarkNumber {
    pub(crate) fn new(value: f64, raw: serde_json::Value) -> Self {
        Self { value, raw }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}

impl Serialize for WatermarkNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Fully validated overlay description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkSpec {
    pub url: String,
    pub position: WatermarkPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<WatermarkNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<WatermarkNumber>,
}

/// Immutable, validated request descriptor produced by
/// [`ConfigurationBuilder::build`](super::builder::ConfigurationBuilder::build).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfiguration {
    pub(crate) source_url: String,
    pub(crate) video_quality: VideoQuality,
    pub(crate) video_codec: VideoCodec,
    pub(crate) audio_format: AudioFormat,
    pub(crate) filename_style: FilenameStyle,
    pub(crate) audio_only: bool,
    pub(crate) video_only: bool,
    pub(crate) mute_audio: bool,
    pub(crate) strip_metadata: bool,
    pub(crate) tiktok_full_audio: bool,
    pub(crate) twitter_gif_convert: bool,
    pub(crate) tiktok_prefer_h265: bool,
    pub(crate) dub_language: Option<String>,
    pub(crate) start_time: Option<ClipTime>,
    pub(crate) end_time: Option<ClipTime>,
    pub(crate) duration_limit_minutes: Option<u32>,
    pub(crate) watermark: Option<WatermarkSpec>,
}

impl RequestConfiguration {
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn video_quality(&self) -> VideoQuality {
        self.video_quality
    }

    pub fn video_codec(&self) -> VideoCodec {
        self.video_codec
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.audio_format
    }

    pub fn filename_style(&self) -> FilenameStyle {
        self.filename_style
    }

    pub fn dub_language(&self) -> Option<&str> {
        self.dub_language.as_deref()
    }

    pub fn start_time(&self) -> Option<&ClipTime> {
        self.start_time.as_ref()
    }

    pub fn end_time(&self) -> Option<&ClipTime> {
        self.end_time.as_ref()
    }

    pub fn duration_limit_minutes(&self) -> Option<u32> {
        self.duration_limit_minutes
    }

    pub fn watermark(&self) -> Option<&WatermarkSpec> {
        self.watermark.as_ref()
    }

    pub fn flags(&self) -> Flags {
        Flags {
            audio_only: self.audio_only,
            video_only: self.video_only,
            mute_audio: self.mute_audio,
            strip_metadata: self.strip_metadata,
            tiktok_full_audio: self.tiktok_full_audio,
            twitter_gif_convert: self.twitter_gif_convert,
            tiktok_prefer_h265: self.tiktok_prefer_h265,
        }
    }

    /// Track selection derived from the audio/video flags.
    pub fn download_mode(&self) -> Option<DownloadMode> {
        if self.audio_only {
            Some(DownloadMode::Audio)
        } else if self.video_only || self.mute_audio {
            Some(DownloadMode::Mute)
        } else {
            None
        }
    }

    /// Wire representation; unset optional fields are omitted.
    pub fn to_payload(&self) -> RequestPayload<'_> {
        RequestPayload {
            url: &self.source_url,
            video_quality: self.video_quality.as_ref(),
            filename_style: self.filename_style.as_ref(),
            disable_metadata: self.strip_metadata,
            twitter_gif: self.twitter_gif_convert,
            tiktok_h265: self.tiktok_prefer_h265,
            youtube_video_codec: self.video_codec.as_ref(),
            audio_format: self.audio_format.as_ref(),
            tiktok_full_audio: self.tiktok_full_audio.then_some(true),
            youtube_dub_lang: self.dub_language.as_deref(),
            start_time: self.start_time.as_ref(),
            end_time: self.end_time.as_ref(),
            watermark: self.watermark.as_ref(),
            duration_limit: self.duration_limit_minutes,
            download_mode: self.download_mode().map(<&'static str>::from),
        }
    }
}

/// Independent boolean options of a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub audio_only: bool,
    pub video_only: bool,
    pub mute_audio: bool,
    pub strip_metadata: bool,
    pub tiktok_full_audio: bool,
    pub twitter_gif_convert: bool,
    pub tiktok_prefer_h265: bool,
}

/// JSON body posted to a resolution endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload<'a> {
    pub url: &'a str,
    pub video_quality: &'a str,
    pub filename_style: &'a str,
    pub disable_metadata: bool,
    pub twitter_gif: bool,
    pub tiktok_h265: bool,
    pub youtube_video_codec: &'a str,
    pub audio_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiktok_full_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_dub_lang: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<&'a ClipTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<&'a ClipTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<&'a WatermarkSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_mode: Option<&'a str>,
}

/// Upstream success body, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SuccessPayload(pub serde_json::Value);

impl SuccessPayload {
    /// The `status` field (`tunnel`, `redirect`, `picker`, ...)
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(|s| s.as_str())
    }

    /// Download location, when the upstream returned a single asset.
    pub fn url(&self) -> Option<&str> {
        self.0.get("url").and_then(|s| s.as_str())
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

/// Ordered, equivalent endpoints; priority is list order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointList(Vec<String>);

impl EndpointList {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(endpoints.into_iter().map(Into::into).collect())
    }

    /// Parse a comma-separated list, skipping blanks.
    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_time_shapes() {
        assert!(ClipTime::parse("startTime", "12:30:00").is_ok());
        assert!(ClipTime::parse("startTime", "1690000000").is_ok());
        assert!(ClipTime::parse("startTime", "99:99:99").is_err());
        assert!(ClipTime::parse("startTime", "abc").is_err());
        assert!(ClipTime::parse("startTime", "1:2:3").is_err());
        assert!(ClipTime::parse("startTime", "").is_err());
        assert!(ClipTime::parse("startTime", "1.5").is_err());
        assert!(ClipTime::parse("startTime", "+-5").is_err());

        let err = ClipTime::parse("endTime", "abc").unwrap_err();
        assert_eq!(err.field, "endTime");
        assert_eq!(err.value, "abc");
    }

    #[test]
    fn test_clip_time_keeps_original_text() {
        let clock = ClipTime::parse("startTime", "01:02:03").unwrap();
        assert_eq!(clock.to_string(), "01:02:03");
        let numeric = ClipTime::parse("startTime", "1690000000").unwrap();
        assert_eq!(serde_json::to_value(&numeric).unwrap(), "1690000000");
    }

    #[test]
    fn test_clip_time_numeric_sign_and_width() {
        let signed = ClipTime::parse("startTime", "+5").unwrap();
        assert_eq!(signed, ClipTime::Numeric("+5".into()));
        assert_eq!(signed.to_string(), "+5");

        let wide = ClipTime::parse("endTime", "99999999999999999999").unwrap();
        assert_eq!(serde_json::to_value(&wide).unwrap(), "99999999999999999999");
    }

    #[test]
    fn test_enum_domains() {
        assert_eq!("max".parse::<VideoQuality>().unwrap(), VideoQuality::Max);
        assert_eq!("144".parse::<VideoQuality>().unwrap(), VideoQuality::P144);
        assert!("4k".parse::<VideoQuality>().is_err());
        assert_eq!(VideoCodec::Vp9.as_ref(), "vp9");
        assert_eq!(AudioFormat::default().as_ref(), "mp3");
        assert_eq!(FilenameStyle::Nerdy.as_ref(), "nerdy");
        assert_eq!("bottomRight".parse::<WatermarkAnchor>().unwrap(), WatermarkAnchor::BottomRight);
        assert!("bottomright".parse::<WatermarkAnchor>().is_err());
    }

    #[test]
    fn test_endpoint_list_parse() {
        let list = EndpointList::parse(" https://a.example/ ,, https://b.example/");
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["https://a.example/", "https://b.example/"]);
    }
}
