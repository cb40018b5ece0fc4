// FormatSelector - quality labels from raw renditions
//
// Keeps video-bearing renditions only, reduces each label to its pixel height
// ("1080p60" -> "1080") and de-duplicates in first-seen order.

use lazy_static::lazy_static;
use regex::Regex;

use super::extractors::Rendition;

lazy_static! {
    static ref QUALITY_LABEL_RE: Regex = Regex::new(r"^(\d{2,4})p").unwrap();
}

/// Strip the `p` and any frame-rate or HDR suffix from a provider label.
pub fn normalize_quality_label(label: &str) -> Option<String> {
    QUALITY_LABEL_RE
        .captures(label.trim())
        .map(|caps| caps[1].to_string())
}

fn rendition_quality(rendition: &Rendition) -> Option<String> {
    rendition
        .quality_label
        .as_deref()
        .and_then(normalize_quality_label)
        .or_else(|| rendition.height.map(|h| h.to_string()))
}

/// Distinct qualities offered, in the provider's order.
pub fn available_qualities(renditions: &[Rendition]) -> Vec<String> {
    let mut qualities: Vec<String> = Vec::new();
    for quality in renditions
        .iter()
        .filter(|r| r.has_video())
        .filter_map(rendition_quality)
    {
        if !qualities.contains(&quality) {
            qualities.push(quality);
        }
    }
    qualities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(label: &str) -> Rendition {
        Rendition {
            vcodec: Some("avc1".into()),
            quality_label: Some(label.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_labels() {
        assert_eq!(normalize_quality_label("1080p60").as_deref(), Some("1080"));
        assert_eq!(normalize_quality_label("720p").as_deref(), Some("720"));
        assert_eq!(normalize_quality_label("2160p60 HDR").as_deref(), Some("2160"));
        assert_eq!(normalize_quality_label("720p50").as_deref(), Some("720"));
        assert_eq!(normalize_quality_label("medium"), None);
    }

    #[test]
    fn test_dedup_preserves_order() {
        let renditions = vec![video("1080p60"), video("1080p"), video("720p")];
        assert_eq!(available_qualities(&renditions), vec!["1080", "720"]);
    }

    #[test]
    fn test_audio_only_renditions_ignored() {
        let audio = Rendition {
            vcodec: Some("none".into()),
            acodec: Some("opus".into()),
            quality_label: Some("480p".into()),
            ..Default::default()
        };
        assert!(available_qualities(&[audio]).is_empty());
        assert!(available_qualities(&[]).is_empty());
    }

    #[test]
    fn test_height_fallback() {
        let unlabeled = Rendition {
            vcodec: Some("vp9".into()),
            height: Some(360),
            ..Default::default()
        };
        assert_eq!(available_qualities(&[unlabeled, video("360p")]), vec!["360"]);
    }
}
