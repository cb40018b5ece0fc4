// CLI InfoExtractor - uses native `yt-dlp` binary
//
// Runs `yt-dlp --dump-json` once per quality lookup and reads the `formats` array.
// The agent credential is written to a private Netscape cookies file that
// lives only as long as the child process; the proxy is passed as-is.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::traits::{InfoExtractor, Rendition};
use crate::downloader::artifacts::{AgentCredential, BROWSER_USER_AGENT};
use crate::downloader::errors::ExtractionError;
use crate::downloader::utils::{run_output_with_timeout, truncate_chars};

pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;

const COOKIE_DOMAIN: &str = ".youtube.com";

/// CLI-based info extractor using yt-dlp binary
pub struct YtDlpExtractor {
    ytdlp_path: String,
    timeout_secs: u64,
}

impl YtDlpExtractor {
    /// Use `path` when given, otherwise look in the usual install locations.
    pub fn new(path: Option<String>) -> Self {
        Self {
            ytdlp_path: path.unwrap_or_else(Self::find_ytdlp),
            timeout_secs: DEFAULT_EXTRACT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn path(&self) -> &str {
        &self.ytdlp_path
    }

    /// Find yt-dlp binary
    fn find_ytdlp() -> String {
        let common_paths = [
            "/opt/homebrew/bin/yt-dlp",
            "/usr/local/bin/yt-dlp",
            "/usr/bin/yt-dlp",
        ];

        common_paths
            .iter()
            .find(|path| std::path::Path::new(path).exists())
            .map(|path| path.to_string())
            .unwrap_or_else(|| "yt-dlp".to_string())
    }

    /// Build command arguments
    fn build_args(
        &self,
        url: &str,
        cookies: Option<&Path>,
        proxy: Option<&str>,
    ) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--skip-download".to_string(),
            "--socket-timeout".to_string(),
            self.timeout_secs.to_string(),
            "--user-agent".to_string(),
            BROWSER_USER_AGENT.to_string(),
        ];

        if let Some(path) = cookies {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        if let Some(proxy) = proxy {
            args.push("--proxy".to_string());
            args.push(proxy.to_string());
        }

        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Netscape cookies.txt body for a `name=value; name2=value2` header.
    fn netscape_cookies(cookie_header: &str) -> String {
        let mut body = String::from("# Netscape HTTP Cookie File\n");
        for pair in cookie_header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            body.push_str(&format!(
                "{}\tTRUE\t/\tTRUE\t0\t{}\t{}\n",
                COOKIE_DOMAIN, name, value
            ));
        }
        body
    }

    fn write_cookie_file(cookie_header: &str) -> Result<NamedTempFile, ExtractionError> {
        let io_error = |e: std::io::Error| {
            ExtractionError::Execution(format!("failed to write cookies file: {}", e))
        };
        let mut file = tempfile::Builder::new()
            .prefix("media-resolver-cookies-")
            .suffix(".txt")
            .tempfile()
            .map_err(io_error)?;
        file.write_all(Self::netscape_cookies(cookie_header).as_bytes())
            .map_err(io_error)?;
        file.flush().map_err(io_error)?;
        Ok(file)
    }

    fn parse_formats(stdout: &[u8]) -> Result<Vec<Rendition>, ExtractionError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| ExtractionError::Parse(format!("Invalid JSON: {}", e)))?;

        let formats_array = json["formats"]
            .as_array()
            .ok_or_else(|| ExtractionError::Parse("No formats array in JSON".to_string()))?;

        Ok(formats_array
            .iter()
            .map(|f| Rendition {
                format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                ext: f["ext"].as_str().unwrap_or("").to_string(),
                height: f["height"].as_u64().map(|h| h as u32),
                fps: f["fps"].as_f64().map(|fps| fps as f32),
                vcodec: f["vcodec"].as_str().map(str::to_string),
                acodec: f["acodec"].as_str().map(str::to_string),
                quality_label: f["format_note"].as_str().map(str::to_string),
            })
            .collect())
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl InfoExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn extract_formats(
        &self,
        url: &str,
        credential: Option<&AgentCredential>,
    ) -> Result<Vec<Rendition>, ExtractionError> {
        // Removed on drop, so it must outlive the child process.
        let cookie_file = credential
            .and_then(|c| c.cookie_header.as_deref())
            .map(Self::write_cookie_file)
            .transpose()?;
        let proxy = credential.and_then(|c| c.proxy.as_deref());
        let args = self.build_args(url, cookie_file.as_ref().map(NamedTempFile::path), proxy);
        debug!(
            program = %self.ytdlp_path,
            with_cookie = cookie_file.is_some(),
            "running metadata extraction"
        );

        let output = run_output_with_timeout(&self.ytdlp_path, &args, self.timeout_secs).await;
        drop(cookie_file);
        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), "yt-dlp failed");
            return Err(ExtractionError::Execution(truncate_chars(stderr.trim(), 512)));
        }

        Self::parse_formats(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_without_credential() {
        let extractor = YtDlpExtractor::new(Some("yt-dlp".into())).with_timeout(15);
        let args = extractor.build_args("https://youtu.be/dQw4w9WgXcQ", None, None);

        assert_eq!(args[0], "--dump-json");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--socket-timeout" && w[1] == "15"));
        assert!(!args.contains(&"--cookies".to_string()));
        assert!(!args.contains(&"--proxy".to_string()));
        assert_eq!(args.last().unwrap(), "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn test_args_with_credential() {
        let extractor = YtDlpExtractor::new(Some("yt-dlp".into()));
        let file = YtDlpExtractor::write_cookie_file("SID=abc; HSID=xyz").unwrap();
        let args = extractor.build_args(
            "https://youtu.be/dQw4w9WgXcQ",
            Some(file.path()),
            Some("http://proxy:8080"),
        );
        let path = file.path().to_string_lossy().into_owned();

        assert!(args.windows(2).any(|w| w[0] == "--cookies" && w[1] == path));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--proxy" && w[1] == "http://proxy:8080"));
        assert!(!args.iter().any(|a| a.contains("SID=abc")));
        assert!(!args.contains(&"--add-header".to_string()));
    }

    #[test]
    fn test_cookie_file_contents() {
        let file = YtDlpExtractor::write_cookie_file("SID=abc; HSID=x=y; junk; =v").unwrap();
        let body = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(
            lines,
            vec![
                "# Netscape HTTP Cookie File",
                ".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc",
                ".youtube.com\tTRUE\t/\tTRUE\t0\tHSID\tx=y",
            ]
        );

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_parse_formats() {
        let stdout = br#"{
            "id": "dQw4w9WgXcQ",
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none", "format_note": "storyboard"},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "format_note": "medium"},
                {"format_id": "299", "ext": "mp4", "height": 1080, "fps": 60, "vcodec": "avc1.64002a", "acodec": "none", "format_note": "1080p60"}
            ]
        }"#;
        let formats = YtDlpExtractor::parse_formats(stdout).unwrap();

        assert_eq!(formats.len(), 3);
        assert!(!formats[0].has_video());
        assert!(!formats[1].has_video());
        assert!(formats[2].has_video());
        assert_eq!(formats[2].height, Some(1080));
        assert_eq!(formats[2].quality_label.as_deref(), Some("1080p60"));
    }

    #[test]
    fn test_parse_without_formats() {
        let err = YtDlpExtractor::parse_formats(br#"{"id": "x"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Parse(_)));
        assert!(YtDlpExtractor::parse_formats(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let extractor = YtDlpExtractor::new(Some("/nonexistent/yt-dlp".into()));
        let err = extractor
            .extract_formats("https://youtu.be/dQw4w9WgXcQ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ToolNotFound(_)));
    }
}
