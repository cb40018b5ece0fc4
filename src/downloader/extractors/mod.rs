// InfoExtractor module - metadata queries behind the quality probe
//
// The yt-dlp CLI is the production provider; the probe only depends on the
// `InfoExtractor` trait so tests can stand in their own.

mod cli;
mod probe;
mod traits;

pub use cli::YtDlpExtractor;
pub use probe::{youtube_video_id, QualityProbe};
pub use traits::{InfoExtractor, Rendition};
