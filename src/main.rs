use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use media_resolver::downloader::utils::build_http_client;
use media_resolver::{
    AggregateError, AuthArtifactCache, ConfigurationBuilder, EndpointFailoverProxy,
    HttpArtifactSource, ProbeError, QualityProbe, RequestConfiguration, ResolverSettings,
    RetryDispatcher, SettingsError, ValidationError, YtDlpExtractor,
};

#[derive(Parser)]
#[command(name = "media-resolver", version, about = "Resolve media URLs through upstream conversion APIs")]
struct Cli {
    /// Debug logging for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a URL into a downloadable asset, trying API_URL endpoints in order
    Resolve(ResolveArgs),
    /// List the qualities a YouTube video is available in
    Qualities {
        url: String,
    },
}

#[derive(Args)]
struct ResolveArgs {
    url: String,
    /// max, 2160, 1440, 1080, 720, 480, 360, 240, 144
    #[arg(long)]
    quality: Option<String>,
    /// h264, av1, vp9
    #[arg(long)]
    codec: Option<String>,
    /// best, mp3, ogg, wav, opus
    #[arg(long)]
    audio_format: Option<String>,
    /// classic, pretty, basic, nerdy
    #[arg(long)]
    filename_style: Option<String>,
    #[arg(long)]
    audio_only: bool,
    #[arg(long)]
    video_only: bool,
    #[arg(long)]
    mute_audio: bool,
    #[arg(long)]
    strip_metadata: bool,
    #[arg(long)]
    tiktok_full_audio: bool,
    #[arg(long)]
    twitter_gif: bool,
    #[arg(long)]
    tiktok_h265: bool,
    #[arg(long)]
    dub_lang: Option<String>,
    /// HH:MM:SS or an integer
    #[arg(long)]
    start: Option<String>,
    /// HH:MM:SS or an integer
    #[arg(long)]
    end: Option<String>,
    /// Minutes
    #[arg(long)]
    duration_limit: Option<String>,
    /// Watermark as JSON, e.g. '{"url":"https://x/a.png","position":"center"}'
    #[arg(long)]
    watermark: Option<String>,
    /// One attempt per endpoint, no retries
    #[arg(long)]
    single_shot: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Resolve(#[from] AggregateError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("cancelled")]
    Cancelled,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "media_resolver=debug"
    } else {
        "media_resolver=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancelled on the first Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            trigger.cancel();
        }
    });
    token
}

async fn run(command: Command) -> Result<(), CliError> {
    let settings = ResolverSettings::from_env()?;
    let cancel = shutdown_token();

    match command {
        Command::Resolve(args) => {
            let config = configure(&args)?;
            let client = build_http_client(settings.request_timeout, None)?;
            let dispatcher = if args.single_shot {
                RetryDispatcher::single_shot(client, &settings.api_key)?
            } else {
                RetryDispatcher::new(client, &settings.api_key)?
            };
            let proxy = EndpointFailoverProxy::new(Arc::new(dispatcher))
                .with_endpoint_timeout(settings.endpoint_timeout);

            info!(endpoints = settings.endpoints.len(), url = config.source_url(), "resolving");
            let payload = proxy.resolve(&settings.endpoints, &config, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Qualities { url } => {
            let extractor = YtDlpExtractor::new(settings.ytdlp_path.clone());
            let mut probe =
                QualityProbe::new(Arc::new(extractor)).with_proxy(settings.proxy.clone());
            if let Some(cookie_url) = &settings.cookie_url {
                let client =
                    build_http_client(settings.request_timeout, settings.proxy.as_deref())?;
                let source = HttpArtifactSource::new(client, cookie_url.clone());
                probe = probe.with_artifacts(Arc::new(AuthArtifactCache::new(
                    Arc::new(source),
                    settings.proxy.clone(),
                )));
            }

            let qualities = tokio::select! {
                result = probe.list_qualities(&url) => result?,
                _ = cancel.cancelled() => return Err(CliError::Cancelled),
            };
            println!("{}", serde_json::to_string(&qualities)?);
        }
    }

    Ok(())
}

fn configure(args: &ResolveArgs) -> Result<RequestConfiguration, ValidationError> {
    let mut builder = ConfigurationBuilder::new(args.url.as_str())?;

    if let Some(quality) = &args.quality {
        builder.video_quality(quality)?;
    }
    if let Some(codec) = &args.codec {
        builder.video_codec(codec)?;
    }
    if let Some(format) = &args.audio_format {
        builder.audio_format(format)?;
    }
    if let Some(style) = &args.filename_style {
        builder.filename_style(style)?;
    }
    if let Some(language) = &args.dub_lang {
        builder.dub_language(language)?;
    }
    if let Some(start) = &args.start {
        builder.start_time(start)?;
    }
    if let Some(end) = &args.end {
        builder.end_time(end)?;
    }
    if let Some(limit) = &args.duration_limit {
        builder.duration_limit(limit)?;
    }
    if let Some(watermark) = &args.watermark {
        builder.watermark_str(watermark)?;
    }

    builder
        .audio_only(args.audio_only)
        .video_only(args.video_only)
        .mute_audio(args.mute_audio)
        .strip_metadata(args.strip_metadata)
        .tiktok_full_audio(args.tiktok_full_audio)
        .twitter_gif_convert(args.twitter_gif)
        .tiktok_prefer_h265(args.tiktok_h265);

    builder.build()
}
