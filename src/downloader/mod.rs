// Downloader module - request configuration and resilient dispatch

pub mod artifacts;
pub mod builder;
pub mod dispatch;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod settings;
pub mod traits;
pub mod utils;
pub mod watermark;

pub use artifacts::{AgentCredential, AuthArtifact, AuthArtifactCache, HttpArtifactSource};
pub use builder::ConfigurationBuilder;
pub use dispatch::RetryDispatcher;
pub use errors::{
    AggregateError, ArtifactFetchError, ArtifactUnavailable, DispatchError, ProbeError,
    SettingsError, UnsupportedUrlError, ValidationError,
};
pub use extractors::{QualityProbe, YtDlpExtractor};
pub use models::{EndpointList, RequestConfiguration, SuccessPayload};
pub use orchestrator::EndpointFailoverProxy;
pub use policy::RetryPolicy;
pub use settings::ResolverSettings;
pub use traits::Dispatch;
pub use watermark::WatermarkValidator;
