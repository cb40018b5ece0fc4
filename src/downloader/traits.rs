// Dispatch trait - the seam between failover and a single endpoint

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::DispatchError;
use super::models::{RequestConfiguration, SuccessPayload};

/// Sends one configuration to one endpoint.
///
/// Implementations decide whether a failure is retried before it is
/// reported; the failover layer only sees the terminal outcome.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Name of the dispatcher (for logging)
    fn name(&self) -> &'static str;

    async fn dispatch(
        &self,
        endpoint: &str,
        config: &RequestConfiguration,
        cancel: &CancellationToken,
    ) -> Result<SuccessPayload, DispatchError>;
}
