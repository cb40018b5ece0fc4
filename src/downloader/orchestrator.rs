// EndpointFailoverProxy - ordered failover across equivalent endpoints
//
// Endpoints are tried strictly in list order, one at a time. The first success
// wins and nothing after it is attempted. Failures are recorded, never masked:
// if every endpoint fails the caller gets all of them, in order.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::errors::{AggregateError, DispatchError, EndpointFailure};
use super::models::{EndpointList, RequestConfiguration, SuccessPayload};
use super::traits::Dispatch;

pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct EndpointFailoverProxy {
    dispatcher: Arc<dyn Dispatch>,
    endpoint_timeout: Duration,
}

impl EndpointFailoverProxy {
    pub fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            dispatcher,
            endpoint_timeout: DEFAULT_ENDPOINT_TIMEOUT,
        }
    }

    /// Upper bound for one endpoint's attempt (retries included).
    pub fn with_endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }

    pub async fn resolve(
        &self,
        endpoints: &EndpointList,
        config: &RequestConfiguration,
        cancel: &CancellationToken,
    ) -> Result<SuccessPayload, AggregateError> {
        let mut aggregate = AggregateError::default();

        for endpoint in endpoints.iter() {
            info!(
                endpoint,
                dispatcher = self.dispatcher.name(),
                "trying endpoint"
            );

            let attempt = tokio::time::timeout(
                self.endpoint_timeout,
                self.dispatcher.dispatch(endpoint, config, cancel),
            )
            .await;

            let error = match attempt {
                Ok(Ok(payload)) => {
                    info!(endpoint, "endpoint succeeded");
                    return Ok(payload);
                }
                Ok(Err(error)) => error,
                Err(_) => DispatchError::Timeout {
                    endpoint: endpoint.to_string(),
                    after: self.endpoint_timeout,
                },
            };

            warn!(endpoint, "endpoint failed: {}", error);
            let stop = error.is_cancelled();
            aggregate.failures.push(EndpointFailure {
                endpoint: endpoint.to_string(),
                error,
            });
            if stop {
                break;
            }
        }

        Err(aggregate)
    }
}
