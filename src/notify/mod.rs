//! Downstream refresh trigger
//!
//! After a sweep has persisted its identifiers, the downstream service is
//! asked once to fetch the new events. The request is never retried.

use crate::config::NotifyConfig;
use crate::SweepError;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Path appended to the configured base URL
pub const FETCH_EVENTS_PATH: &str = "/events/fetch-events";

/// What the downstream service answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyResponse {
    pub status: u16,
    pub body: String,
}

impl NotifyResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for the downstream refresh endpoint
pub struct Notifier {
    client: Client,
    endpoint: Url,
}

impl Notifier {
    /// Creates a notifier targeting `<base_url>/events/fetch-events`
    ///
    /// A trailing slash on `base_url` is tolerated.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SweepError> {
        let endpoint = Url::parse(&format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            FETCH_EVENTS_PATH
        ))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self, SweepError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Sends one empty POST to the endpoint
    ///
    /// Any HTTP status is reported back rather than treated as an error;
    /// only transport failures produce `SweepError::Notify`.
    pub async fn notify(&self) -> Result<NotifyResponse, SweepError> {
        let to_error = |source| SweepError::Notify {
            endpoint: self.endpoint.to_string(),
            source,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .send()
            .await
            .map_err(to_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_error)?;

        tracing::debug!("Notified {} -> {}", self.endpoint, status);

        Ok(NotifyResponse { status, body })
    }
}
