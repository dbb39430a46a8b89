use async_trait::async_trait;
use csv::StringRecord;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::ResolverConfig;
use crate::constants::{COL_ADDRESS_LINE_1, COL_ADDRESS_LINE_2, COL_POSTCODE, COL_POST_TOWN};
use crate::error::{Result, ScraperError};
use crate::types::{AddressPart, ResolvedAddress};

/// Seam to the external address normalization service.
///
/// Implementations return `Ok` only for responses the service meant as data,
/// including validation rejections. Transport failures and unexpected HTTP
/// statuses are errors, and the caller retries them.
#[async_trait]
pub trait ResolutionService: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<ServiceResponse>;
}

/// Response body of the resolution service. All fields are optional on the
/// wire; validation happens once, in [`ServiceResponse::into_resolved`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub saon: Option<String>,
    #[serde(default)]
    pub paon: Option<String>,
    #[serde(default)]
    pub street: Option<ServicePart>,
    #[serde(default)]
    pub locality: Option<ServicePart>,
    #[serde(default)]
    pub town: Option<ServicePart>,
    #[serde(default)]
    pub postcode: Option<ServicePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicePart {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<ServicePart> for AddressPart {
    fn from(part: ServicePart) -> Self {
        AddressPart {
            name: part.name,
            url: part.url,
        }
    }
}

impl ServiceResponse {
    /// Validate the response into a usable address. A service-level error or
    /// a missing street, town or PAON discards the response.
    pub fn into_resolved(self) -> Option<ResolvedAddress> {
        if self.error.is_some() {
            return None;
        }
        let street = self.street?;
        let town = self.town?;
        let paon = self.paon?;
        Some(ResolvedAddress {
            saon: self.saon,
            paon,
            street: street.into(),
            locality: self.locality.map(Into::into),
            town: town.into(),
            postcode: self.postcode.map(Into::into),
        })
    }
}

/// reqwest-backed client for the Sorting Office endpoint.
pub struct SortingOfficeClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SortingOfficeClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ResolutionService for SortingOfficeClient {
    async fn resolve(&self, address: &str) -> Result<ServiceResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("address", address)])
            .send()
            .await?;

        let status = response.status();
        // 200 carries a resolved address, 400 a validation rejection; both
        // are data. Anything else is transient.
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::BAD_REQUEST {
            return Err(ScraperError::Api {
                message: format!("unexpected status {} from resolution service", status.as_u16()),
            });
        }

        let body = response.text().await?;
        let parsed: ServiceResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}

/// Resolves raw snapshot rows to validated addresses, retrying transient
/// service failures with linearly increasing backoff.
pub struct AddressResolver<S> {
    service: S,
    max_attempts: u32,
    backoff_step: Duration,
}

impl<S: ResolutionService> AddressResolver<S> {
    pub fn new(service: S, config: &ResolverConfig) -> Self {
        Self {
            service,
            max_attempts: config.max_attempts,
            backoff_step: Duration::from_secs(config.backoff_step_seconds),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Build the free-text query sent to the service. Empty fields keep
    /// their position, so the join may contain empty segments.
    pub fn build_query(record: &StringRecord) -> String {
        [
            COL_ADDRESS_LINE_1,
            COL_ADDRESS_LINE_2,
            COL_POST_TOWN,
            COL_POSTCODE,
        ]
        .iter()
        .map(|&col| record.get(col).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Resolve one raw row, or `None` when the service rejects the address
    /// or retries are exhausted. Errors never propagate past this point.
    pub async fn resolve(&self, record: &StringRecord) -> Option<ResolvedAddress> {
        let address = Self::build_query(record);
        let response = self.request_with_retries(&address).await?;
        response.into_resolved()
    }

    async fn request_with_retries(&self, address: &str) -> Option<ServiceResponse> {
        let mut attempts = 0u32;
        loop {
            match self.service.resolve(address).await {
                Ok(response) => return Some(response),
                Err(e) => {
                    attempts += 1;
                    let delay = self.backoff_delay(attempts);
                    // The delay is logged on every failure, even when the
                    // attempt budget is spent and no sleep follows.
                    warn!("Address {} caused explosion: {}", address, e);
                    warn!("Retrying in {} seconds", delay.as_secs());
                    if attempts < self.max_attempts {
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!("Giving up on {} after {} attempts", address, attempts);
                        return None;
                    }
                }
            }
        }
    }
}
