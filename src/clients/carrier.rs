// ============================================================================
// Shipping Carrier Aggregator Client
// ============================================================================
//
// Talks to the multi-carrier aggregator: quoting, registering shipments,
// fetching labels, tracking and cancellation. All calls go through the
// shared retry policy and a per-provider circuit breaker.
//
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::sale::value_objects::ShipmentStatus;
use crate::utils::breaker::CircuitBreaker;
use crate::utils::retry::{retry_transient, RetryPolicy};

use super::{
    CarrierQuote, DispatchedShipment, QuoteRequest, ShipmentRequest, TrackingUpdate,
    UpstreamError,
};

const SERVICE: &str = "carrier";
const BREAKER_THRESHOLD: u32 = 5;
const BREAKER_COOL_OFF: Duration = Duration::from_secs(30);

#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// All available offers for a parcel. An empty list is a valid answer.
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<CarrierQuote>, UpstreamError>;

    /// Register a shipment with the aggregator.
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<DispatchedShipment, UpstreamError>;

    /// Label for a registered shipment. `None` while the carrier is still
    /// generating it.
    async fn label_url(&self, external_id: &str) -> Result<Option<String>, UpstreamError>;

    /// Current carrier-side state of a shipment.
    async fn track(&self, external_id: &str) -> Result<TrackingUpdate, UpstreamError>;

    /// Void a shipment that has not been delivered.
    async fn cancel_shipment(&self, external_id: &str) -> Result<(), UpstreamError>;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

#[derive(Deserialize)]
struct QuotesResponse {
    quotes: Vec<CarrierQuote>,
}

#[derive(Deserialize)]
struct LabelResponse {
    url: Option<String>,
}

#[derive(Deserialize)]
struct TrackingResponse {
    status: String,
    tracking_code: Option<String>,
}

/// Translate the aggregator's status vocabulary into ours. Unknown values
/// map to `None` so a new carrier status never breaks tracking syncs.
fn map_carrier_status(raw: &str) -> Option<ShipmentStatus> {
    match raw {
        "created" | "pending" | "handling" => Some(ShipmentStatus::Requested),
        "label_ready" | "ready_to_ship" => Some(ShipmentStatus::LabelAvailable),
        "shipped" | "in_transit" | "out_for_delivery" => Some(ShipmentStatus::InTransit),
        "delivered" => Some(ShipmentStatus::Delivered),
        "cancelled" | "canceled" => Some(ShipmentStatus::Cancelled),
        _ => None,
    }
}

pub struct HttpCarrierApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl HttpCarrierApi {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
            breaker: CircuitBreaker::new(SERVICE, BREAKER_THRESHOLD, BREAKER_COOL_OFF),
            retry: RetryPolicy::default(),
        })
    }

    /// One guarded attempt: fail fast when the circuit is open, report the
    /// outcome back to the breaker afterwards.
    async fn guarded<T>(
        &self,
        attempt: impl std::future::Future<Output = Result<T, UpstreamError>>,
    ) -> Result<T, UpstreamError> {
        if !self.breaker.permit() {
            return Err(UpstreamError::CircuitOpen { service: SERVICE });
        }
        let outcome = attempt.await;
        match &outcome {
            Ok(_) => self.breaker.on_success(),
            Err(err) if err.counts_against_breaker() => self.breaker.on_failure(),
            Err(_) => {}
        }
        outcome
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, UpstreamError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        retry_transient(&self.retry, SERVICE, || {
            let url = url.clone();
            self.guarded(async move {
                let response = self
                    .http
                    .post(url)
                    .header("x-api-key", &self.api_key)
                    .json(body)
                    .send()
                    .await
                    .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
                Self::decode(response).await
            })
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        retry_transient(&self.retry, SERVICE, || {
            let url = url.clone();
            self.guarded(async move {
                let response = self
                    .http
                    .get(url)
                    .header("x-api-key", &self.api_key)
                    .send()
                    .await
                    .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
                Self::decode(response).await
            })
        })
        .await
    }

    /// POST where only the status code matters.
    async fn post_command(&self, path: &str) -> Result<(), UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        retry_transient(&self.retry, SERVICE, || {
            let url = url.clone();
            self.guarded(async move {
                let response = self
                    .http
                    .post(url)
                    .header("x-api-key", &self.api_key)
                    .send()
                    .await
                    .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(UpstreamError::Status {
                        service: SERVICE,
                        status: status.as_u16(),
                    })
                }
            })
        })
        .await
    }
}

#[async_trait]
impl CarrierApi for HttpCarrierApi {
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<CarrierQuote>, UpstreamError> {
        let response: QuotesResponse = self.post_json("/v1/quotes", request).await?;
        Ok(response.quotes)
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<DispatchedShipment, UpstreamError> {
        self.post_json("/v1/shipments", request).await
    }

    async fn label_url(&self, external_id: &str) -> Result<Option<String>, UpstreamError> {
        let response: LabelResponse = self
            .get_json(&format!("/v1/shipments/{}/label", external_id))
            .await?;
        Ok(response.url)
    }

    async fn track(&self, external_id: &str) -> Result<TrackingUpdate, UpstreamError> {
        let response: TrackingResponse = self
            .get_json(&format!("/v1/shipments/{}/tracking", external_id))
            .await?;
        Ok(TrackingUpdate {
            status: map_carrier_status(&response.status),
            raw_status: response.status,
            tracking_code: response.tracking_code,
        })
    }

    async fn cancel_shipment(&self, external_id: &str) -> Result<(), UpstreamError> {
        self.post_command(&format!("/v1/shipments/{}/cancel", external_id))
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
