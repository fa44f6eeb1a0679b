// ============================================================================
// Card Payment Gateway Client
// ============================================================================
//
// Creates hosted checkout sessions and fetches authoritative payment
// records. Webhooks only carry a payment id; the record fetched here is the
// source of truth for settlement status and the method the customer
// actually paid with.
//
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::sale::value_objects::PaymentMethod;
use crate::utils::breaker::CircuitBreaker;
use crate::utils::retry::{retry_transient, RetryPolicy};

use super::{CheckoutRequest, CheckoutSession, PaymentInfo, PaymentStatus, UpstreamError};

const SERVICE: &str = "gateway";
const BREAKER_THRESHOLD: u32 = 5;
const BREAKER_COOL_OFF: Duration = Duration::from_secs(30);

#[async_trait]
pub trait PaymentGatewayApi: Send + Sync {
    /// Open a hosted checkout session for a card-gateway sale.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, UpstreamError>;

    /// Fetch the authoritative payment record by gateway payment id.
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentInfo, UpstreamError>;
}

// ============================================================================
// Status and Method Mapping
// ============================================================================

fn map_gateway_status(raw: &str) -> PaymentStatus {
    match raw {
        "approved" => PaymentStatus::Approved,
        "pending" | "in_process" | "in_mediation" => PaymentStatus::Pending,
        "rejected" | "cancelled" => PaymentStatus::Rejected,
        other => PaymentStatus::Other(other.to_string()),
    }
}

/// Payment types the gateway reports, mapped onto our closed enum. Unknown
/// types return `None` and the sale keeps its stored method.
fn map_gateway_method(raw: &str) -> Option<PaymentMethod> {
    match raw {
        "credit_card" | "debit_card" | "prepaid_card" => Some(PaymentMethod::CardGateway),
        "bank_transfer" | "account_money" => Some(PaymentMethod::Transfer),
        "ticket" | "atm" | "cash" => Some(PaymentMethod::Cash),
        _ => None,
    }
}

// ============================================================================
// HTTP Implementation
// ============================================================================

#[derive(Deserialize)]
struct PaymentResponse {
    id: String,
    status: String,
    payment_type: Option<String>,
    external_reference: Option<String>,
    receipt_number: Option<String>,
}

pub struct HttpPaymentGatewayApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl HttpPaymentGatewayApi {
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
                    .bearer_auth(&self.api_key)
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
                    .bearer_auth(&self.api_key)
                    .send()
                    .await
                    .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
                Self::decode(response).await
            })
        })
        .await
    }
}

#[async_trait]
impl PaymentGatewayApi for HttpPaymentGatewayApi {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, UpstreamError> {
        self.post_json("/v1/checkout-sessions", request).await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentInfo, UpstreamError> {
        let response: PaymentResponse = self
            .get_json(&format!("/v1/payments/{}", payment_id))
            .await?;

        let external_reference = response
            .external_reference
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok());

        Ok(PaymentInfo {
            id: response.id,
            status: map_gateway_status(&response.status),
            external_reference,
            settled_method: response
                .payment_type
                .as_deref()
                .and_then(map_gateway_method),
            receipt_ref: response.receipt_number,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_gateway_status("approved"), PaymentStatus::Approved);
        assert_eq!(map_gateway_status("pending"), PaymentStatus::Pending);
        assert_eq!(map_gateway_status("in_process"), PaymentStatus::Pending);
        assert_eq!(map_gateway_status("rejected"), PaymentStatus::Rejected);
        assert_eq!(map_gateway_status("cancelled"), PaymentStatus::Rejected);
        assert_eq!(
            map_gateway_status("charged_back"),
            PaymentStatus::Other("charged_back".to_string())
        );
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(
            map_gateway_method("credit_card"),
            Some(PaymentMethod::CardGateway)
        );
        assert_eq!(
            map_gateway_method("debit_card"),
            Some(PaymentMethod::CardGateway)
        );
        assert_eq!(
            map_gateway_method("bank_transfer"),
            Some(PaymentMethod::Transfer)
        );
        assert_eq!(map_gateway_method("ticket"), Some(PaymentMethod::Cash));
        assert_eq!(map_gateway_method("crypto"), None);
    }
}
