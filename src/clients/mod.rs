// ============================================================================
// External Provider Clients
// ============================================================================
//
// Thin HTTP clients for the three providers the engine talks to: the
// shipping carrier aggregator, the card payment gateway, and the customer
// notification service. Each one sits behind a trait so the services are
// testable without the network, and each HTTP impl wraps its calls in a
// retry policy and a circuit breaker.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::sale::errors::SaleError;
use crate::domain::sale::value_objects::{Address, PaymentMethod, ShipmentStatus};
use crate::utils::retry::Transient;

pub mod carrier;
pub mod gateway;
pub mod notifier;

#[cfg(test)]
pub mod mock;

pub use carrier::{CarrierApi, HttpCarrierApi};
pub use gateway::{HttpPaymentGatewayApi, PaymentGatewayApi};
pub use notifier::{HttpNotifier, Notifier};

// ============================================================================
// Upstream Error
// ============================================================================

/// Failure talking to an external provider.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    #[error("{service} transport failure: {detail}")]
    Transport { service: &'static str, detail: String },

    #[error("{service} answered status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} answered an undecodable body: {detail}")]
    Decode { service: &'static str, detail: String },

    #[error("{service} circuit is open, failing fast")]
    CircuitOpen { service: &'static str },
}

impl UpstreamError {
    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { service }
            | UpstreamError::Transport { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. }
            | UpstreamError::CircuitOpen { service } => service,
        }
    }

    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout { service }
        } else if err.is_decode() {
            UpstreamError::Decode {
                service,
                detail: err.to_string(),
            }
        } else {
            UpstreamError::Transport {
                service,
                detail: err.to_string(),
            }
        }
    }

    /// Whether this failure should count towards opening the provider's
    /// circuit. Definitive answers (4xx, bad bodies) do not.
    pub fn counts_against_breaker(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } | UpstreamError::Transport { .. } => true,
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::Decode { .. } | UpstreamError::CircuitOpen { .. } => false,
        }
    }
}

impl Transient for UpstreamError {
    fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } | UpstreamError::Transport { .. } => true,
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::Decode { .. } | UpstreamError::CircuitOpen { .. } => false,
        }
    }
}

impl From<UpstreamError> for SaleError {
    fn from(err: UpstreamError) -> Self {
        SaleError::Upstream {
            service: err.service(),
            detail: err.to_string(),
        }
    }
}

// ============================================================================
// Carrier DTOs
// ============================================================================

/// Destination and parcel details sent to the carrier aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    pub zip_code: String,
    pub total_weight_grams: i64,
    /// Declared parcel value in cents, used by carriers for insurance.
    pub declared_value: i64,
}

/// One carrier's offer for a parcel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarrierQuote {
    pub carrier: String,
    /// Untaxed price in cents.
    pub cost: i64,
    pub business_days: Option<i32>,
    /// Offers the aggregator marks as not purchasable. Absent means
    /// selectable.
    pub selectable: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRequest {
    pub reference: Uuid,
    pub recipient_name: String,
    pub recipient_email: String,
    pub address: Address,
    pub total_weight_grams: i64,
    pub declared_value: i64,
}

/// What the carrier hands back once a shipment is registered.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchedShipment {
    pub external_id: String,
    pub carrier: String,
    pub tracking_code: Option<String>,
}

/// Latest carrier state for a shipment. `status` is `None` when the carrier
/// reports something outside our vocabulary; callers log `raw_status` and
/// leave the shipment alone.
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub status: Option<ShipmentStatus>,
    pub raw_status: String,
    pub tracking_code: Option<String>,
}

// ============================================================================
// Gateway DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutItem {
    pub description: String,
    pub quantity: i32,
    /// Per-unit amount in cents.
    pub unit_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    /// Our sale id, echoed back by the gateway as the external reference.
    pub reference: Uuid,
    pub customer_email: String,
    pub items: Vec<CheckoutItem>,
    /// Shipping charge in cents, zero for pickups.
    pub shipping_amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// Settlement state of a gateway payment, collapsed from the provider's
/// richer vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Pending,
    Rejected,
    /// Anything we do not act on (refunds, chargebacks). Kept verbatim for
    /// logging.
    Other(String),
}

/// Authoritative payment record fetched from the gateway by id.
#[derive(Debug, Clone)]
pub struct PaymentInfo {
    pub id: String,
    pub status: PaymentStatus,
    /// Our sale id, if the gateway echoed it back.
    pub external_reference: Option<Uuid>,
    /// Payment method the customer actually settled with, when mappable.
    pub settled_method: Option<PaymentMethod>,
    pub receipt_ref: Option<String>,
}

// ============================================================================
// Notifier DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalNotice {
    pub sale_id: Uuid,
    pub email: String,
    /// Final charged total in cents.
    pub total_amount: i64,
    pub receipt_ref: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
