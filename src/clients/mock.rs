// ============================================================================
// Provider Mocks for Service Tests
// ============================================================================
//
// Scriptable in-memory stand-ins for the external providers. Each mock
// records what it was asked so tests can assert on the traffic, and exposes
// its next response through a Mutex so tests can script failures.
//
// ============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::sale::value_objects::ShipmentStatus;

use super::carrier::CarrierApi;
use super::gateway::PaymentGatewayApi;
use super::notifier::Notifier;
use super::{
    ApprovalNotice, CarrierQuote, CheckoutRequest, CheckoutSession, DispatchedShipment,
    PaymentInfo, PaymentStatus, QuoteRequest, ShipmentRequest, TrackingUpdate, UpstreamError,
};

fn clone_result<T: Clone>(slot: &Mutex<Result<T, UpstreamError>>) -> Result<T, UpstreamError> {
    slot.lock().unwrap().clone()
}

// ============================================================================
// Carrier
// ============================================================================

pub struct MockCarrier {
    pub quotes_result: Mutex<Result<Vec<CarrierQuote>, UpstreamError>>,
    pub create_result: Mutex<Result<DispatchedShipment, UpstreamError>>,
    pub label_result: Mutex<Result<Option<String>, UpstreamError>>,
    pub track_result: Mutex<Result<TrackingUpdate, UpstreamError>>,
    pub cancel_result: Mutex<Result<(), UpstreamError>>,
    pub quote_requests: Mutex<Vec<QuoteRequest>>,
    pub created: Mutex<Vec<ShipmentRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    pub label_calls: AtomicU32,
}

impl MockCarrier {
    pub fn new() -> Self {
        Self {
            quotes_result: Mutex::new(Ok(vec![])),
            create_result: Mutex::new(Ok(DispatchedShipment {
                external_id: "shp_1".to_string(),
                carrier: "roadrunner".to_string(),
                tracking_code: Some("RR123".to_string()),
            })),
            label_result: Mutex::new(Ok(Some("https://labels.test/shp_1.pdf".to_string()))),
            track_result: Mutex::new(Ok(TrackingUpdate {
                status: Some(ShipmentStatus::InTransit),
                raw_status: "in_transit".to_string(),
                tracking_code: Some("RR123".to_string()),
            })),
            cancel_result: Mutex::new(Ok(())),
            quote_requests: Mutex::new(vec![]),
            created: Mutex::new(vec![]),
            cancelled: Mutex::new(vec![]),
            label_calls: AtomicU32::new(0),
        }
    }

    pub fn set_quotes(&self, quotes: Vec<CarrierQuote>) {
        *self.quotes_result.lock().unwrap() = Ok(quotes);
    }

    pub fn fail_quotes(&self) {
        *self.quotes_result.lock().unwrap() = Err(UpstreamError::Timeout { service: "carrier" });
    }
}

pub fn quote(carrier: &str, cost: i64) -> CarrierQuote {
    CarrierQuote {
        carrier: carrier.to_string(),
        cost,
        business_days: Some(3),
        selectable: None,
    }
}

#[async_trait]
impl CarrierApi for MockCarrier {
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<CarrierQuote>, UpstreamError> {
        self.quote_requests.lock().unwrap().push(request.clone());
        clone_result(&self.quotes_result)
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<DispatchedShipment, UpstreamError> {
        self.created.lock().unwrap().push(request.clone());
        clone_result(&self.create_result)
    }

    async fn label_url(&self, _external_id: &str) -> Result<Option<String>, UpstreamError> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        clone_result(&self.label_result)
    }

    async fn track(&self, _external_id: &str) -> Result<TrackingUpdate, UpstreamError> {
        clone_result(&self.track_result)
    }

    async fn cancel_shipment(&self, external_id: &str) -> Result<(), UpstreamError> {
        self.cancelled.lock().unwrap().push(external_id.to_string());
        clone_result(&self.cancel_result)
    }
}

// ============================================================================
// Gateway
// ============================================================================

pub struct MockGateway {
    pub checkout_result: Mutex<Result<CheckoutSession, UpstreamError>>,
    pub payment_result: Mutex<Result<PaymentInfo, UpstreamError>>,
    pub checkout_requests: Mutex<Vec<CheckoutRequest>>,
    pub fetched_ids: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            checkout_result: Mutex::new(Ok(CheckoutSession {
                session_id: "sess_1".to_string(),
                checkout_url: "https://gateway.test/pay/sess_1".to_string(),
            })),
            payment_result: Mutex::new(Err(UpstreamError::Status {
                service: "gateway",
                status: 404,
            })),
            checkout_requests: Mutex::new(vec![]),
            fetched_ids: Mutex::new(vec![]),
        }
    }

    pub fn set_payment(&self, info: PaymentInfo) {
        *self.payment_result.lock().unwrap() = Ok(info);
    }

    pub fn fail_checkout(&self) {
        *self.checkout_result.lock().unwrap() =
            Err(UpstreamError::Timeout { service: "gateway" });
    }
}

pub fn approved_payment(sale_id: Uuid) -> PaymentInfo {
    PaymentInfo {
        id: "pay_1".to_string(),
        status: PaymentStatus::Approved,
        external_reference: Some(sale_id),
        settled_method: Some(crate::domain::sale::value_objects::PaymentMethod::CardGateway),
        receipt_ref: Some("receipt-001".to_string()),
    }
}

#[async_trait]
impl PaymentGatewayApi for MockGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, UpstreamError> {
        self.checkout_requests.lock().unwrap().push(request.clone());
        clone_result(&self.checkout_result)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentInfo, UpstreamError> {
        self.fetched_ids.lock().unwrap().push(payment_id.to_string());
        clone_result(&self.payment_result)
    }
}

// ============================================================================
// Notifier
// ============================================================================

pub struct MockNotifier {
    pub notices: Mutex<Vec<ApprovalNotice>>,
    pub fail: Mutex<bool>,
    /// Signalled after every call, so tests can await a detached
    /// notification deterministically.
    pub delivered: Notify,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            notices: Mutex::new(vec![]),
            fail: Mutex::new(false),
            delivered: Notify::new(),
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn sale_approved(&self, notice: &ApprovalNotice) -> Result<(), UpstreamError> {
        let failing = *self.fail.lock().unwrap();
        if !failing {
            self.notices.lock().unwrap().push(notice.clone());
        }
        self.delivered.notify_one();
        if failing {
            Err(UpstreamError::Timeout { service: "notifier" })
        } else {
            Ok(())
        }
    }
}
