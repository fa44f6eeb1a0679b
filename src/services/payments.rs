// ============================================================================
// Payment Gateway Webhook Processing
// ============================================================================
//
// Gateway notifications are thin and unauthenticated by content: they only
// say "something happened to payment X". The sale is never touched on the
// notification's word alone; the authoritative payment record is re-fetched
// from the gateway and the sale moves based on that.
//
// The gateway redelivers until it sees a 2xx, so every path here is safe to
// replay. Events that cannot possibly be acted on are acknowledged rather
// than errored, otherwise the gateway would retry them forever.
//
// ============================================================================

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::clients::{ApprovalNotice, Notifier, PaymentGatewayApi, PaymentStatus};
use crate::domain::sale::aggregate::Sale;
use crate::domain::sale::errors::SaleError;
use crate::domain::sale::value_objects::SaleStatus;
use crate::store::{ApprovalOutcome, SaleStore};

type HmacSha256 = Hmac<Sha256>;

/// Check a hex-encoded HMAC-SHA256 signature over the raw request body.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(tag) = decode_hex(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&tag).is_ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
pub fn signature_for(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("{:x}", mac.finalize().into_bytes())
}

/// The gateway's notification body. Only the payment id matters; everything
/// else about the payment is re-fetched.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub action: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub id: PaymentId,
}

/// The gateway has sent payment ids both as JSON strings and as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PaymentId {
    Text(String),
    Number(i64),
}

impl PaymentId {
    fn as_string(&self) -> String {
        match self {
            PaymentId::Text(s) => s.clone(),
            PaymentId::Number(n) => n.to_string(),
        }
    }
}

pub struct PaymentService {
    store: Arc<dyn SaleStore>,
    gateway: Arc<dyn PaymentGatewayApi>,
    notifier: Arc<dyn Notifier>,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn SaleStore>,
        gateway: Arc<dyn PaymentGatewayApi>,
        notifier: Arc<dyn Notifier>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            webhook_secret: webhook_secret.into(),
        }
    }

    pub async fn handle_webhook(
        &self,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<(), SaleError> {
        let provided = signature.ok_or(SaleError::InvalidSignature)?;
        if !verify_signature(&self.webhook_secret, raw_body, provided) {
            return Err(SaleError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|err| SaleError::Validation(format!("malformed webhook payload: {err}")))?;
        if !event.action.is_empty() && !event.action.starts_with("payment") {
            tracing::debug!(action = %event.action, "ignoring non-payment webhook");
            return Ok(());
        }

        let payment_id = event.data.id.as_string();
        let payment = self.gateway.fetch_payment(&payment_id).await?;
        let Some(sale_id) = payment.external_reference else {
            tracing::warn!(payment_id = %payment.id, "payment carries no sale reference");
            return Ok(());
        };

        match payment.status {
            PaymentStatus::Approved => {
                let outcome = self
                    .store
                    .approve_and_reprice(sale_id, payment.settled_method, payment.receipt_ref)
                    .await?;
                match outcome {
                    ApprovalOutcome::Applied(sale) => {
                        tracing::info!(
                            sale_id = %sale.id,
                            payment_id = %payment.id,
                            total_amount = sale.total_amount,
                            "payment approved"
                        );
                        self.notify_detached(&sale);
                    }
                    ApprovalOutcome::AlreadyApproved(_) => {
                        tracing::debug!(
                            sale_id = %sale_id,
                            payment_id = %payment.id,
                            "approval already applied, acknowledging redelivery"
                        );
                    }
                }
                Ok(())
            }
            PaymentStatus::Pending => {
                match self
                    .store
                    .transition_status(sale_id, SaleStatus::PendingApproval)
                    .await
                {
                    Ok(_) => Ok(()),
                    // A pending event delivered after the approval landed.
                    Err(SaleError::InvalidTransition { from, .. }) => {
                        tracing::debug!(
                            sale_id = %sale_id,
                            status = %from,
                            "stale pending event, acknowledging"
                        );
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            PaymentStatus::Rejected => match self.store.reject_sale(sale_id).await {
                Ok(sale) => {
                    tracing::info!(
                        sale_id = %sale.id,
                        payment_id = %payment.id,
                        "payment rejected, sale closed"
                    );
                    Ok(())
                }
                // The sale already reached a terminal state some other way.
                Err(SaleError::InvalidTransition { from, .. }) => {
                    tracing::warn!(
                        sale_id = %sale_id,
                        status = %from,
                        "rejection for a closed sale, acknowledging"
                    );
                    Ok(())
                }
                Err(err) => Err(err),
            },
            PaymentStatus::Other(raw) => {
                tracing::info!(
                    payment_id = %payment.id,
                    status = %raw,
                    "unhandled payment status, acknowledging"
                );
                Ok(())
            }
        }
    }

    /// Fire the approval notification without holding up the webhook ack.
    /// Delivery is best-effort; a failure is logged and not retried here
    /// (the notifier client already retries transient faults).
    fn notify_detached(&self, sale: &Sale) {
        let notifier = self.notifier.clone();
        let notice = ApprovalNotice {
            sale_id: sale.id,
            email: sale.customer_email.clone(),
            total_amount: sale.total_amount,
            receipt_ref: sale.receipt_ref.clone(),
        };
        tokio::spawn(async move {
            if let Err(err) = notifier.sale_approved(&notice).await {
                tracing::warn!(
                    sale_id = %notice.sale_id,
                    error = %err,
                    "approval notification failed"
                );
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
