// ============================================================================
// Persistence Layer
// ============================================================================
//
// The `SaleStore` trait is the transactional boundary of the engine. Every
// method is one atomic unit of work: either the whole state change lands
// (sale row, lines, stock counters, customer upsert) or none of it does.
// Services compose these units with the external providers but never manage
// transactions themselves.
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::catalog::{ProductKind, ProductSnapshot};
use crate::domain::sale::aggregate::{Sale, SaleDraft};
use crate::domain::sale::errors::SaleError;
use crate::domain::sale::value_objects::{PaymentMethod, SaleStatus, ShipmentStatus};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgSaleStore;

/// Carrier handles to attach when a shipment is registered.
#[derive(Debug, Clone)]
pub struct ShipmentAttachment {
    pub external_id: String,
    pub carrier: String,
    pub tracking_code: Option<String>,
}

/// Outcome of applying an approved payment to a sale.
#[derive(Debug)]
pub enum ApprovalOutcome {
    /// The sale was transitioned and repriced in this call.
    Applied(Sale),
    /// The sale had already settled. Duplicate webhook deliveries land
    /// here and must stay side-effect free.
    AlreadyApproved(Sale),
}

/// One settled sale, trimmed to what the balance aggregator needs.
#[derive(Debug, Clone)]
pub struct SettledSale {
    pub created_at: DateTime<Utc>,
    pub shipping_cost: i64,
    pub lines: Vec<SettledLine>,
}

#[derive(Debug, Clone)]
pub struct SettledLine {
    pub category: String,
    pub product_kind: ProductKind,
    pub subtotal: i64,
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Batch snapshot fetch. Missing ids are simply absent from the result;
    /// callers decide whether that is an error.
    async fn products(&self, ids: &[Uuid]) -> Result<Vec<ProductSnapshot>, SaleError>;

    /// Persist a new sale: upsert the customer, decrement stock for every
    /// physical line, write the sale and its lines. All or nothing; an
    /// insufficient counter rolls the whole sale back.
    async fn create_sale(&self, draft: &SaleDraft) -> Result<Sale, SaleError>;

    async fn sale(&self, id: Uuid) -> Result<Sale, SaleError>;

    /// Settle an approved payment: transition to APPROVED, reprice against
    /// the method the customer actually paid with, store the receipt
    /// reference. Idempotent for already-settled sales.
    async fn approve_and_reprice(
        &self,
        id: Uuid,
        settled_method: Option<PaymentMethod>,
        receipt_ref: Option<String>,
    ) -> Result<ApprovalOutcome, SaleError>;

    /// Move a sale along its lifecycle. A transition to the current status
    /// is a no-op so webhook redeliveries stay harmless.
    async fn transition_status(&self, id: Uuid, to: SaleStatus) -> Result<Sale, SaleError>;

    /// Recompute the whole sale for a new payment method. Only legal while
    /// payment is still pending. A fresh checkout URL replaces the stored
    /// one when given.
    async fn change_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
        checkout_url: Option<String>,
    ) -> Result<Sale, SaleError>;

    /// Cancel a sale and hand its stock back in the same transaction.
    async fn cancel_sale(&self, id: Uuid) -> Result<Sale, SaleError>;

    /// Mark a sale REJECTED after a failed payment and hand its stock back.
    /// Idempotent if the sale is already rejected.
    async fn reject_sale(&self, id: Uuid) -> Result<Sale, SaleError>;

    /// Record carrier handles for a freshly registered shipment and move it
    /// to REQUESTED. Fails if a shipment was already attached.
    async fn attach_shipment(
        &self,
        id: Uuid,
        attachment: &ShipmentAttachment,
    ) -> Result<Sale, SaleError>;

    /// Remember a fetched label so later reads skip the carrier.
    async fn cache_label_url(&self, id: Uuid, url: &str) -> Result<(), SaleError>;

    /// Apply a carrier-reported shipment status. Repeats of the current
    /// status are no-ops; sale status is pulled along when the carrier has
    /// outrun it.
    async fn update_shipment_status(
        &self,
        id: Uuid,
        to: ShipmentStatus,
        tracking_code: Option<&str>,
    ) -> Result<Sale, SaleError>;

    /// Every settled sale created in the given calendar year (UTC).
    async fn settled_sales(&self, year: i32) -> Result<Vec<SettledSale>, SaleError>;
}
