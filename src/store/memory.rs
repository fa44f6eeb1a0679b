// ============================================================================
// In-Memory Sale Store for Service Tests
// ============================================================================
//
// Mirrors the PostgreSQL store's semantics on plain maps: same validation
// gates, same all-or-nothing behavior, same idempotency rules. Service tests
// run the full workflows against this without a database.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use uuid::Uuid;

use crate::domain::catalog::ProductSnapshot;
use crate::domain::sale::aggregate::{Sale, SaleDraft, SaleLine};
use crate::domain::sale::errors::SaleError;
use crate::domain::sale::value_objects::{
    DeliveryType, PaymentMethod, SaleStatus, ShipmentStatus,
};

use super::{ApprovalOutcome, SaleStore, SettledLine, SettledSale, ShipmentAttachment};

#[derive(Default)]
struct State {
    products: HashMap<Uuid, ProductSnapshot>,
    /// account_id -> customer id
    customers: HashMap<String, Uuid>,
    sales: HashMap<Uuid, Sale>,
}

#[derive(Default)]
pub struct InMemorySaleStore {
    state: Mutex<State>,
}

impl InMemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<ProductSnapshot>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap();
            for product in products {
                state.products.insert(product.id, product);
            }
        }
        store
    }

    /// Seed a sale directly, for tests that start mid-lifecycle.
    pub fn insert_sale(&self, sale: Sale) {
        self.state.lock().unwrap().sales.insert(sale.id, sale);
    }

    pub fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        self.state
            .lock()
            .unwrap()
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    pub fn sale_count(&self) -> usize {
        self.state.lock().unwrap().sales.len()
    }
}

fn restore_stock(state: &mut State, sale: &Sale) {
    for (product_id, quantity) in sale.restorable_stock() {
        if let Some(product) = state.products.get_mut(&product_id) {
            if product.kind.tracks_stock() {
                product.stock += quantity;
            }
        }
    }
}

fn void_live_shipment(sale: &mut Sale) {
    if sale.shipment_status != ShipmentStatus::NotRequested
        && !sale.shipment_status.is_terminal()
    {
        sale.shipment_status = ShipmentStatus::Cancelled;
    }
}

#[async_trait]
impl SaleStore for InMemorySaleStore {
    async fn products(&self, ids: &[Uuid]) -> Result<Vec<ProductSnapshot>, SaleError> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn create_sale(&self, draft: &SaleDraft) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();

        // Validate every line before touching any counter so a failure
        // leaves the ledger exactly as it was.
        for line in draft.lines.iter().filter(|l| l.requires_stock()) {
            match state.products.get(&line.product_id) {
                None => return Err(SaleError::ProductNotFound(line.product_id)),
                Some(product) if product.stock < line.quantity => {
                    return Err(SaleError::InsufficientStock {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available: product.stock,
                    });
                }
                Some(_) => {}
            }
        }
        for line in draft.lines.iter().filter(|l| l.requires_stock()) {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock -= line.quantity;
            }
        }

        let customer_id = *state
            .customers
            .entry(draft.customer.account_id.clone())
            .or_insert_with(Uuid::new_v4);

        let now = Utc::now();
        let sale = Sale {
            id: draft.id,
            customer_id,
            customer_email: draft.customer.email.clone(),
            customer_name: draft.customer.full_name.clone(),
            status: SaleStatus::PendingPayment,
            payment_method: draft.payment_method,
            delivery_type: draft.delivery_type,
            address: draft.address.clone(),
            shipping_cost: draft.shipping_cost,
            total_amount: draft.total_amount,
            checkout_url: draft.checkout_url.clone(),
            receipt_ref: None,
            shipment_status: ShipmentStatus::NotRequested,
            external_shipment_id: None,
            tracking_code: None,
            label_url: None,
            carrier: None,
            created_at: now,
            updated_at: now,
            lines: draft
                .lines
                .iter()
                .map(|l| SaleLine {
                    id: l.id,
                    product_id: l.product_id,
                    description: l.description.clone(),
                    category: l.category.clone(),
                    product_kind: l.product_kind,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    custom_price: l.custom_price,
                    custom_description: l.custom_description.clone(),
                    subtotal: l.subtotal,
                })
                .collect(),
        };
        state.sales.insert(sale.id, sale.clone());
        Ok(sale)
    }

    async fn sale(&self, id: Uuid) -> Result<Sale, SaleError> {
        self.state
            .lock()
            .unwrap()
            .sales
            .get(&id)
            .cloned()
            .ok_or(SaleError::SaleNotFound(id))
    }

    async fn approve_and_reprice(
        &self,
        id: Uuid,
        settled_method: Option<PaymentMethod>,
        receipt_ref: Option<String>,
    ) -> Result<ApprovalOutcome, SaleError> {
        let mut state = self.state.lock().unwrap();
        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(SaleError::SaleNotFound(id))?;

        if sale.status.is_settled() {
            return Ok(ApprovalOutcome::AlreadyApproved(sale.clone()));
        }
        if !sale.status.can_transition(SaleStatus::Approved) {
            return Err(SaleError::InvalidTransition {
                from: sale.status,
                to: SaleStatus::Approved,
            });
        }

        let method = settled_method.unwrap_or(sale.payment_method);
        sale.reprice(method);
        sale.status = SaleStatus::Approved;
        if receipt_ref.is_some() {
            sale.receipt_ref = receipt_ref;
        }
        sale.updated_at = Utc::now();
        Ok(ApprovalOutcome::Applied(sale.clone()))
    }

    async fn transition_status(&self, id: Uuid, to: SaleStatus) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();
        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(SaleError::SaleNotFound(id))?;

        if sale.status == to {
            return Ok(sale.clone());
        }
        if !sale.status.can_transition(to) {
            return Err(SaleError::InvalidTransition {
                from: sale.status,
                to,
            });
        }
        sale.status = to;
        sale.updated_at = Utc::now();
        Ok(sale.clone())
    }

    async fn change_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
        checkout_url: Option<String>,
    ) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();
        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(SaleError::SaleNotFound(id))?;

        if !matches!(
            sale.status,
            SaleStatus::PendingPayment | SaleStatus::PendingApproval
        ) {
            return Err(SaleError::MethodChangeLocked(sale.status));
        }
        if sale.payment_method != method {
            sale.reprice(method);
            sale.updated_at = Utc::now();
        }
        if checkout_url.is_some() {
            sale.checkout_url = checkout_url;
        }
        Ok(sale.clone())
    }

    async fn cancel_sale(&self, id: Uuid) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();
        let mut sale = state
            .sales
            .get(&id)
            .cloned()
            .ok_or(SaleError::SaleNotFound(id))?;

        if sale.status == SaleStatus::Cancelled {
            return Err(SaleError::AlreadyCancelled);
        }
        if !sale.status.can_transition(SaleStatus::Cancelled) {
            return Err(SaleError::InvalidTransition {
                from: sale.status,
                to: SaleStatus::Cancelled,
            });
        }

        restore_stock(&mut state, &sale);
        sale.status = SaleStatus::Cancelled;
        void_live_shipment(&mut sale);
        sale.updated_at = Utc::now();
        state.sales.insert(id, sale.clone());
        Ok(sale)
    }

    async fn reject_sale(&self, id: Uuid) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();
        let mut sale = state
            .sales
            .get(&id)
            .cloned()
            .ok_or(SaleError::SaleNotFound(id))?;

        if sale.status == SaleStatus::Rejected {
            return Ok(sale);
        }
        if !sale.status.can_transition(SaleStatus::Rejected) {
            return Err(SaleError::InvalidTransition {
                from: sale.status,
                to: SaleStatus::Rejected,
            });
        }

        restore_stock(&mut state, &sale);
        sale.status = SaleStatus::Rejected;
        void_live_shipment(&mut sale);
        sale.updated_at = Utc::now();
        state.sales.insert(id, sale.clone());
        Ok(sale)
    }

    async fn attach_shipment(
        &self,
        id: Uuid,
        attachment: &ShipmentAttachment,
    ) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();
        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(SaleError::SaleNotFound(id))?;

        if sale.delivery_type != DeliveryType::Ship {
            return Err(SaleError::WrongDeliveryType(sale.delivery_type));
        }
        if sale.shipment_status != ShipmentStatus::NotRequested {
            return Err(SaleError::ShipmentAlreadyRequested);
        }
        if sale.status != SaleStatus::Approved {
            return Err(SaleError::NotReadyToShip(sale.status));
        }

        sale.shipment_status = ShipmentStatus::Requested;
        sale.external_shipment_id = Some(attachment.external_id.clone());
        sale.carrier = Some(attachment.carrier.clone());
        sale.tracking_code = attachment.tracking_code.clone();
        sale.updated_at = Utc::now();
        Ok(sale.clone())
    }

    async fn cache_label_url(&self, id: Uuid, url: &str) -> Result<(), SaleError> {
        let mut state = self.state.lock().unwrap();
        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(SaleError::SaleNotFound(id))?;
        sale.label_url = Some(url.to_string());
        sale.updated_at = Utc::now();
        Ok(())
    }

    async fn update_shipment_status(
        &self,
        id: Uuid,
        to: ShipmentStatus,
        tracking_code: Option<&str>,
    ) -> Result<Sale, SaleError> {
        let mut state = self.state.lock().unwrap();
        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(SaleError::SaleNotFound(id))?;

        if sale.shipment_status == to {
            return Ok(sale.clone());
        }
        if !sale.shipment_status.can_transition(to) {
            return Err(SaleError::InvalidShipmentTransition {
                from: sale.shipment_status,
                to,
            });
        }

        let new_sale_status = match to.implied_sale_status() {
            Some(SaleStatus::Shipped) if sale.status == SaleStatus::Approved => {
                Some(SaleStatus::Shipped)
            }
            Some(SaleStatus::Delivered)
                if matches!(sale.status, SaleStatus::Approved | SaleStatus::Shipped) =>
            {
                Some(SaleStatus::Delivered)
            }
            _ => None,
        };

        sale.shipment_status = to;
        if let Some(status) = new_sale_status {
            sale.status = status;
        }
        if let Some(code) = tracking_code {
            sale.tracking_code = Some(code.to_string());
        }
        sale.updated_at = Utc::now();
        Ok(sale.clone())
    }

    async fn settled_sales(&self, year: i32) -> Result<Vec<SettledSale>, SaleError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sales
            .values()
            .filter(|sale| sale.status.is_settled() && sale.created_at.year() == year)
            .map(|sale| SettledSale {
                created_at: sale.created_at,
                shipping_cost: sale.shipping_cost,
                lines: sale
                    .lines
                    .iter()
                    .map(|line| SettledLine {
                        category: line.category.clone(),
                        product_kind: line.product_kind,
                        subtotal: line.subtotal,
                    })
                    .collect(),
            })
            .collect())
    }
}
