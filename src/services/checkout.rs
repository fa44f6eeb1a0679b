// ============================================================================
// Checkout Workflow
// ============================================================================
//
// Sale creation, payment-method changes and cancellation. The ordering
// discipline here matters: everything fallible that talks to the network
// (quotes, gateway sessions) happens before the single atomic store call,
// so a failed provider never leaves a half-written sale behind.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::clients::{
    CarrierApi, CheckoutItem, CheckoutRequest, PaymentGatewayApi, QuoteRequest,
};
use crate::domain::sale::aggregate::{CustomerDetails, LineDraft, Sale, SaleDraft};
use crate::domain::sale::errors::SaleError;
use crate::domain::sale::pricing;
use crate::domain::sale::value_objects::{
    Address, DeliveryType, PaymentMethod, SaleStatus, ShipmentStatus,
};
use crate::store::SaleStore;

use super::quotes::{QuotePolicy, QuoteService};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Operator-fixed per-unit price in cents. Bypasses all discounts.
    pub custom_price: Option<i64>,
    /// Operator-supplied display text replacing the catalog name.
    pub custom_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub customer: CustomerDetails,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub address: Address,
    pub lines: Vec<RequestLine>,
}

pub struct CheckoutService {
    store: Arc<dyn SaleStore>,
    gateway: Arc<dyn PaymentGatewayApi>,
    carrier: Arc<dyn CarrierApi>,
    quotes: QuoteService,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn SaleStore>,
        gateway: Arc<dyn PaymentGatewayApi>,
        carrier: Arc<dyn CarrierApi>,
        quote_policy: QuotePolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            quotes: QuoteService::new(carrier.clone(), quote_policy),
            carrier,
        }
    }

    pub async fn create(&self, request: CreateSaleRequest) -> Result<Sale, SaleError> {
        validate(&request)?;
        let sale_id = Uuid::now_v7();

        // Batch snapshot fetch, one round trip for the whole cart.
        let mut ids: Vec<Uuid> = request.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        let snapshots = self.store.products(&ids).await?;
        let by_id: HashMap<Uuid, _> = snapshots.into_iter().map(|s| (s.id, s)).collect();
        for id in &ids {
            if !by_id.contains_key(id) {
                return Err(SaleError::ProductNotFound(*id));
            }
        }

        // Friendly availability pre-check across the whole cart; the store's
        // conditional decrement is what holds under concurrency.
        let mut needed: HashMap<Uuid, i32> = HashMap::new();
        for line in &request.lines {
            *needed.entry(line.product_id).or_insert(0) += line.quantity;
        }
        for (product_id, quantity) in &needed {
            let snapshot = &by_id[product_id];
            if !snapshot.can_fulfill(*quantity) {
                return Err(SaleError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                    available: snapshot.stock,
                });
            }
        }

        let lines: Vec<LineDraft> = request
            .lines
            .iter()
            .map(|line| {
                // Blank overrides count as absent.
                let custom_description = line
                    .custom_description
                    .clone()
                    .filter(|d| !d.trim().is_empty());
                LineDraft::build(
                    &by_id[&line.product_id],
                    line.quantity,
                    line.custom_price,
                    custom_description,
                    request.payment_method,
                )
            })
            .collect();
        let lines_total: i64 = lines.iter().map(|l| l.subtotal).sum();

        let shipping_cost = match request.delivery_type {
            DeliveryType::Pickup => 0,
            DeliveryType::Ship => {
                // Without a destination there is nothing to quote; the flat
                // fee applies and the address gets checked again at dispatch.
                let zip_code = request
                    .address
                    .zip_code
                    .clone()
                    .filter(|z| !z.trim().is_empty());
                let selected = match zip_code {
                    Some(zip_code) => {
                        // i64 so bulk quantities cannot wrap the i32 weights.
                        let total_weight_grams: i64 = request
                            .lines
                            .iter()
                            .map(|l| {
                                i64::from(by_id[&l.product_id].weight_grams)
                                    * i64::from(l.quantity)
                            })
                            .sum();
                        self.quotes
                            .select(&QuoteRequest {
                                zip_code,
                                total_weight_grams,
                                declared_value: lines_total,
                            })
                            .await
                    }
                    None => {
                        tracing::warn!(
                            sale_id = %sale_id,
                            "shipped sale without a destination zip, using fallback fee"
                        );
                        self.quotes.fallback()
                    }
                };
                pricing::taxed_shipping(selected.base_cost)
            }
        };
        let total_amount = lines_total + shipping_cost;

        // A gateway sale is useless without its checkout session, so a
        // session failure aborts before anything is written.
        let checkout_url = if request.payment_method == PaymentMethod::CardGateway {
            let session = self
                .gateway
                .create_checkout(&CheckoutRequest {
                    reference: sale_id,
                    customer_email: request.customer.email.clone(),
                    items: checkout_items(&lines),
                    shipping_amount: shipping_cost,
                })
                .await?;
            Some(session.checkout_url)
        } else {
            None
        };

        let draft = SaleDraft {
            id: sale_id,
            customer: request.customer,
            payment_method: request.payment_method,
            delivery_type: request.delivery_type,
            address: request.address,
            shipping_cost,
            total_amount,
            checkout_url,
            lines,
        };
        let sale = self.store.create_sale(&draft).await?;

        tracing::info!(
            sale_id = %sale.id,
            payment_method = %sale.payment_method,
            delivery_type = %sale.delivery_type,
            total_amount = sale.total_amount,
            "sale created"
        );
        Ok(sale)
    }

    pub async fn sale(&self, id: Uuid) -> Result<Sale, SaleError> {
        self.store.sale(id).await
    }

    /// Switch payment method and recompute every figure from the stored
    /// catalog snapshots. Moving onto the card gateway opens a fresh
    /// checkout session first.
    pub async fn change_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
    ) -> Result<Sale, SaleError> {
        let checkout_url = if method == PaymentMethod::CardGateway {
            let sale = self.store.sale(id).await?;
            if !matches!(
                sale.status,
                SaleStatus::PendingPayment | SaleStatus::PendingApproval
            ) {
                return Err(SaleError::MethodChangeLocked(sale.status));
            }
            if sale.payment_method == PaymentMethod::CardGateway {
                None
            } else {
                // Price the session at what the sale will cost under the
                // gateway, not at the currently discounted figures.
                let mut preview = sale.clone();
                preview.reprice(PaymentMethod::CardGateway);
                let session = self
                    .gateway
                    .create_checkout(&CheckoutRequest {
                        reference: id,
                        customer_email: preview.customer_email.clone(),
                        items: preview
                            .lines
                            .iter()
                            .map(|l| CheckoutItem {
                                description: l.display_description().to_string(),
                                quantity: l.quantity,
                                unit_amount: l.subtotal / l.quantity as i64,
                            })
                            .collect(),
                        shipping_amount: preview.shipping_cost,
                    })
                    .await?;
                Some(session.checkout_url)
            }
        } else {
            None
        };

        let sale = self.store.change_payment_method(id, method, checkout_url).await?;
        tracing::info!(
            sale_id = %id,
            payment_method = %method,
            total_amount = sale.total_amount,
            "payment method changed"
        );
        Ok(sale)
    }

    /// Cancel a sale. Stock comes back in the same transaction; a live
    /// carrier shipment is voided afterwards, detached and best-effort.
    pub async fn cancel(&self, id: Uuid) -> Result<Sale, SaleError> {
        let sale = self.store.cancel_sale(id).await?;

        if let Some(external_id) = sale.external_shipment_id.clone() {
            if sale.shipment_status == ShipmentStatus::Cancelled {
                let carrier = self.carrier.clone();
                tokio::spawn(async move {
                    if let Err(err) = carrier.cancel_shipment(&external_id).await {
                        tracing::warn!(
                            sale_id = %id,
                            error = %err,
                            "carrier-side shipment cancel failed"
                        );
                    }
                });
            }
        }
        Ok(sale)
    }
}

fn checkout_items(lines: &[LineDraft]) -> Vec<CheckoutItem> {
    lines
        .iter()
        .map(|l| CheckoutItem {
            description: l
                .custom_description
                .clone()
                .unwrap_or_else(|| l.description.clone()),
            quantity: l.quantity,
            unit_amount: l.subtotal / l.quantity as i64,
        })
        .collect()
}

fn validate(request: &CreateSaleRequest) -> Result<(), SaleError> {
    if request.lines.is_empty() {
        return Err(SaleError::Validation("a sale needs at least one line".into()));
    }
    for line in &request.lines {
        if line.quantity < 1 {
            return Err(SaleError::Validation(format!(
                "quantity must be at least 1 for product {}",
                line.product_id
            )));
        }
        if line.custom_price.is_some_and(|p| p < 0) {
            return Err(SaleError::Validation(format!(
                "custom price cannot be negative for product {}",
                line.product_id
            )));
        }
    }
    if request.customer.account_id.trim().is_empty() {
        return Err(SaleError::Validation("customer account id is required".into()));
    }
    if !request.customer.email.contains('@') {
        return Err(SaleError::Validation("customer email is invalid".into()));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
