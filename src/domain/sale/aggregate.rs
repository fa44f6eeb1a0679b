// ============================================================================
// Sale Aggregate Implementation
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{ProductKind, ProductSnapshot};

use super::pricing;
use super::value_objects::{
    Address, DeliveryType, PaymentMethod, SaleStatus, ShipmentStatus,
};

/// A priced line frozen onto a sale.
///
/// `unit_price` is always the undiscounted catalog price captured at
/// creation. `subtotal` is what the customer pays for the line under the
/// sale's current payment method, so it changes when the method does, while
/// `unit_price` and `custom_price` never do.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Catalog name snapshot. `custom_description` overrides it for display.
    pub description: String,
    pub category: String,
    pub product_kind: ProductKind,
    pub quantity: i32,
    pub unit_price: i64,
    pub custom_price: Option<i64>,
    pub custom_description: Option<String>,
    pub subtotal: i64,
}

impl SaleLine {
    pub fn requires_stock(&self) -> bool {
        self.product_kind.tracks_stock()
    }

    /// Text shown to the customer, on receipts and at the gateway.
    pub fn display_description(&self) -> &str {
        self.custom_description.as_deref().unwrap_or(&self.description)
    }
}

/// Full sale record as read back from storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    pub address: Address,
    /// Taxed shipping charge in cents. Zero for pickups.
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub checkout_url: Option<String>,
    pub receipt_ref: Option<String>,
    pub shipment_status: ShipmentStatus,
    pub external_shipment_id: Option<String>,
    pub tracking_code: Option<String>,
    pub label_url: Option<String>,
    pub carrier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
}

impl Sale {
    pub fn lines_total(&self) -> i64 {
        self.lines.iter().map(|l| l.subtotal).sum()
    }

    /// Recompute every line and the total for a new payment method.
    ///
    /// Each line restarts from its catalog snapshot (or operator-fixed
    /// price), so flipping methods back and forth never drifts the figures.
    /// Shipping is untouched by payment terms.
    pub fn reprice(&mut self, method: PaymentMethod) {
        for line in &mut self.lines {
            line.subtotal =
                pricing::line_subtotal(line.unit_price, line.quantity, line.custom_price, method);
        }
        self.payment_method = method;
        self.total_amount = self.lines_total() + self.shipping_cost;
    }

    /// Stock to hand back if this sale is cancelled. Services are exempt.
    pub fn restorable_stock(&self) -> Vec<(Uuid, i32)> {
        self.lines
            .iter()
            .filter(|l| l.requires_stock())
            .map(|l| (l.product_id, l.quantity))
            .collect()
    }
}

/// Customer identity attached to a new sale. Resolved against the customers
/// table (by account id) inside the same transaction that persists the sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub account_id: String,
    pub email: String,
    pub full_name: Option<String>,
}

/// A fully priced line ready to persist.
#[derive(Debug, Clone)]
pub struct LineDraft {
    pub id: Uuid,
    pub product_id: Uuid,
    pub description: String,
    pub category: String,
    pub product_kind: ProductKind,
    pub quantity: i32,
    pub unit_price: i64,
    pub custom_price: Option<i64>,
    pub custom_description: Option<String>,
    pub subtotal: i64,
}

impl LineDraft {
    /// Price a requested line against its catalog snapshot.
    pub fn build(
        snapshot: &ProductSnapshot,
        quantity: i32,
        custom_price: Option<i64>,
        custom_description: Option<String>,
        method: PaymentMethod,
    ) -> LineDraft {
        LineDraft {
            id: Uuid::now_v7(),
            product_id: snapshot.id,
            description: snapshot.name.clone(),
            category: snapshot.category.clone(),
            product_kind: snapshot.kind,
            quantity,
            unit_price: snapshot.unit_price,
            custom_price,
            custom_description,
            subtotal: pricing::line_subtotal(snapshot.unit_price, quantity, custom_price, method),
        }
    }

    pub fn requires_stock(&self) -> bool {
        self.product_kind.tracks_stock()
    }
}

/// Everything the store needs to persist a new sale in one transaction:
/// the customer to resolve or create, the priced lines, and the stock
/// decrements implied by the physical lines.
#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub id: Uuid,
    pub customer: CustomerDetails,
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    pub address: Address,
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub checkout_url: Option<String>,
    pub lines: Vec<LineDraft>,
}

impl SaleDraft {
    pub fn lines_total(&self) -> i64 {
        self.lines.iter().map(|l| l.subtotal).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_sale() -> Sale {
        Sale {
            id: Uuid::now_v7(),
            customer_id: Uuid::new_v4(),
            customer_email: "buyer@example.com".to_string(),
            customer_name: Some("Jo Buyer".to_string()),
            status: SaleStatus::PendingPayment,
            payment_method: PaymentMethod::CardGateway,
            delivery_type: DeliveryType::Ship,
            address: Address::default(),
            shipping_cost: 1_210,
            total_amount: 0,
            checkout_url: None,
            receipt_ref: None,
            shipment_status: ShipmentStatus::NotRequested,
            external_shipment_id: None,
            tracking_code: None,
            label_url: None,
            carrier: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            lines: vec![
                SaleLine {
                    id: Uuid::now_v7(),
                    product_id: Uuid::new_v4(),
                    description: "Desk Lamp".to_string(),
                    category: "lighting".to_string(),
                    product_kind: ProductKind::Physical,
                    quantity: 2,
                    unit_price: 10_000,
                    custom_price: None,
                    custom_description: None,
                    subtotal: 20_000,
                },
                SaleLine {
                    id: Uuid::now_v7(),
                    product_id: Uuid::new_v4(),
                    description: "Assembly".to_string(),
                    category: "services".to_string(),
                    product_kind: ProductKind::Service,
                    quantity: 1,
                    unit_price: 5_000,
                    custom_price: Some(4_000),
                    custom_description: Some("On-site assembly".to_string()),
                    subtotal: 4_000,
                },
            ],
        }
    }

    #[test]
    fn test_reprice_restarts_from_catalog_snapshot() {
        let mut sale = create_test_sale();
        sale.total_amount = sale.lines_total() + sale.shipping_cost;
        let original_total = sale.total_amount;

        sale.reprice(PaymentMethod::Transfer);
        // Discounted line drops to 9200 * 2; custom-priced line is untouched.
        assert_eq!(sale.lines[0].subtotal, 18_400);
        assert_eq!(sale.lines[1].subtotal, 4_000);
        assert_eq!(sale.total_amount, 18_400 + 4_000 + 1_210);
        assert_eq!(sale.payment_method, PaymentMethod::Transfer);

        sale.reprice(PaymentMethod::CardGateway);
        assert_eq!(sale.total_amount, original_total);
    }

    #[test]
    fn test_unit_price_survives_repricing() {
        let mut sale = create_test_sale();
        sale.reprice(PaymentMethod::Cash);
        sale.reprice(PaymentMethod::CardGateway);

        assert_eq!(sale.lines[0].unit_price, 10_000);
        assert_eq!(sale.lines[1].custom_price, Some(4_000));
    }

    #[test]
    fn test_restorable_stock_skips_services() {
        let sale = create_test_sale();
        let restores = sale.restorable_stock();

        assert_eq!(restores.len(), 1);
        assert_eq!(restores[0].0, sale.lines[0].product_id);
        assert_eq!(restores[0].1, 2);
    }

    #[test]
    fn test_line_draft_prices_against_snapshot() {
        let snapshot = ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Desk Lamp".to_string(),
            category: "lighting".to_string(),
            kind: ProductKind::Physical,
            unit_price: 10_000,
            stock: 10,
            weight_grams: 800,
        };

        let line = LineDraft::build(&snapshot, 3, None, None, PaymentMethod::Transfer);
        assert_eq!(line.unit_price, 10_000);
        assert_eq!(line.subtotal, 27_600);
        assert_eq!(line.description, "Desk Lamp");

        let fixed = LineDraft::build(&snapshot, 3, Some(9_000), None, PaymentMethod::Transfer);
        assert_eq!(fixed.subtotal, 27_000);
    }

    #[test]
    fn test_display_description_prefers_the_override() {
        let sale = create_test_sale();
        assert_eq!(sale.lines[0].display_description(), "Desk Lamp");
        assert_eq!(sale.lines[1].display_description(), "On-site assembly");
    }
}
