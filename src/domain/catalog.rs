// ============================================================================
// Catalog Read Model
// ============================================================================
//
// Snapshots of the product catalog as seen by the sale workflow. The sale
// engine never mutates catalog rows except for the stock counter, and it
// treats everything else (name, category, price) as a point-in-time snapshot
// copied onto the sale line at creation.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a catalog item is a physical good or a service.
///
/// Services have no stock ledger: availability checks, decrements and
/// restores all skip them. Physical goods are always counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "product_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductKind {
    Physical,
    Service,
}

impl ProductKind {
    /// Services are exempt from every stock operation.
    pub fn tracks_stock(&self) -> bool {
        matches!(self, ProductKind::Physical)
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKind::Physical => write!(f, "PHYSICAL"),
            ProductKind::Service => write!(f, "SERVICE"),
        }
    }
}

/// Point-in-time view of a catalog row, fetched in batch at sale creation.
///
/// `unit_price` is the undiscounted catalog price in minor units (cents).
/// Payment-method discounts are applied per line by the pricing engine and
/// never written back to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub kind: ProductKind,
    /// Catalog price in cents, before any payment-method discount.
    pub unit_price: i64,
    /// Units on hand. Meaningless for services and ignored for them.
    pub stock: i32,
    /// Shipping weight in grams. Services weigh nothing.
    pub weight_grams: i32,
}

impl ProductSnapshot {
    /// True when `quantity` units can be taken from stock.
    ///
    /// Services are always available regardless of the stored counter.
    pub fn can_fulfill(&self, quantity: i32) -> bool {
        !self.kind.tracks_stock() || self.stock >= quantity
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_snapshot(kind: ProductKind, stock: i32) -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Standing Desk".to_string(),
            category: "furniture".to_string(),
            kind,
            unit_price: 45_000,
            stock,
            weight_grams: 22_000,
        }
    }

    #[test]
    fn test_physical_product_fulfills_within_stock() {
        let snapshot = create_test_snapshot(ProductKind::Physical, 5);

        assert!(snapshot.can_fulfill(5));
        assert!(!snapshot.can_fulfill(6));
    }

    #[test]
    fn test_service_ignores_stock_counter() {
        let snapshot = create_test_snapshot(ProductKind::Service, 0);

        assert!(snapshot.can_fulfill(1));
        assert!(snapshot.can_fulfill(10_000));
    }

    #[test]
    fn test_kind_serde_tokens() {
        let json = serde_json::to_string(&ProductKind::Physical).unwrap();
        assert_eq!(json, "\"PHYSICAL\"");

        let kind: ProductKind = serde_json::from_str("\"SERVICE\"").unwrap();
        assert_eq!(kind, ProductKind::Service);
    }
}
