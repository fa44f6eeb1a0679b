// ============================================================================
// Annual Balance Report
// ============================================================================
//
// Twelve monthly revenue buckets for a calendar year, split into product and
// service income. Only settled sales count; money that was never captured
// (pending, cancelled, rejected) never shows up here.
//
// ============================================================================

use std::sync::Arc;

use chrono::Datelike;
use serde::Serialize;

use crate::domain::catalog::ProductKind;
use crate::domain::sale::errors::SaleError;
use crate::store::{SaleStore, SettledSale};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBalance {
    /// Calendar month, 1 through 12.
    pub month: u32,
    /// Physical goods revenue in cents, shipping included.
    pub products: i64,
    /// Service revenue in cents.
    pub services: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualBalance {
    pub year: i32,
    /// Always twelve entries, January first.
    pub months: Vec<MonthlyBalance>,
    pub products_total: i64,
    pub services_total: i64,
    pub total: i64,
}

pub struct BalanceService {
    store: Arc<dyn SaleStore>,
}

impl BalanceService {
    pub fn new(store: Arc<dyn SaleStore>) -> Self {
        Self { store }
    }

    pub async fn annual(&self, year: i32) -> Result<AnnualBalance, SaleError> {
        if !(2000..=2100).contains(&year) {
            return Err(SaleError::Validation(format!(
                "year {year} is outside the reportable range"
            )));
        }
        let sales = self.store.settled_sales(year).await?;
        Ok(aggregate(year, &sales))
    }
}

/// Fold settled sales into monthly buckets. Shipping revenue follows the
/// goods it moved, so it lands in the product bucket.
fn aggregate(year: i32, sales: &[SettledSale]) -> AnnualBalance {
    let mut months: Vec<MonthlyBalance> = (1..=12)
        .map(|month| MonthlyBalance {
            month,
            products: 0,
            services: 0,
            total: 0,
        })
        .collect();

    for sale in sales {
        let bucket = &mut months[(sale.created_at.month() - 1) as usize];
        for line in &sale.lines {
            match line.product_kind {
                ProductKind::Physical => bucket.products += line.subtotal,
                ProductKind::Service => bucket.services += line.subtotal,
            }
            // Legacy rows were classified by category name. Flag rows where
            // the two disagree so stale catalog data gets noticed.
            let looks_like_service = line.category.eq_ignore_ascii_case("services");
            if looks_like_service != (line.product_kind == ProductKind::Service) {
                tracing::warn!(
                    category = %line.category,
                    product_kind = %line.product_kind,
                    "line category and kind disagree"
                );
            }
        }
        bucket.products += sale.shipping_cost;
    }

    let mut products_total = 0;
    let mut services_total = 0;
    for bucket in &mut months {
        bucket.total = bucket.products + bucket.services;
        products_total += bucket.products;
        services_total += bucket.services;
    }

    AnnualBalance {
        year,
        months,
        products_total,
        services_total,
        total: products_total + services_total,
    }
}

// ============================================================================
// Tests
// ============================================================================
