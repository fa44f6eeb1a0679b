// ============================================================================
// Pricing Engine
// ============================================================================
//
// All money is in integer minor units (cents). Every function here is pure
// and re-derives prices from the catalog snapshot stored on the line, never
// from a previously discounted subtotal, so repricing a sale any number of
// times always lands on the same figures.
//
// ============================================================================

use super::value_objects::PaymentMethod;

/// Standing discount for every payment method except the card gateway.
pub const DISCOUNT_PERCENT: i64 = 8;

/// Tax applied to the shipping charge. Goods are priced tax-inclusive;
/// shipping is the only taxed component of a sale.
pub const SHIPPING_TAX_PERCENT: i64 = 21;

/// Per-unit price for one line after the payment-method discount.
///
/// `catalog_price` is the undiscounted snapshot taken at sale creation.
/// Integer division floors, so a discounted price never rounds up.
pub fn effective_unit_price(catalog_price: i64, method: PaymentMethod) -> i64 {
    if method.qualifies_for_discount() {
        catalog_price * (100 - DISCOUNT_PERCENT) / 100
    } else {
        catalog_price
    }
}

/// Subtotal for one line.
///
/// A custom price fixed by an operator bypasses the discount machinery
/// entirely and is charged exactly as stored.
pub fn line_subtotal(
    catalog_price: i64,
    quantity: i32,
    custom_price: Option<i64>,
    method: PaymentMethod,
) -> i64 {
    let unit = match custom_price {
        Some(fixed) => fixed,
        None => effective_unit_price(catalog_price, method),
    };
    unit * quantity as i64
}

/// Shipping charge with tax applied. A zero base (pickup, free shipping)
/// stays zero.
pub fn taxed_shipping(base: i64) -> i64 {
    base * (100 + SHIPPING_TAX_PERCENT) / 100
}

// ============================================================================
// Tests
// ============================================================================
