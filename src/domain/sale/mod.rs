// ============================================================================
// Sale Aggregate
// ============================================================================
//
// The sale is the central aggregate of the engine. Everything a sale needs
// to be re-priced or audited later is snapshotted onto the record at
// creation time, so no business rule ever has to reach back into the
// catalog after the fact.
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod pricing;
pub mod value_objects;

pub use aggregate::{LineDraft, Sale, SaleDraft, SaleLine};
pub use errors::{ErrorKind, SaleError};
pub use value_objects::{Address, DeliveryType, PaymentMethod, SaleStatus, ShipmentStatus};
