// ============================================================================
// Service Layer - Workflows
// ============================================================================
//
// One service per workflow, each owning exactly the dependencies it needs.
// Services orchestrate: validation first, then external providers, then one
// atomic store call. No service ever holds a database transaction across a
// network call.
//
// ============================================================================

pub mod checkout;
pub mod payments;
pub mod quotes;
pub mod reports;
pub mod shipments;

pub use checkout::CheckoutService;
pub use payments::PaymentService;
pub use quotes::QuoteService;
pub use reports::BalanceService;
pub use shipments::ShipmentService;
