// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure domain types and rules for the sale transaction engine:
// - Catalog read model (product snapshots, stock rules)
// - Sale aggregate: value objects, pricing, errors, invariants
//
// This layer knows nothing about HTTP or the external providers; the store
// and service layers depend on it, never the other way around.
//
// ============================================================================

pub mod catalog;
pub mod sale;
