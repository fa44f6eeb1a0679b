// ============================================================================
// Sale Errors
// ============================================================================

use thiserror::Error;
use uuid::Uuid;

use super::value_objects::{DeliveryType, SaleStatus, ShipmentStatus};

/// Coarse classification used by the HTTP layer to pick a response status
/// and by callers that only care about the family of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or rule-violating input.
    Validation,
    /// Caller failed authentication (bad webhook signature).
    Unauthorized,
    /// A referenced entity does not exist.
    NotFound,
    /// The request is well-formed but the current state forbids it.
    Conflict,
    /// An external provider failed or answered nonsense.
    Upstream,
    /// Bug or infrastructure failure on our side.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name, used as the wire error code and as a metrics
    /// label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Everything that can go wrong inside the sale engine.
#[derive(Debug, Error)]
pub enum SaleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("webhook signature missing or invalid")]
    InvalidSignature,

    #[error("product {0} not found")]
    ProductNotFound(Uuid),

    #[error("sale {0} not found")]
    SaleNotFound(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition { from: SaleStatus, to: SaleStatus },

    #[error("illegal shipment transition {from} -> {to}")]
    InvalidShipmentTransition {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("sale is already cancelled")]
    AlreadyCancelled,

    #[error("payment method can no longer be changed once a sale is {0}")]
    MethodChangeLocked(SaleStatus),

    #[error("sale is a {0} order and cannot be dispatched")]
    WrongDeliveryType(DeliveryType),

    #[error("sale is {0} and not ready to ship")]
    NotReadyToShip(SaleStatus),

    #[error("a shipment was already requested for this sale")]
    ShipmentAlreadyRequested,

    #[error("no shipment has been requested for this sale")]
    ShipmentNotRequested,

    #[error("shipping address is incomplete: missing {0}")]
    IncompleteAddress(&'static str),

    #[error("{service} upstream failure: {detail}")]
    Upstream { service: &'static str, detail: String },

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SaleError {
    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        SaleError::Upstream {
            service,
            detail: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SaleError::Validation(_) => ErrorKind::Validation,
            SaleError::InvalidSignature => ErrorKind::Unauthorized,
            SaleError::ProductNotFound(_) | SaleError::SaleNotFound(_) => ErrorKind::NotFound,
            // Dispatch preconditions (delivery type, address) are conflicts:
            // the request is well-formed, the sale's state is what refuses it.
            SaleError::InsufficientStock { .. }
            | SaleError::InvalidTransition { .. }
            | SaleError::InvalidShipmentTransition { .. }
            | SaleError::AlreadyCancelled
            | SaleError::MethodChangeLocked(_)
            | SaleError::WrongDeliveryType(_)
            | SaleError::NotReadyToShip(_)
            | SaleError::ShipmentAlreadyRequested
            | SaleError::ShipmentNotRequested
            | SaleError::IncompleteAddress(_) => ErrorKind::Conflict,
            SaleError::Upstream { .. } => ErrorKind::Upstream,
            SaleError::Storage(_) | SaleError::Internal(_) => ErrorKind::Internal,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = SaleError::InsufficientStock {
            product_id: Uuid::new_v4(),
            requested: 3,
            available: 1,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(
            SaleError::ProductNotFound(Uuid::new_v4()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(SaleError::InvalidSignature.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            SaleError::upstream("carrier", "timed out").kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn test_dispatch_preconditions_are_conflicts() {
        // An incomplete address or a pickup sale refuses dispatch because of
        // the sale's state, not because the request was malformed.
        assert_eq!(
            SaleError::IncompleteAddress("zip_code").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            SaleError::WrongDeliveryType(DeliveryType::Pickup).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            SaleError::Validation("quantity must be at least 1".into()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_transition_error_names_both_statuses() {
        let err = SaleError::InvalidTransition {
            from: SaleStatus::Delivered,
            to: SaleStatus::Approved,
        };
        let msg = err.to_string();
        assert!(msg.contains("DELIVERED"));
        assert!(msg.contains("APPROVED"));
    }
}
