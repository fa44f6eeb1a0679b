// ============================================================================
// Sale Value Objects
// ============================================================================

use serde::{Deserialize, Serialize};

/// Lifecycle of a sale.
///
/// The happy path is PENDING_PAYMENT -> PENDING_APPROVAL -> APPROVED ->
/// SHIPPED -> DELIVERED. CANCELLED and REJECTED are reachable from any
/// non-terminal status. Terminal statuses accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "sale_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    PendingPayment,
    PendingApproval,
    Approved,
    Shipped,
    Delivered,
    Cancelled,
    Rejected,
}

impl SaleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SaleStatus::Delivered | SaleStatus::Cancelled | SaleStatus::Rejected
        )
    }

    /// Statuses whose payment has settled. These are the sales the balance
    /// aggregator counts as revenue.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SaleStatus::Approved | SaleStatus::Shipped | SaleStatus::Delivered
        )
    }

    /// Whether a transition from `self` to `to` is legal.
    pub fn can_transition(&self, to: SaleStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            SaleStatus::Cancelled | SaleStatus::Rejected => true,
            SaleStatus::PendingApproval => matches!(self, SaleStatus::PendingPayment),
            // Cash and transfer sales are approved straight from
            // PENDING_PAYMENT; gateway sales pass through PENDING_APPROVAL.
            SaleStatus::Approved => {
                matches!(self, SaleStatus::PendingPayment | SaleStatus::PendingApproval)
            }
            SaleStatus::Shipped => matches!(self, SaleStatus::Approved),
            SaleStatus::Delivered => matches!(self, SaleStatus::Shipped),
            SaleStatus::PendingPayment => false,
        }
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SaleStatus::PendingPayment => "PENDING_PAYMENT",
            SaleStatus::PendingApproval => "PENDING_APPROVAL",
            SaleStatus::Approved => "APPROVED",
            SaleStatus::Shipped => "SHIPPED",
            SaleStatus::Delivered => "DELIVERED",
            SaleStatus::Cancelled => "CANCELLED",
            SaleStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    CardGateway,
}

impl PaymentMethod {
    /// Every method except the card gateway earns the standing discount.
    pub fn qualifies_for_discount(&self) -> bool {
        !matches!(self, PaymentMethod::CardGateway)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::CardGateway => "CARD_GATEWAY",
        };
        write!(f, "{}", s)
    }
}

/// How the sale reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "delivery_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    Ship,
    Pickup,
}

impl std::fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryType::Ship => write!(f, "SHIP"),
            DeliveryType::Pickup => write!(f, "PICKUP"),
        }
    }
}

/// Carrier-side lifecycle of a shipment, tracked per sale.
///
/// Ordered by `rank`; the carrier may skip intermediate steps (a tracking
/// sync can report IN_TRANSIT before we ever saw LABEL_AVAILABLE), so any
/// forward move is legal. CANCELLED is legal from every status before
/// DELIVERED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "shipment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    NotRequested,
    Requested,
    LabelAvailable,
    InTransit,
    Delivered,
    Cancelled,
}

impl ShipmentStatus {
    fn rank(&self) -> u8 {
        match self {
            ShipmentStatus::NotRequested => 0,
            ShipmentStatus::Requested => 1,
            ShipmentStatus::LabelAvailable => 2,
            ShipmentStatus::InTransit => 3,
            ShipmentStatus::Delivered => 4,
            ShipmentStatus::Cancelled => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Cancelled)
    }

    pub fn can_transition(&self, to: ShipmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            ShipmentStatus::Cancelled => true,
            ShipmentStatus::NotRequested => false,
            _ => to.rank() > self.rank(),
        }
    }

    /// Sale status a carrier-reported shipment status pulls the sale
    /// towards. Tracking syncs apply this when the sale has not caught up.
    pub fn implied_sale_status(&self) -> Option<SaleStatus> {
        match self {
            ShipmentStatus::InTransit => Some(SaleStatus::Shipped),
            ShipmentStatus::Delivered => Some(SaleStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShipmentStatus::NotRequested => "NOT_REQUESTED",
            ShipmentStatus::Requested => "REQUESTED",
            ShipmentStatus::LabelAvailable => "LABEL_AVAILABLE",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delivered => "DELIVERED",
            ShipmentStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// Destination address, required in full before a shipment may be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    /// Name of the first missing or blank field, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        fn blank(v: &Option<String>) -> bool {
            v.as_deref().map_or(true, |s| s.trim().is_empty())
        }
        if blank(&self.street) {
            Some("street")
        } else if blank(&self.city) {
            Some("city")
        } else if blank(&self.state) {
            Some("state")
        } else if blank(&self.zip_code) {
            Some("zip_code")
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing_field().is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================
