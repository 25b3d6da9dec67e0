// Shared domain types used by orders, promos, and scheduling

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an order reaches the customer
///
/// Determines whether a delivery fee applies (Delivery only) and whether the
/// order may hold a timeslot (Walkin orders never do).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentType {
    Pickup,
    Delivery,
    Walkin,
}

impl FulfillmentType {
    /// Convert fulfillment type to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::Pickup => "pickup",
            FulfillmentType::Delivery => "delivery",
            FulfillmentType::Walkin => "walkin",
        }
    }

    /// Parse fulfillment type from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pickup" => Ok(FulfillmentType::Pickup),
            "delivery" => Ok(FulfillmentType::Delivery),
            "walkin" => Ok(FulfillmentType::Walkin),
            _ => Err(format!("Invalid fulfillment type: {}", s)),
        }
    }
}

impl std::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry channel that produced an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    Web,
    Phone,
    Pos,
}

impl OrderSource {
    /// Prefix used in human-readable order numbers (e.g. "WEB-20260830-K4QF")
    pub fn prefix(&self) -> &'static str {
        match self {
            OrderSource::Web => "WEB",
            OrderSource::Phone => "PHN",
            OrderSource::Pos => "POS",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::Web => "web",
            OrderSource::Phone => "phone",
            OrderSource::Pos => "pos",
        }
    }
}

impl std::fmt::Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment method recorded on an order
///
/// Card capture itself is handled by the payment gateway collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
}

/// Customer identity attached to an order
///
/// An order belongs to a registered account or carries guest contact fields,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum CustomerRef {
    Account {
        customer_id: Uuid,
    },
    Guest {
        name: String,
        phone: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
}

impl CustomerRef {
    /// Account id if this is a registered customer, None for guests
    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            CustomerRef::Account { customer_id } => Some(*customer_id),
            CustomerRef::Guest { .. } => None,
        }
    }
}
