use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CustomerRef, FulfillmentType, OrderSource, PaymentMethod};
use crate::scheduling::models::SlotKey;

/// Order status enum representing the lifecycle of an order
///
/// Orders advance one step at a time along
/// New → Confirmed → InProduction → Ready → OutForDelivery → Completed.
/// Cancelled and Refunded are absorbing exit states reachable from any
/// non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Confirmed,
    InProduction,
    Ready,
    OutForDelivery,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "new" => Ok(OrderStatus::New),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "in_production" => Ok(OrderStatus::InProduction),
            "ready" => Ok(OrderStatus::Ready),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::New
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line within an order
///
/// `unit_price` is a snapshot taken at order time and is never recomputed
/// from the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Sum of add-on prices for one unit set of this line
    pub addon_total: Decimal,
    /// unit_price × quantity + addon_total
    pub total_price: Decimal,
    pub note: Option<String>,
}

/// Domain model for an order
///
/// Invariant: `total_amount = round2(subtotal - discount_amount + tax_amount
/// + delivery_fee + tip_amount)` and `discount_amount <= subtotal`. Orders
/// are never deleted; cancellation and refund are terminal statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Channel-prefixed, date-stamped, random-suffix number, e.g.
    /// WEB-20260830-K4QF; unique across all orders
    pub order_number: String,
    pub status: OrderStatus,
    pub fulfillment_type: FulfillmentType,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub delivery_fee: Decimal,
    pub tip_amount: Decimal,
    pub total_amount: Decimal,
    pub refunded_amount: Decimal,
    pub promo_code: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub slot: Option<SlotKey>,
    pub source: OrderSource,
    pub production_notes: Option<String>,
    pub packaging_checklist: HashMap<String, bool>,
    pub assigned_baker_id: Option<Uuid>,
    pub customer: CustomerRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for one cart line
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    /// Price snapshot resolved by the channel at cart-build time
    pub unit_price: Decimal,
    #[serde(default)]
    pub addon_total: Option<Decimal>,
    pub note: Option<String>,
}

/// Request DTO for creating a new order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub fulfillment_type: FulfillmentType,
    pub payment_method: PaymentMethod,
    pub source: OrderSource,
    pub customer: CustomerRef,
    pub promo_code: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    /// Start time of the requested slot on `scheduled_date`; the slot key is
    /// completed with the order's fulfillment type
    pub slot_start_time: Option<NaiveTime>,
    #[serde(default)]
    pub tip_amount: Option<Decimal>,
    /// Capture payment through the gateway as part of creation (POS and
    /// storefront card checkouts)
    #[serde(default)]
    pub capture_payment: bool,
    pub production_notes: Option<String>,
}

/// Request DTO for rescheduling an order
#[derive(Debug, Deserialize, Validate)]
pub struct RescheduleRequest {
    pub new_date: NaiveDate,
    /// Omitted = release the current slot and leave the order unscheduled
    pub new_slot_start_time: Option<NaiveTime>,
}

/// Request DTO for refunding an order
#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    /// Defaults to the order's full total
    pub amount: Option<Decimal>,
    #[validate(length(min = 1, message = "A refund reason is required"))]
    pub reason: String,
}

impl OrderItemRequest {
    /// Materialize the line, computing its total
    pub fn into_item(self) -> OrderItem {
        let addon_total = self.addon_total.unwrap_or(Decimal::ZERO);
        let total_price = self.unit_price * Decimal::from(self.quantity) + addon_total;
        OrderItem {
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            addon_total,
            total_price,
            note: self.note,
        }
    }
}
