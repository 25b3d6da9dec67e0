// Pricing engine
//
// Pure computation from cart to price breakdown. Every entry channel
// (storefront, phone entry, POS) calls this same function with the same
// inputs, which is what guarantees the channels can never disagree on a
// price for the same cart.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::models::FulfillmentType;

use super::models::OrderItem;

/// Computed money fields for an order, all rounded to cents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub delivery_fee: Decimal,
    pub tip_amount: Decimal,
    pub total_amount: Decimal,
}

/// Error types for price computation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Cart must contain at least one item")]
    EmptyCart,

    #[error("Quantity must be positive")]
    InvalidQuantity,

    #[error("Unit and add-on prices must be non-negative")]
    NegativePrice,

    #[error("Tip must be non-negative")]
    NegativeTip,

    // A discount above the subtotal means an upstream bug; it is rejected
    // loudly rather than floored to zero
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    InvalidDiscount { discount: Decimal, subtotal: Decimal },
}

/// Service computing order totals
pub struct PricingEngine;

impl PricingEngine {
    /// Compute the price breakdown for a cart
    ///
    /// # Arguments
    /// * `items` - Non-empty cart lines with positive quantities
    /// * `fulfillment_type` - Delivery orders get the flat delivery fee
    /// * `discount` - Pre-validated discount amount (not a code); must not
    ///   exceed the subtotal
    /// * `tip` - Tip amount, zero if none
    ///
    /// # Guarantees
    /// Deterministic and idempotent: identical inputs always produce an
    /// identical breakdown, regardless of the calling channel.
    pub fn compute(
        items: &[OrderItem],
        fulfillment_type: FulfillmentType,
        discount: Decimal,
        tip: Decimal,
        settings: &Settings,
    ) -> Result<PriceBreakdown, PricingError> {
        if items.is_empty() {
            return Err(PricingError::EmptyCart);
        }
        for item in items {
            if item.quantity == 0 {
                return Err(PricingError::InvalidQuantity);
            }
            if item.unit_price < Decimal::ZERO || item.addon_total < Decimal::ZERO {
                return Err(PricingError::NegativePrice);
            }
        }
        if tip < Decimal::ZERO {
            return Err(PricingError::NegativeTip);
        }

        let subtotal = Self::subtotal(items);
        if discount < Decimal::ZERO || discount > subtotal {
            return Err(PricingError::InvalidDiscount { discount, subtotal });
        }

        let delivery_fee = match fulfillment_type {
            FulfillmentType::Delivery => settings.delivery_fee,
            FulfillmentType::Pickup | FulfillmentType::Walkin => Decimal::ZERO,
        };

        let taxable_amount = subtotal - discount;
        let tax_amount = round2(taxable_amount * settings.tax_rate);
        let total_amount = round2(taxable_amount + tax_amount + delivery_fee + tip);

        Ok(PriceBreakdown {
            subtotal: round2(subtotal),
            discount_amount: round2(discount),
            tax_amount,
            delivery_fee: round2(delivery_fee),
            tip_amount: round2(tip),
            total_amount,
        })
    }

    /// Cart subtotal: Σ(unit_price × quantity + addon_total)
    ///
    /// Shared with promo validation so both see the same number.
    pub fn subtotal(items: &[OrderItem]) -> Decimal {
        items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity) + item.addon_total)
            .sum()
    }
}

/// Round to cents, half-up
fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
