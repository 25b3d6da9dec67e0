use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Discount type of a promo code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoType {
    Percentage,
    FixedAmount,
    FreeItem,
}

impl PromoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoType::Percentage => "percentage",
            PromoType::FixedAmount => "fixed_amount",
            PromoType::FreeItem => "free_item",
        }
    }
}

impl std::fmt::Display for PromoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A promotional discount code with usage and eligibility constraints
///
/// Codes are case-insensitive; they are stored and compared uppercase.
/// `used_count` is mutated only through the repository's atomic redemption
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promo {
    pub code: String,
    pub promo_type: PromoType,
    /// Percentage (0-100) for Percentage, dollar amount for FixedAmount,
    /// unused for FreeItem
    pub value: Decimal,
    pub min_order_amount: Decimal,
    /// None = unlimited redemptions
    pub max_uses: Option<u32>,
    /// None = unlimited per registered customer; guests are exempt
    pub max_uses_per_user: Option<u32>,
    pub used_count: u32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Promo {
    /// An active promo with no usage or window constraints
    pub fn new(code: &str, promo_type: PromoType, value: Decimal) -> Self {
        Self {
            code: code.to_uppercase(),
            promo_type,
            value,
            min_order_amount: Decimal::ZERO,
            max_uses: None,
            max_uses_per_user: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }
}

/// A validated discount ready to hand to the pricing path
///
/// FreeItem is a sentinel: the order lifecycle resolves it against the cart
/// before pricing, keeping the pricing engine a pure currency computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    Amount(Decimal),
    FreeItem,
}
