// Promo validation
//
// Checks run in a fixed order and short-circuit on the first failure, so
// the caller always sees the most fundamental rejection reason. Validation
// is side-effect free; usage is committed separately at order creation.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use uuid::Uuid;

use super::error::PromoError;
use super::models::{Discount, PromoType};
use super::repository::PromoRepository;

pub struct PromoValidator {
    repo: Arc<dyn PromoRepository>,
}

impl PromoValidator {
    pub fn new(repo: Arc<dyn PromoRepository>) -> Self {
        Self { repo }
    }

    /// Validate a code against a cart subtotal, customer identity, and the
    /// current time; returns the discount to apply or the rejection reason
    ///
    /// Check order: exists and active → time window → minimum order →
    /// global usage cap → per-customer cap. Guest checkouts (no customer id)
    /// are exempt from the per-customer cap.
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
        customer_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Discount, PromoError> {
        let promo = self
            .repo
            .find_by_code(code)
            .await
            .ok_or_else(|| PromoError::UnknownCode(code.to_uppercase()))?;

        if !promo.is_active {
            return Err(PromoError::Inactive(promo.code));
        }
        if let Some(starts_at) = promo.starts_at {
            if now < starts_at {
                return Err(PromoError::NotStarted(promo.code));
            }
        }
        if let Some(expires_at) = promo.expires_at {
            if now > expires_at {
                return Err(PromoError::Expired(promo.code));
            }
        }
        if subtotal < promo.min_order_amount {
            return Err(PromoError::BelowMinimum {
                code: promo.code,
                minimum: promo.min_order_amount,
            });
        }
        if let Some(max_uses) = promo.max_uses {
            if promo.used_count >= max_uses {
                return Err(PromoError::Exhausted(promo.code));
            }
        }
        if let (Some(cap), Some(customer)) = (promo.max_uses_per_user, customer_id) {
            let used = self.repo.redemptions_for(&promo.code, customer).await;
            if used >= cap {
                return Err(PromoError::PerCustomerLimit(promo.code));
            }
        }

        let discount = match promo.promo_type {
            PromoType::Percentage => Discount::Amount(
                (subtotal * promo.value / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            ),
            PromoType::FixedAmount => Discount::Amount(promo.value.min(subtotal)),
            PromoType::FreeItem => Discount::FreeItem,
        };

        Ok(discount)
    }
}
