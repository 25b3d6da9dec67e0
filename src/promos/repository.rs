// Promo repository
//
// The promo catalog is maintained by admin CRUD outside this core; the
// lifecycle only reads promos and commits redemptions. Redemption is an
// atomic check-and-increment so the usage caps hold under concurrent order
// creation, and every redemption has a compensating release for rollback.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::PromoError;
use super::models::Promo;

#[async_trait]
pub trait PromoRepository: Send + Sync {
    /// Look up a promo by code (case-insensitive)
    async fn find_by_code(&self, code: &str) -> Option<Promo>;

    /// Redemptions recorded for one registered customer
    async fn redemptions_for(&self, code: &str, customer_id: Uuid) -> u32;

    /// Commit one redemption: re-checks the caps and increments atomically.
    /// Called on successful order creation only, never on validation.
    async fn record_redemption(
        &self,
        code: &str,
        customer_id: Option<Uuid>,
    ) -> Result<(), PromoError>;

    /// Compensating action for a redemption whose order failed to persist
    async fn release_redemption(&self, code: &str, customer_id: Option<Uuid>);
}

/// Per-code state: the promo plus per-customer redemption counts
struct PromoState {
    promo: Promo,
    per_customer: HashMap<Uuid, u32>,
}

/// In-memory promo repository adapter
pub struct InMemoryPromoRepository {
    promos: RwLock<HashMap<String, PromoState>>,
}

impl InMemoryPromoRepository {
    pub fn new() -> Self {
        Self {
            promos: RwLock::new(HashMap::new()),
        }
    }

    /// Seed or replace a promo (admin-side operation)
    pub async fn insert(&self, promo: Promo) {
        let code = promo.code.to_uppercase();
        self.promos.write().await.insert(
            code,
            PromoState {
                promo,
                per_customer: HashMap::new(),
            },
        );
    }
}

impl Default for InMemoryPromoRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromoRepository for InMemoryPromoRepository {
    async fn find_by_code(&self, code: &str) -> Option<Promo> {
        self.promos
            .read()
            .await
            .get(&code.to_uppercase())
            .map(|state| state.promo.clone())
    }

    async fn redemptions_for(&self, code: &str, customer_id: Uuid) -> u32 {
        self.promos
            .read()
            .await
            .get(&code.to_uppercase())
            .and_then(|state| state.per_customer.get(&customer_id).copied())
            .unwrap_or(0)
    }

    async fn record_redemption(
        &self,
        code: &str,
        customer_id: Option<Uuid>,
    ) -> Result<(), PromoError> {
        let normalized = code.to_uppercase();
        let mut promos = self.promos.write().await;
        let state = promos
            .get_mut(&normalized)
            .ok_or_else(|| PromoError::UnknownCode(normalized.clone()))?;

        // Re-check caps under the write lock: validation ran earlier without
        // holding it, and a concurrent order may have consumed the last use
        if let Some(max_uses) = state.promo.max_uses {
            if state.promo.used_count >= max_uses {
                return Err(PromoError::Exhausted(normalized));
            }
        }
        if let (Some(cap), Some(customer)) = (state.promo.max_uses_per_user, customer_id) {
            let used = state.per_customer.get(&customer).copied().unwrap_or(0);
            if used >= cap {
                return Err(PromoError::PerCustomerLimit(normalized));
            }
        }

        state.promo.used_count += 1;
        if let Some(customer) = customer_id {
            *state.per_customer.entry(customer).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn release_redemption(&self, code: &str, customer_id: Option<Uuid>) {
        let normalized = code.to_uppercase();
        let mut promos = self.promos.write().await;
        let Some(state) = promos.get_mut(&normalized) else {
            tracing::warn!("Release of redemption for unknown promo '{}'", normalized);
            return;
        };

        state.promo.used_count = state.promo.used_count.saturating_sub(1);
        if let Some(customer) = customer_id {
            if let Some(count) = state.per_customer.get_mut(&customer) {
                *count = count.saturating_sub(1);
            }
        }
    }
}
