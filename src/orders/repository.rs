use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::OrderError;
use super::models::{Order, OrderStatus};

/// Persistence seam for orders
///
/// The production deployment backs this with the shared database; the
/// in-memory implementation below backs tests and local runs.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order; rejects a duplicate order number
    async fn insert(&self, order: Order) -> Result<(), OrderError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError>;

    /// All orders, newest first, optionally filtered by status
    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError>;

    /// Overwrite an existing order
    async fn update(&self, order: Order) -> Result<(), OrderError>;

    async fn number_exists(&self, order_number: &str) -> Result<bool, OrderError>;
}

/// In-memory order store
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    numbers: RwLock<HashSet<String>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), OrderError> {
        let mut numbers = self.numbers.write().await;
        if !numbers.insert(order.order_number.clone()) {
            return Err(OrderError::Storage(format!(
                "Duplicate order number: {}",
                order.order_number
            )));
        }
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update(&self, order: Order) -> Result<(), OrderError> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) {
            return Err(OrderError::NotFound);
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn number_exists(&self, order_number: &str) -> Result<bool, OrderError> {
        Ok(self.numbers.read().await.contains(order_number))
    }
}
