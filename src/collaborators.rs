// External collaborator seams
//
// Payment capture/refund and customer notifications are black boxes to this
// core; they live behind traits so the lifecycle can be exercised without
// either. The default implementations here back the runnable service.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::orders::models::{Order, OrderStatus};

/// Payment gateway failure, surfaced as GatewayFailure by the lifecycle
#[derive(Debug, Clone, thiserror::Error)]
#[error("payment gateway declined: {0}")]
pub struct GatewayError(pub String);

/// Card capture and refunds, supplied by the payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(&self, order_number: &str, amount: Decimal) -> Result<(), GatewayError>;
    async fn refund(&self, order_number: &str, amount: Decimal) -> Result<(), GatewayError>;
}

/// Fire-and-forget customer notification on status changes
///
/// Implementations must tolerate failure internally; the lifecycle never
/// blocks order-state commitment on delivery.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify_status_change(&self, order: Order, status: OrderStatus);
}

/// Pack slip and receipt rendering for completed orders
///
/// Rendering happens outside this core; the lifecycle only hands over a
/// snapshot of the completed order, fire-and-forget.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_completion_documents(&self, order: Order);
}

/// Gateway that approves everything, for local runs and tests
pub struct AutoApproveGateway;

#[async_trait]
impl PaymentGateway for AutoApproveGateway {
    async fn capture(&self, order_number: &str, amount: Decimal) -> Result<(), GatewayError> {
        tracing::info!("Captured {} for order {}", amount, order_number);
        Ok(())
    }

    async fn refund(&self, order_number: &str, amount: Decimal) -> Result<(), GatewayError> {
        tracing::info!("Refunded {} for order {}", amount, order_number);
        Ok(())
    }
}

/// Notification sender that only logs, for local runs and tests
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn notify_status_change(&self, order: Order, status: OrderStatus) {
        tracing::info!(
            "Order {} for {:?} moved to {}",
            order.order_number,
            order.customer.customer_id(),
            status
        );
    }
}

/// Document renderer that only logs, for local runs and tests
pub struct LogRenderer;

#[async_trait]
impl DocumentRenderer for LogRenderer {
    async fn render_completion_documents(&self, order: Order) {
        tracing::info!(
            "Rendering pack slip and receipt for order {}",
            order.order_number
        );
    }
}
