use super::models::OrderStatus;

/// Order status state machine
///
/// The forward path is strictly linear and advances one step per call:
/// New → Confirmed → InProduction → Ready → OutForDelivery → Completed.
/// Cancelled and Refunded are absorbing exit states reachable from any
/// non-terminal status; nothing leaves them.
pub struct StatusMachine;

impl StatusMachine {
    /// Next status on the forward path, None from Completed and exit states
    pub fn next(status: OrderStatus) -> Option<OrderStatus> {
        match status {
            OrderStatus::New => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::InProduction),
            OrderStatus::InProduction => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::OutForDelivery),
            OrderStatus::OutForDelivery => Some(OrderStatus::Completed),
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded => None,
        }
    }

    /// True for statuses that never transition again
    pub fn is_terminal(status: OrderStatus) -> bool {
        matches!(
            status,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Advance one step along the forward path
    pub fn advance(from: OrderStatus) -> Result<OrderStatus, String> {
        Self::next(from).ok_or_else(|| format!("Cannot advance order from status '{}'", from))
    }

    /// Whether an order in `from` may move to the given exit state
    pub fn can_exit_to(from: OrderStatus, exit: OrderStatus) -> bool {
        matches!(exit, OrderStatus::Cancelled | OrderStatus::Refunded) && !Self::is_terminal(from)
    }
}
