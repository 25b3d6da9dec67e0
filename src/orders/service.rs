// Order lifecycle service
//
// Owns the transactional heart of checkout: price the cart, reserve the
// slot, commit the promo, capture payment, persist. Side effects run in
// that fixed order, and each failure unwinds the effects already applied
// so no money moves and no capacity stays held for an order that was never
// created.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::collaborators::{DocumentRenderer, NotificationSender, PaymentGateway};
use crate::config::Settings;
use crate::models::FulfillmentType;
use crate::promos::{Discount, PromoRepository, PromoValidator};
use crate::scheduling::capacity::SlotCapacityStore;
use crate::scheduling::models::SlotKey;

use super::error::OrderError;
use super::models::{
    CreateOrderRequest, Order, OrderStatus, RefundRequest, RescheduleRequest,
};
use super::number::OrderNumberGenerator;
use super::pricing::PricingEngine;
use super::repository::OrderStore;
use super::status_machine::StatusMachine;

/// Attempts at drawing a fresh order number before giving up
const NUMBER_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    promo_repo: Arc<dyn PromoRepository>,
    promo_validator: Arc<PromoValidator>,
    slot_store: Arc<SlotCapacityStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSender>,
    renderer: Arc<dyn DocumentRenderer>,
    settings: Settings,
    /// Per-order mutexes serializing lifecycle mutations, keyed like the
    /// slot store's per-slot locks
    order_locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        promo_repo: Arc<dyn PromoRepository>,
        slot_store: Arc<SlotCapacityStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSender>,
        renderer: Arc<dyn DocumentRenderer>,
        settings: Settings,
    ) -> Self {
        let promo_validator = Arc::new(PromoValidator::new(promo_repo.clone()));
        Self {
            store,
            promo_repo,
            promo_validator,
            slot_store,
            gateway,
            notifier,
            renderer,
            settings,
            order_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create an order from a validated request
    ///
    /// Pure computation first (items, promo check, price breakdown), then
    /// side effects in a fixed sequence: slot reservation, promo redemption,
    /// payment capture, persistence. A failure at any step rolls back the
    /// steps before it.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let now = Utc::now();

        if request.fulfillment_type == FulfillmentType::Walkin
            && request.slot_start_time.is_some()
        {
            return Err(OrderError::Validation(
                "Walk-in orders are fulfilled immediately and cannot book a timeslot".to_string(),
            ));
        }
        if request.slot_start_time.is_some() && request.scheduled_date.is_none() {
            return Err(OrderError::Validation(
                "A slot start time requires a scheduled date".to_string(),
            ));
        }

        let items: Vec<_> = request
            .items
            .into_iter()
            .map(|line| line.into_item())
            .collect();
        let subtotal = PricingEngine::subtotal(&items);
        let customer_id = request.customer.customer_id();

        // Promo check is side-effect free; the redemption commits later
        let discount_amount = match &request.promo_code {
            Some(code) => {
                let discount = self
                    .promo_validator
                    .validate(code, subtotal, customer_id, now)
                    .await?;
                match discount {
                    Discount::Amount(amount) => amount,
                    // A free item comps the cheapest single unit in the cart
                    Discount::FreeItem => items
                        .iter()
                        .map(|item| item.unit_price)
                        .min()
                        .unwrap_or(Decimal::ZERO),
                }
            }
            None => Decimal::ZERO,
        };

        let tip = request.tip_amount.unwrap_or(Decimal::ZERO);
        let breakdown = PricingEngine::compute(
            &items,
            request.fulfillment_type,
            discount_amount,
            tip,
            &self.settings,
        )?;

        let slot_key = match (request.scheduled_date, request.slot_start_time) {
            (Some(date), Some(start_time)) => Some(SlotKey {
                date,
                start_time,
                fulfillment_type: request.fulfillment_type,
            }),
            _ => None,
        };

        // --- side effects begin; everything below must unwind on failure ---

        if let Some(key) = slot_key {
            self.slot_store.reserve(key).await?;
        }

        let promo_code = request.promo_code.map(|c| c.to_uppercase());
        if let Some(code) = &promo_code {
            if let Err(err) = self.promo_repo.record_redemption(code, customer_id).await {
                self.release_slot_quietly(slot_key).await;
                return Err(err.into());
            }
        }

        let order_number = match self.unique_order_number(request.source, now.date_naive()).await
        {
            Ok(number) => number,
            Err(err) => {
                self.release_promo_quietly(&promo_code, customer_id).await;
                self.release_slot_quietly(slot_key).await;
                return Err(err);
            }
        };

        let mut is_paid = false;
        let mut paid_at = None;
        if request.capture_payment {
            if let Err(err) = self
                .gateway
                .capture(&order_number, breakdown.total_amount)
                .await
            {
                self.release_promo_quietly(&promo_code, customer_id).await;
                self.release_slot_quietly(slot_key).await;
                return Err(err.into());
            }
            is_paid = true;
            paid_at = Some(now);
        }

        let order = Order {
            id: Uuid::new_v4(),
            order_number: order_number.clone(),
            status: OrderStatus::New,
            fulfillment_type: request.fulfillment_type,
            payment_method: request.payment_method,
            is_paid,
            paid_at,
            items,
            subtotal: breakdown.subtotal,
            discount_amount: breakdown.discount_amount,
            tax_amount: breakdown.tax_amount,
            delivery_fee: breakdown.delivery_fee,
            tip_amount: breakdown.tip_amount,
            total_amount: breakdown.total_amount,
            refunded_amount: Decimal::ZERO,
            promo_code: promo_code.clone(),
            scheduled_date: request.scheduled_date,
            slot: slot_key,
            source: request.source,
            production_notes: request.production_notes,
            packaging_checklist: Default::default(),
            assigned_baker_id: None,
            customer: request.customer,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.store.insert(order.clone()).await {
            if is_paid {
                if let Err(refund_err) = self
                    .gateway
                    .refund(&order_number, breakdown.total_amount)
                    .await
                {
                    tracing::error!(
                        "Refund of unsaved order {} failed: {}",
                        order_number,
                        refund_err
                    );
                }
            }
            self.release_promo_quietly(&promo_code, customer_id).await;
            self.release_slot_quietly(slot_key).await;
            return Err(err);
        }

        tracing::info!(
            "Created order {} ({}, total {})",
            order.order_number,
            order.fulfillment_type,
            order.total_amount
        );
        Ok(order)
    }

    /// Advance an order one step along the forward path
    pub async fn advance(&self, id: Uuid) -> Result<Order, OrderError> {
        let _guard = self.order_guard(id).await;
        let mut order = self.require_order(id).await?;

        let next = StatusMachine::advance(order.status).map_err(OrderError::InvalidTransition)?;
        order.status = next;
        order.updated_at = Utc::now();
        self.store.update(order.clone()).await?;

        tracing::info!("Order {} advanced to {}", order.order_number, next);
        self.notify(order.clone(), next);
        if next == OrderStatus::Completed {
            // Pack slip and receipt go out with the finished order
            let renderer = self.renderer.clone();
            let snapshot = order.clone();
            tokio::spawn(async move {
                renderer.render_completion_documents(snapshot).await;
            });
        }
        Ok(order)
    }

    /// Move an order to a different slot, or release its slot entirely
    ///
    /// The capacity change and the order update succeed or fail together:
    /// a full destination slot leaves the order exactly where it was.
    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Order, OrderError> {
        let _guard = self.order_guard(id).await;
        let mut order = self.require_order(id).await?;

        if StatusMachine::is_terminal(order.status) {
            return Err(OrderError::InvalidTransition(format!(
                "Cannot reschedule an order in status '{}'",
                order.status
            )));
        }
        if order.fulfillment_type == FulfillmentType::Walkin {
            return Err(OrderError::Validation(
                "Walk-in orders have no timeslot to reschedule".to_string(),
            ));
        }

        let old_slot = order.slot;
        let new_slot = request.new_slot_start_time.map(|start_time| SlotKey {
            date: request.new_date,
            start_time,
            fulfillment_type: order.fulfillment_type,
        });

        match (old_slot, new_slot) {
            (Some(from), Some(to)) => self.slot_store.move_reservation(from, to).await?,
            (None, Some(to)) => self.slot_store.reserve(to).await?,
            (Some(from), None) => self.slot_store.release(from).await?,
            (None, None) => {}
        }

        order.slot = new_slot;
        order.scheduled_date = Some(request.new_date);
        order.updated_at = Utc::now();

        if let Err(err) = self.store.update(order.clone()).await {
            // Undo the capacity change so the books match the stored order
            let undo = match (old_slot, new_slot) {
                (Some(from), Some(to)) => self.slot_store.move_reservation(to, from).await,
                (None, Some(to)) => self.slot_store.release(to).await,
                (Some(from), None) => self.slot_store.reserve(from).await,
                (None, None) => Ok(()),
            };
            if let Err(undo_err) = undo {
                tracing::error!(
                    "Failed to revert slot change for order {}: {}",
                    order.order_number,
                    undo_err
                );
            }
            return Err(err);
        }

        tracing::info!(
            "Order {} rescheduled to {}",
            order.order_number,
            new_slot
                .map(|k| k.to_string())
                .unwrap_or_else(|| format!("{} (no slot)", request.new_date))
        );
        Ok(order)
    }

    /// Refund an order and move it to the Refunded exit state
    ///
    /// The gateway refund runs first; if it fails the order is untouched, so
    /// retrying is always safe. A second refund attempt hits the terminal
    /// status guard and cannot double-pay.
    pub async fn refund(&self, id: Uuid, request: RefundRequest) -> Result<Order, OrderError> {
        let _guard = self.order_guard(id).await;
        let mut order = self.require_order(id).await?;

        if !StatusMachine::can_exit_to(order.status, OrderStatus::Refunded) {
            return Err(OrderError::InvalidTransition(format!(
                "Cannot refund an order in status '{}'",
                order.status
            )));
        }

        let amount = request.amount.unwrap_or(order.total_amount);
        if amount <= Decimal::ZERO || amount > order.total_amount {
            return Err(OrderError::Validation(format!(
                "Refund amount must be between 0 and the order total of {}",
                order.total_amount
            )));
        }

        self.gateway.refund(&order.order_number, amount).await?;

        order.status = OrderStatus::Refunded;
        order.refunded_amount = amount;
        order.updated_at = Utc::now();

        if let Some(key) = order.slot {
            self.release_slot_quietly(Some(key)).await;
            order.slot = None;
        }

        self.store.update(order.clone()).await?;

        tracing::info!(
            "Order {} refunded {} ({})",
            order.order_number,
            amount,
            request.reason
        );
        self.notify(order.clone(), OrderStatus::Refunded);
        Ok(order)
    }

    /// Cancel an order, releasing its slot
    pub async fn cancel(&self, id: Uuid) -> Result<Order, OrderError> {
        let _guard = self.order_guard(id).await;
        let mut order = self.require_order(id).await?;

        if !StatusMachine::can_exit_to(order.status, OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition(format!(
                "Cannot cancel an order in status '{}'",
                order.status
            )));
        }

        if let Some(key) = order.slot {
            self.release_slot_quietly(Some(key)).await;
            order.slot = None;
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        self.store.update(order.clone()).await?;

        tracing::info!("Order {} cancelled", order.order_number);
        self.notify(order.clone(), OrderStatus::Cancelled);
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.require_order(id).await
    }

    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        self.store.list(status).await
    }

    async fn require_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.store.find_by_id(id).await?.ok_or(OrderError::NotFound)
    }

    /// Take the mutex for one order, held across the whole read-check-update
    /// sequence of a lifecycle mutation. Without it two concurrent refunds
    /// could both pass the exit-state guard and both hit the gateway.
    async fn order_guard(&self, id: Uuid) -> OwnedMutexGuard<()> {
        if let Some(lock) = self.order_locks.read().await.get(&id) {
            return lock.clone().lock_owned().await;
        }
        let lock = self
            .order_locks
            .write()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Draw order numbers until one is unused; the suffix space makes more
    /// than one retry per call vanishingly rare
    async fn unique_order_number(
        &self,
        source: crate::models::OrderSource,
        date: chrono::NaiveDate,
    ) -> Result<String, OrderError> {
        for _ in 0..NUMBER_ATTEMPTS {
            let candidate = OrderNumberGenerator::generate(source, date);
            if !self.store.number_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(OrderError::Storage(
            "Could not allocate a unique order number".to_string(),
        ))
    }

    /// Compensating release; failures are logged, not propagated, because
    /// the caller is already unwinding a more important error
    async fn release_slot_quietly(&self, slot: Option<SlotKey>) {
        if let Some(key) = slot {
            if let Err(err) = self.slot_store.release(key).await {
                tracing::error!("Failed to release slot {} during rollback: {}", key, err);
            }
        }
    }

    async fn release_promo_quietly(&self, code: &Option<String>, customer_id: Option<Uuid>) {
        if let Some(code) = code {
            self.promo_repo.release_redemption(code, customer_id).await;
        }
    }

    /// Fire-and-forget notification; delivery never blocks or fails the
    /// lifecycle operation that triggered it
    fn notify(&self, order: Order, status: OrderStatus) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            notifier.notify_status_change(order, status).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{AutoApproveGateway, GatewayError, LogNotifier, LogRenderer};
    use crate::models::{CustomerRef, OrderSource, PaymentMethod};
    use crate::orders::models::OrderItemRequest;
    use crate::orders::repository::{InMemoryOrderStore, OrderStore};
    use crate::promos::{InMemoryPromoRepository, Promo, PromoType};
    use crate::scheduling::calendar::InMemoryCalendar;
    use crate::scheduling::error::SlotError;
    use crate::scheduling::models::Timeslot;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn slot_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
    }

    fn nine_am() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    fn pickup_slot_key() -> SlotKey {
        SlotKey {
            date: slot_date(),
            start_time: nine_am(),
            fulfillment_type: FulfillmentType::Pickup,
        }
    }

    struct TestHarness {
        service: OrderService,
        store: Arc<InMemoryOrderStore>,
        promo_repo: Arc<InMemoryPromoRepository>,
        slot_store: Arc<SlotCapacityStore>,
    }

    async fn harness() -> TestHarness {
        harness_with(InMemoryOrderStore::new(), Arc::new(AutoApproveGateway)).await
    }

    async fn harness_with(
        store: Arc<InMemoryOrderStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> TestHarness {
        let calendar = Arc::new(InMemoryCalendar::with_uniform_hours(
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        ));
        let slot_store = Arc::new(SlotCapacityStore::new(
            calendar,
            Duration::from_millis(250),
        ));
        slot_store
            .upsert_slots(vec![Timeslot {
                key: pickup_slot_key(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                max_capacity: 2,
                reserved_count: 0,
            }])
            .await
            .unwrap();

        let promo_repo = Arc::new(InMemoryPromoRepository::new());
        let mut promo = Promo::new("DESERT10", PromoType::FixedAmount, dec!(10.00));
        promo.min_order_amount = dec!(50.00);
        promo_repo.insert(promo).await;

        let service = OrderService::new(
            store.clone(),
            promo_repo.clone(),
            slot_store.clone(),
            gateway,
            Arc::new(LogNotifier),
            Arc::new(LogRenderer),
            Settings::default(),
        );
        TestHarness {
            service,
            store,
            promo_repo,
            slot_store,
        }
    }

    fn cart_request() -> CreateOrderRequest {
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id: Uuid::new_v4(),
                variant_id: None,
                quantity: 4,
                unit_price: dec!(15.00),
                addon_total: None,
                note: None,
            }],
            fulfillment_type: FulfillmentType::Delivery,
            payment_method: PaymentMethod::Card,
            source: OrderSource::Web,
            customer: CustomerRef::Account {
                customer_id: Uuid::new_v4(),
            },
            promo_code: None,
            scheduled_date: None,
            slot_start_time: None,
            tip_amount: None,
            capture_payment: false,
            production_notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_order_with_promo_prices_correctly() {
        let h = harness().await;
        let mut request = cart_request();
        request.promo_code = Some("desert10".to_string());

        let order = h.service.create_order(request).await.unwrap();

        assert_eq!(order.subtotal, dec!(60.00));
        assert_eq!(order.discount_amount, dec!(10.00));
        assert_eq!(order.tax_amount, dec!(4.13));
        assert_eq!(order.delivery_fee, dec!(5.00));
        assert_eq!(order.total_amount, dec!(59.13));
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.promo_code.as_deref(), Some("DESERT10"));
        assert!(order.order_number.starts_with("WEB-"));

        // Redemption committed
        assert_eq!(
            h.promo_repo
                .find_by_code("DESERT10")
                .await
                .unwrap()
                .used_count,
            1
        );
    }

    #[tokio::test]
    async fn test_create_order_reserves_slot() {
        let h = harness().await;
        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());

        let order = h.service.create_order(request).await.unwrap();
        assert_eq!(order.slot, Some(pickup_slot_key()));
        assert_eq!(
            h.slot_store.get(pickup_slot_key()).await.unwrap().reserved_count,
            1
        );
    }

    #[tokio::test]
    async fn test_walkin_with_slot_rejected() {
        let h = harness().await;
        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Walkin;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());

        let err = h.service.create_order(request).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_full_slot_rejects_creation_without_charging() {
        let h = harness().await;
        for _ in 0..2 {
            let mut request = cart_request();
            request.fulfillment_type = FulfillmentType::Pickup;
            request.scheduled_date = Some(slot_date());
            request.slot_start_time = Some(nine_am());
            h.service.create_order(request).await.unwrap();
        }

        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());
        request.promo_code = Some("DESERT10".to_string());

        let err = h.service.create_order(request).await.unwrap_err();
        assert!(matches!(err, OrderError::SlotUnavailable(_)));

        // Promo untouched: the slot failure aborted before redemption
        assert_eq!(
            h.promo_repo
                .find_by_code("DESERT10")
                .await
                .unwrap()
                .used_count,
            0
        );
    }

    /// Store wrapper whose insert always fails, for exercising rollback
    struct FailingStore {
        inner: Arc<InMemoryOrderStore>,
    }

    #[async_trait]
    impl OrderStore for FailingStore {
        async fn insert(&self, _order: Order) -> Result<(), OrderError> {
            Err(OrderError::Storage("disk on fire".to_string()))
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
            self.inner.find_by_id(id).await
        }
        async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
            self.inner.list(status).await
        }
        async fn update(&self, order: Order) -> Result<(), OrderError> {
            self.inner.update(order).await
        }
        async fn number_exists(&self, order_number: &str) -> Result<bool, OrderError> {
            self.inner.number_exists(order_number).await
        }
    }

    /// Gateway that counts captures and refunds
    struct RecordingGateway {
        captures: AtomicU32,
        refunds: AtomicU32,
    }

    impl RecordingGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                captures: AtomicU32::new(0),
                refunds: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn capture(&self, _n: &str, _a: Decimal) -> Result<(), GatewayError> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn refund(&self, _n: &str, _a: Decimal) -> Result<(), GatewayError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_persist_failure_unwinds_slot_promo_and_payment() {
        let gateway = RecordingGateway::new();
        let inner = InMemoryOrderStore::new();
        let h = harness_with(inner.clone(), gateway.clone()).await;

        // Swap in a service whose store always fails to persist
        let failing = Arc::new(FailingStore { inner });
        let service = OrderService::new(
            failing,
            h.promo_repo.clone(),
            h.slot_store.clone(),
            gateway.clone(),
            Arc::new(LogNotifier),
            Arc::new(LogRenderer),
            Settings::default(),
        );

        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());
        request.promo_code = Some("DESERT10".to_string());
        request.capture_payment = true;

        let err = service.create_order(request).await.unwrap_err();
        assert!(matches!(err, OrderError::Storage(_)));

        // All three effects rolled back
        assert_eq!(
            h.slot_store.get(pickup_slot_key()).await.unwrap().reserved_count,
            0
        );
        assert_eq!(
            h.promo_repo
                .find_by_code("DESERT10")
                .await
                .unwrap()
                .used_count,
            0
        );
        assert_eq!(gateway.captures.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_advance_walks_forward_path() {
        let h = harness().await;
        let order = h.service.create_order(cart_request()).await.unwrap();

        let expected = [
            OrderStatus::Confirmed,
            OrderStatus::InProduction,
            OrderStatus::Ready,
            OrderStatus::OutForDelivery,
            OrderStatus::Completed,
        ];
        for status in expected {
            let advanced = h.service.advance(order.id).await.unwrap();
            assert_eq!(advanced.status, status);
        }

        let err = h.service.advance(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_reschedule_moves_reservation() {
        let h = harness().await;
        let second_key = SlotKey {
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            ..pickup_slot_key()
        };
        h.slot_store
            .upsert_slots(vec![Timeslot {
                key: second_key,
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                max_capacity: 2,
                reserved_count: 0,
            }])
            .await
            .unwrap();

        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());
        let order = h.service.create_order(request).await.unwrap();

        let updated = h
            .service
            .reschedule(
                order.id,
                RescheduleRequest {
                    new_date: slot_date(),
                    new_slot_start_time: Some(second_key.start_time),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.slot, Some(second_key));
        assert_eq!(h.slot_store.get(pickup_slot_key()).await.unwrap().reserved_count, 0);
        assert_eq!(h.slot_store.get(second_key).await.unwrap().reserved_count, 1);
    }

    #[tokio::test]
    async fn test_reschedule_to_full_slot_keeps_original() {
        let h = harness().await;
        let full_key = SlotKey {
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            ..pickup_slot_key()
        };
        h.slot_store
            .upsert_slots(vec![Timeslot {
                key: full_key,
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                max_capacity: 0,
                reserved_count: 0,
            }])
            .await
            .unwrap();

        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());
        let order = h.service.create_order(request).await.unwrap();

        let err = h
            .service
            .reschedule(
                order.id,
                RescheduleRequest {
                    new_date: slot_date(),
                    new_slot_start_time: Some(full_key.start_time),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::SlotUnavailable(SlotError::Full(_))));

        // Original reservation intact, stored order unchanged
        assert_eq!(h.slot_store.get(pickup_slot_key()).await.unwrap().reserved_count, 1);
        let stored = h.service.get_order(order.id).await.unwrap();
        assert_eq!(stored.slot, Some(pickup_slot_key()));
    }

    #[tokio::test]
    async fn test_reschedule_without_slot_releases() {
        let h = harness().await;
        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());
        let order = h.service.create_order(request).await.unwrap();

        let updated = h
            .service
            .reschedule(
                order.id,
                RescheduleRequest {
                    new_date: slot_date(),
                    new_slot_start_time: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.slot, None);
        assert_eq!(h.slot_store.get(pickup_slot_key()).await.unwrap().reserved_count, 0);
    }

    #[tokio::test]
    async fn test_walkin_reschedule_rejected() {
        let h = harness().await;
        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Walkin;
        let order = h.service.create_order(request).await.unwrap();

        let err = h
            .service
            .reschedule(
                order.id,
                RescheduleRequest {
                    new_date: slot_date(),
                    new_slot_start_time: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_refund_is_terminal_and_idempotent() {
        let gateway = RecordingGateway::new();
        let h = harness_with(InMemoryOrderStore::new(), gateway.clone()).await;
        let order = h.service.create_order(cart_request()).await.unwrap();

        let refunded = h
            .service
            .refund(
                order.id,
                RefundRequest {
                    amount: None,
                    reason: "cake arrived damaged".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(refunded.refunded_amount, order.total_amount);

        // Second attempt hits the terminal guard before any gateway call
        let err = h
            .service
            .refund(
                order.id,
                RefundRequest {
                    amount: None,
                    reason: "retry".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 1);
    }

    /// Gateway whose refund takes a while, widening the window in which a
    /// second refund could slip past the exit-state guard
    struct SlowRefundGateway {
        refunds: AtomicU32,
    }

    #[async_trait]
    impl PaymentGateway for SlowRefundGateway {
        async fn capture(&self, _n: &str, _a: Decimal) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn refund(&self, _n: &str, _a: Decimal) -> Result<(), GatewayError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.refunds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refunds_charge_gateway_once() {
        let gateway = Arc::new(SlowRefundGateway {
            refunds: AtomicU32::new(0),
        });
        let h = harness_with(InMemoryOrderStore::new(), gateway.clone()).await;
        let order = h.service.create_order(cart_request()).await.unwrap();

        let first = h.service.refund(
            order.id,
            RefundRequest {
                amount: None,
                reason: "cake arrived damaged".to_string(),
            },
        );
        let second = h.service.refund(
            order.id,
            RefundRequest {
                amount: None,
                reason: "cake arrived damaged".to_string(),
            },
        );
        let (a, b) = tokio::join!(first, second);

        // Exactly one wins; the loser sees Refunded and never hits the gateway
        assert!(a.is_ok() ^ b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(OrderError::InvalidTransition(_))));
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 1);

        let stored = h.service.get_order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Refunded);
        assert_eq!(stored.refunded_amount, order.total_amount);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_advances_each_take_one_step() {
        let h = harness().await;
        let order = h.service.create_order(cart_request()).await.unwrap();

        let (a, b) = tokio::join!(h.service.advance(order.id), h.service.advance(order.id));
        assert!(a.is_ok() && b.is_ok());

        // Serialized, so neither step is lost: New -> Confirmed -> InProduction
        let stored = h.service.get_order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::InProduction);
    }

    #[tokio::test]
    async fn test_partial_refund_validated_against_total() {
        let h = harness().await;
        let order = h.service.create_order(cart_request()).await.unwrap();

        let err = h
            .service
            .refund(
                order.id,
                RefundRequest {
                    amount: Some(order.total_amount + dec!(1.00)),
                    reason: "too much".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let refunded = h
            .service
            .refund(
                order.id,
                RefundRequest {
                    amount: Some(dec!(5.00)),
                    reason: "one cupcake missing".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(refunded.refunded_amount, dec!(5.00));
        assert_eq!(refunded.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_cancel_releases_slot() {
        let h = harness().await;
        let mut request = cart_request();
        request.fulfillment_type = FulfillmentType::Pickup;
        request.scheduled_date = Some(slot_date());
        request.slot_start_time = Some(nine_am());
        let order = h.service.create_order(request).await.unwrap();

        let cancelled = h.service.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(h.slot_store.get(pickup_slot_key()).await.unwrap().reserved_count, 0);

        let err = h.service.cancel(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_free_item_comps_cheapest_unit() {
        let h = harness().await;
        h.promo_repo
            .insert(Promo::new("TREAT", PromoType::FreeItem, Decimal::ZERO))
            .await;

        let mut request = cart_request();
        request.items.push(OrderItemRequest {
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 1,
            unit_price: dec!(3.50),
            addon_total: None,
            note: None,
        });
        request.promo_code = Some("TREAT".to_string());

        let order = h.service.create_order(request).await.unwrap();
        assert_eq!(order.discount_amount, dec!(3.50));
    }

    #[tokio::test]
    async fn test_list_orders_by_status() {
        let h = harness().await;
        let first = h.service.create_order(cart_request()).await.unwrap();
        h.service.create_order(cart_request()).await.unwrap();
        h.service.advance(first.id).await.unwrap();

        assert_eq!(h.service.list_orders(None).await.unwrap().len(), 2);
        assert_eq!(
            h.service
                .list_orders(Some(OrderStatus::Confirmed))
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(h.store.list(Some(OrderStatus::New)).await.unwrap().len(), 1);
    }
}
