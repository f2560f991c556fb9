//! Paper trading broker for backtesting and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oi_core::error::BrokerError;
use oi_core::traits::Broker;
use oi_core::types::{Fill, Order, OrderRequest, OrderStatus, OrderType, Portfolio, Position, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// When a paper order gets its fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Orders stay pending until [`PaperBroker::execute_at_price`] is called.
    /// The backtest uses this to fill at the next bar's open.
    #[default]
    Deferred,
    /// Market orders fill on placement at the last price set with
    /// [`PaperBroker::update_price`].
    Immediate,
}

/// Paper trading broker for simulation.
pub struct PaperBroker {
    portfolio: Arc<Mutex<Portfolio>>,
    orders: Arc<Mutex<HashMap<String, Order>>>,
    last_prices: Arc<Mutex<HashMap<String, Decimal>>>,
    reject_next: Arc<Mutex<Option<String>>>,
    commission_pct: Decimal,
    fill_mode: FillMode,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PaperBroker {
    /// Create a new paper broker with initial capital and no commission.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            portfolio: Arc::new(Mutex::new(Portfolio::new(initial_capital))),
            orders: Arc::new(Mutex::new(HashMap::new())),
            last_prices: Arc::new(Mutex::new(HashMap::new())),
            reject_next: Arc::new(Mutex::new(None)),
            commission_pct: Decimal::ZERO,
            fill_mode: FillMode::Deferred,
        }
    }

    /// Set commission as a fraction of traded value (0.001 = 0.1%).
    pub fn with_commission_pct(mut self, commission_pct: Decimal) -> Self {
        self.commission_pct = commission_pct;
        self
    }

    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    pub fn commission_pct(&self) -> Decimal {
        self.commission_pct
    }

    /// Reject the next placed order with `reason`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        *lock(&self.reject_next) = Some(reason.into());
    }

    /// Record the latest traded price and mark any open position to it.
    pub fn update_price(&self, symbol: &str, price: Decimal) {
        lock(&self.last_prices).insert(symbol.to_string(), price);
        lock(&self.portfolio).mark(symbol, price);
    }

    /// Fill a pending order in full at `market_price`.
    ///
    /// Terminal orders are returned unchanged. A buy the cash cannot cover
    /// comes back with status [`OrderStatus::Rejected`].
    pub fn execute_at_price(
        &self,
        order_id: &str,
        market_price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Order, BrokerError> {
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Ok(order.clone());
        }

        if order.order_type == OrderType::Limit {
            if let Some(limit) = order.limit_price {
                let crosses = match order.side {
                    Side::Buy => market_price <= limit,
                    Side::Sell => market_price >= limit,
                };
                if !crosses {
                    return Ok(order.clone());
                }
            }
        }

        let quantity = order.remaining_quantity();
        let value = market_price * quantity;
        let commission = value * self.commission_pct;

        let mut portfolio = lock(&self.portfolio);
        if order.side == Side::Buy && value + commission > portfolio.cash {
            let message = BrokerError::InsufficientFunds {
                required: value + commission,
                available: portfolio.cash,
            }
            .to_string();
            order.fail(OrderStatus::Rejected, message);
            debug!(order_id, "Paper order rejected for insufficient cash");
            return Ok(order.clone());
        }

        order.add_fill(Fill {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            quantity,
            price: market_price,
            commission,
            timestamp: at,
        });

        portfolio.apply_fill(&order.symbol, order.side, quantity, market_price, commission, at);
        drop(portfolio);
        lock(&self.last_prices).insert(order.symbol.clone(), market_price);

        debug!(
            order_id,
            symbol = %order.symbol,
            side = %order.side,
            price = %market_price,
            "Paper order filled"
        );
        Ok(order.clone())
    }

    /// Cancel a non-terminal order.
    pub fn cancel_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(BrokerError::OrderRejected("Order already terminal".to_string()));
        }
        order.fail(OrderStatus::Canceled, "canceled");
        Ok(order.clone())
    }

    /// Get a snapshot of the portfolio.
    pub fn portfolio_snapshot(&self) -> Portfolio {
        lock(&self.portfolio).clone()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn place_order(&self, request: OrderRequest) -> Result<Order, BrokerError> {
        if request.quantity <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }

        let mut order = Order::from_request(&request);
        if let Some(reason) = lock(&self.reject_next).take() {
            order.fail(OrderStatus::Rejected, reason);
        }

        let order_id = order.id.clone();
        lock(&self.orders).insert(order_id.clone(), order.clone());

        if order.status.is_terminal() || self.fill_mode == FillMode::Deferred {
            return Ok(order);
        }

        let last_price = lock(&self.last_prices).get(&request.symbol).copied();
        match last_price {
            Some(price) if request.order_type == OrderType::Market => {
                self.execute_at_price(&order_id, price, Utc::now())
            }
            _ => Ok(order),
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        lock(&self.orders)
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))
    }

    async fn get_orders(&self) -> Result<Vec<Order>, BrokerError> {
        let mut orders: Vec<Order> = lock(&self.orders).values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        Ok(lock(&self.portfolio).positions.values().cloned().collect())
    }

    fn observe_price(&self, symbol: &str, price: Decimal) {
        self.update_price(symbol, price);
    }

    fn name(&self) -> &str {
        "Paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_deferred_fill_at_next_price() {
        let broker = PaperBroker::new(dec!(100000)).with_commission_pct(dec!(0.001));

        let request = OrderRequest::market("NIFTY24JUL24000CE", Side::Buy, dec!(25));
        let order = broker.place_order(request).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let filled = broker.execute_at_price(&order.id, dec!(100), Utc::now()).unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(filled.commission(), dec!(2.5));

        let portfolio = broker.portfolio_snapshot();
        assert_eq!(portfolio.cash, dec!(100000) - dec!(2500) - dec!(2.5));
        assert!(portfolio.positions.contains_key("NIFTY24JUL24000CE"));
    }

    #[tokio::test]
    async fn test_round_trip_closes_position() {
        let broker = PaperBroker::new(dec!(100000));

        let buy = broker
            .place_order(OrderRequest::market("X", Side::Buy, dec!(25)))
            .await
            .unwrap();
        broker.execute_at_price(&buy.id, dec!(100), Utc::now()).unwrap();

        let sell = broker
            .place_order(OrderRequest::market("X", Side::Sell, dec!(25)))
            .await
            .unwrap();
        broker.execute_at_price(&sell.id, dec!(110), Utc::now()).unwrap();

        assert!(broker.get_positions().await.unwrap().is_empty());
        let portfolio = broker.portfolio_snapshot();
        assert_eq!(portfolio.total_realized_pnl, dec!(250));
        assert_eq!(portfolio.cash, dec!(100250));
    }

    #[tokio::test]
    async fn test_insufficient_cash_rejects() {
        let broker = PaperBroker::new(dec!(1000));
        let order = broker
            .place_order(OrderRequest::market("X", Side::Buy, dec!(25)))
            .await
            .unwrap();

        let result = broker.execute_at_price(&order.id, dec!(100), Utc::now()).unwrap();
        assert_eq!(result.status, OrderStatus::Rejected);
        assert!(result.status_message.unwrap().contains("Insufficient funds"));
        assert_eq!(broker.portfolio_snapshot().cash, dec!(1000));
    }

    #[tokio::test]
    async fn test_forced_rejection() {
        let broker = PaperBroker::new(dec!(100000));
        broker.reject_next("margin exceeded");

        let order = broker
            .place_order(OrderRequest::market("X", Side::Buy, dec!(25)))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.status_message.as_deref(), Some("margin exceeded"));

        let next = broker
            .place_order(OrderRequest::market("X", Side::Buy, dec!(25)))
            .await
            .unwrap();
        assert_eq!(next.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_immediate_mode_fills_at_last_price() {
        let broker = PaperBroker::new(dec!(100000)).with_fill_mode(FillMode::Immediate);

        let unpriced = broker
            .place_order(OrderRequest::market("X", Side::Buy, dec!(25)))
            .await
            .unwrap();
        assert_eq!(unpriced.status, OrderStatus::Pending);

        broker.update_price("Y", dec!(42));
        let order = broker
            .place_order(OrderRequest::market("Y", Side::Buy, dec!(25)))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_avg_price, Some(dec!(42)));
    }

    #[tokio::test]
    async fn test_cancel_pending_order() {
        let broker = PaperBroker::new(dec!(100000));
        let order = broker
            .place_order(OrderRequest::market("X", Side::Buy, dec!(25)))
            .await
            .unwrap();

        let canceled = broker.cancel_order(&order.id).unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert!(broker.cancel_order(&order.id).is_err());

        let untouched = broker.execute_at_price(&order.id, dec!(100), Utc::now()).unwrap();
        assert_eq!(untouched.status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let broker = PaperBroker::new(dec!(100000));
        let result = broker
            .place_order(OrderRequest::market("X", Side::Buy, Decimal::ZERO))
            .await;
        assert!(matches!(result, Err(BrokerError::OrderRejected(_))));
    }
}
