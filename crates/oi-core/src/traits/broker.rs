//! Order-execution collaborator.

use crate::error::BrokerError;
use crate::types::{Order, OrderRequest, Position};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Accepts market orders and reports their outcome.
///
/// Implementations own the broker session; a process holds one handle.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Place an order. The returned order is usually still pending.
    async fn place_order(&self, request: OrderRequest) -> Result<Order, BrokerError>;

    /// Get the latest state of an order.
    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError>;

    /// Get all orders of the session.
    async fn get_orders(&self) -> Result<Vec<Order>, BrokerError>;

    /// Get all open positions.
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Latest traded price seen by the driver. Simulated brokers fill
    /// market orders at it; real venues ignore it.
    fn observe_price(&self, _symbol: &str, _price: Decimal) {}

    /// Get the broker name.
    fn name(&self) -> &str;
}
