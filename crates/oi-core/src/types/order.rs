//! Order types and structures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side. Only long positions are taken, so BUY opens and SELL closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Margin product the order is placed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Product {
    /// Intraday, squared off by the broker at session end
    #[default]
    #[serde(rename = "MIS")]
    Intraday,
    /// Carry-forward for derivatives
    #[serde(rename = "NRML")]
    Normal,
}

impl Product {
    /// Broker product code.
    pub fn code(&self) -> &'static str {
        match self {
            Product::Intraday => "MIS",
            Product::Normal => "NRML",
        }
    }
}

impl std::str::FromStr for Product {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MIS" | "INTRADAY" => Ok(Product::Intraday),
            "NRML" | "NORMAL" => Ok(Product::Normal),
            _ => Err(format!("Unknown product: {}", s)),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Submitted, waiting for the exchange
    Pending,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }

    /// Terminal without execution.
    pub fn is_failed(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Rejected)
    }
}

/// Order request for submitting new orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Trading symbol, e.g. `FINNIFTY24JUL24000CE`
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub product: Product,
    /// Contracts to trade (lots times lot size)
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    /// Free-form tag echoed back by the broker
    pub tag: Option<String>,
}

impl OrderRequest {
    /// Create an intraday market order request.
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            product: Product::Intraday,
            quantity,
            limit_price: None,
            tag: None,
        }
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.product = product;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// A partial or complete execution of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub order_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Order with status and fill information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Broker order id
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub product: Product,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    /// Broker's explanation for rejections and cancellations
    pub status_message: Option<String>,
    pub filled_quantity: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub fills: Vec<Fill>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new pending order from a request with a generated id.
    pub fn from_request(request: &OrderRequest) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), request)
    }

    /// Create a new pending order from a request with a broker-assigned id.
    pub fn with_id(id: impl Into<String>, request: &OrderRequest) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            product: request.product,
            quantity: request.quantity,
            limit_price: request.limit_price,
            status: OrderStatus::Pending,
            status_message: None,
            filled_quantity: Decimal::ZERO,
            filled_avg_price: None,
            fills: Vec::new(),
            created_at: now,
            updated_at: now,
            filled_at: None,
        }
    }

    /// Get the remaining quantity to be filled.
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Commission paid across all fills.
    pub fn commission(&self) -> Decimal {
        self.fills.iter().map(|f| f.commission).sum()
    }

    /// Add a fill to the order.
    pub fn add_fill(&mut self, fill: Fill) {
        let total_qty = self.filled_quantity + fill.quantity;
        let total_value = self.filled_avg_price.unwrap_or(Decimal::ZERO) * self.filled_quantity
            + fill.price * fill.quantity;

        if total_qty > Decimal::ZERO {
            self.filled_avg_price = Some(total_value / total_qty);
        }
        self.filled_quantity = total_qty;
        self.updated_at = fill.timestamp;
        let filled_at = fill.timestamp;
        self.fills.push(fill);

        if self.filled_quantity >= self.quantity {
            self.status = OrderStatus::Filled;
            self.filled_at = Some(filled_at);
        } else {
            self.status = OrderStatus::PartiallyFilled;
        }
    }

    /// Move to a failed terminal state.
    pub fn fail(&mut self, status: OrderStatus, message: impl Into<String>) {
        self.status = status;
        self.status_message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_request_market_defaults_to_intraday() {
        let request = OrderRequest::market("FINNIFTY24000CE", Side::Buy, dec!(50));
        assert_eq!(request.order_type, OrderType::Market);
        assert_eq!(request.product, Product::Intraday);
        assert_eq!(request.product.code(), "MIS");
        assert_eq!(request.quantity, dec!(50));
    }

    #[test]
    fn test_order_add_fill() {
        let request = OrderRequest::market("X", Side::Buy, dec!(50));
        let mut order = Order::from_request(&request);
        assert_eq!(order.status, OrderStatus::Pending);

        order.add_fill(Fill {
            id: "f1".to_string(),
            order_id: order.id.clone(),
            quantity: dec!(25),
            price: dec!(100),
            commission: dec!(2.5),
            timestamp: Utc::now(),
        });
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        order.add_fill(Fill {
            id: "f2".to_string(),
            order_id: order.id.clone(),
            quantity: dec!(25),
            price: dec!(102),
            commission: dec!(2.55),
            timestamp: Utc::now(),
        });
        assert!(order.is_filled());
        assert_eq!(order.filled_avg_price, Some(dec!(101)));
        assert_eq!(order.commission(), dec!(5.05));
    }

    #[test]
    fn test_failed_statuses() {
        assert!(OrderStatus::Rejected.is_failed());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Filled.is_failed());
        assert!(!OrderStatus::Pending.is_terminal());
    }
}
