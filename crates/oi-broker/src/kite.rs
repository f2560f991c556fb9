//! Kite Connect integration for live trading and historical bars.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use oi_core::error::{BrokerError, DataError};
use oi_core::traits::{Broker, DataSource};
use oi_core::types::{
    Bar, Fill, Instrument, InstrumentInfo, InstrumentMaster, Order, OrderRequest, OrderStatus,
    OrderType, Position, Product, Side, Timeframe,
};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const CANDLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kite Connect API configuration.
#[derive(Debug, Clone)]
pub struct KiteConfig {
    pub api_key: String,
    pub access_token: String,
    pub base_url: String,
    pub exchange: String,
    pub product: Product,
    /// Offset of exchange time from UTC, used for query ranges and order timestamps.
    pub utc_offset_minutes: i32,
}

impl KiteConfig {
    pub fn new(api_key: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            access_token: access_token.into(),
            base_url: "https://api.kite.trade".to_string(),
            exchange: "NFO".to_string(),
            product: Product::Intraday,
            utc_offset_minutes: 330,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.product = product;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    fn offset(&self) -> Result<FixedOffset, BrokerError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            BrokerError::Configuration(format!(
                "utc offset of {} minutes is out of range",
                self.utc_offset_minutes
            ))
        })
    }
}

/// Every Kite response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct KiteEnvelope<T> {
    status: String,
    data: Option<T>,
    message: Option<String>,
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KiteCandles {
    candles: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct KiteOrderId {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct KiteOrder {
    order_id: String,
    tradingsymbol: String,
    transaction_type: String,
    #[serde(default)]
    order_type: String,
    #[serde(default)]
    product: String,
    quantity: Decimal,
    #[serde(default)]
    filled_quantity: Decimal,
    #[serde(default)]
    average_price: Decimal,
    status: String,
    status_message: Option<String>,
    order_timestamp: Option<String>,
    exchange_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KitePositions {
    net: Vec<KitePosition>,
}

#[derive(Debug, Deserialize)]
struct KitePosition {
    tradingsymbol: String,
    quantity: Decimal,
    average_price: Decimal,
    #[serde(default)]
    last_price: Decimal,
    #[serde(default)]
    realised: Decimal,
}

/// Map a Kite error to a broker error.
///
/// Kite reports the failure class in `error_type`; the HTTP status is the
/// fallback when it is missing.
fn map_api_error(status: StatusCode, error_type: Option<&str>, message: String) -> BrokerError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return BrokerError::RateLimited { retry_after_secs: 1 };
    }
    match error_type {
        Some("TokenException") | Some("PermissionException") => {
            BrokerError::AuthenticationError(message)
        }
        Some("OrderException") | Some("MarginException") | Some("InputException") => {
            BrokerError::OrderRejected(message)
        }
        Some("NetworkException") => BrokerError::Connection(message),
        Some(other) => BrokerError::ApiError(format!("{other}: {message}")),
        None if status == StatusCode::FORBIDDEN => BrokerError::AuthenticationError(message),
        None => BrokerError::ApiError(format!("{status}: {message}")),
    }
}

/// Decode a response body into its payload.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, BrokerError> {
    let envelope: KiteEnvelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(BrokerError::ApiError(e.to_string())),
        Err(_) => return Err(map_api_error(status, None, body.to_string())),
    };

    if envelope.status != "success" || !status.is_success() {
        let message = envelope.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(map_api_error(status, envelope.error_type.as_deref(), message));
    }

    envelope
        .data
        .ok_or_else(|| BrokerError::ApiError("response carried no data".to_string()))
}

fn parse_number(value: &Value, field: &'static str) -> Result<f64, DataError> {
    value
        .as_f64()
        .ok_or_else(|| DataError::ParseError(format!("candle {field} is not a number: {value}")))
}

/// Parse one `[timestamp, open, high, low, close, volume, oi]` candle.
///
/// Candles without the open-interest column read as zero open interest.
fn parse_candle(candle: &[Value]) -> Result<Bar, DataError> {
    if candle.len() < 6 {
        return Err(DataError::ParseError(format!(
            "candle has {} fields, expected at least 6",
            candle.len()
        )));
    }

    let raw_ts = candle[0]
        .as_str()
        .ok_or_else(|| DataError::ParseError("candle timestamp is not a string".to_string()))?;
    let timestamp = DateTime::parse_from_str(raw_ts, CANDLE_TIMESTAMP_FORMAT)
        .map_err(|e| DataError::ParseError(format!("candle timestamp '{raw_ts}': {e}")))?
        .timestamp_millis();

    let open_interest = match candle.get(6) {
        Some(value) => parse_number(value, "oi")? as u64,
        None => 0,
    };

    let bar = Bar::new(
        timestamp,
        parse_number(&candle[1], "open")?,
        parse_number(&candle[2], "high")?,
        parse_number(&candle[3], "low")?,
        parse_number(&candle[4], "close")?,
        parse_number(&candle[5], "volume")? as u64,
        open_interest,
    );
    bar.validate()?;
    Ok(bar)
}

fn parse_status(status: &str, filled: Decimal) -> OrderStatus {
    match status {
        "COMPLETE" => OrderStatus::Filled,
        "REJECTED" => OrderStatus::Rejected,
        "CANCELLED" => OrderStatus::Canceled,
        _ if filled > Decimal::ZERO => OrderStatus::PartiallyFilled,
        _ => OrderStatus::Pending,
    }
}

fn parse_local_timestamp(raw: Option<&str>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw?, QUERY_TIMESTAMP_FORMAT).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_order(order: KiteOrder, offset: FixedOffset) -> Result<Order, BrokerError> {
    let side = match order.transaction_type.as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        other => return Err(BrokerError::ApiError(format!("Unknown side: {other}"))),
    };
    let order_type = match order.order_type.as_str() {
        "LIMIT" => OrderType::Limit,
        _ => OrderType::Market,
    };
    let status = parse_status(&order.status, order.filled_quantity);

    let created_at =
        parse_local_timestamp(order.order_timestamp.as_deref(), offset).unwrap_or_else(Utc::now);
    let updated_at =
        parse_local_timestamp(order.exchange_timestamp.as_deref(), offset).unwrap_or(created_at);

    let mut result = Order {
        id: order.order_id,
        symbol: order.tradingsymbol,
        side,
        order_type,
        product: order.product.parse().unwrap_or_default(),
        quantity: order.quantity,
        limit_price: None,
        status: OrderStatus::Pending,
        status_message: order.status_message,
        filled_quantity: Decimal::ZERO,
        filled_avg_price: None,
        fills: Vec::new(),
        created_at,
        updated_at,
        filled_at: None,
    };

    if order.filled_quantity > Decimal::ZERO {
        let fill = Fill {
            id: format!("{}-fill", result.id),
            order_id: result.id.clone(),
            quantity: order.filled_quantity,
            price: order.average_price,
            commission: Decimal::ZERO,
            timestamp: updated_at,
        };
        result.add_fill(fill);
    }
    result.status = status;
    Ok(result)
}

fn parse_position(position: KitePosition) -> Position {
    Position {
        symbol: position.tradingsymbol,
        quantity: position.quantity,
        avg_entry_price: position.average_price,
        current_price: position.last_price,
        entry_time: Utc::now(),
        realized_pnl: position.realised,
    }
}

/// One row of the `/instruments` CSV dump.
#[derive(Debug, Deserialize)]
struct KiteInstrumentRow {
    instrument_token: u64,
    tradingsymbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    expiry: String,
    #[serde(default)]
    strike: f64,
    #[serde(default)]
    lot_size: u32,
    instrument_type: String,
    exchange: String,
}

/// Parse the instrument master CSV (`/instruments/{exchange}` or a saved
/// copy of it).
pub fn parse_instrument_master(body: &str) -> Result<InstrumentMaster, BrokerError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut entries = Vec::new();
    for (i, row) in reader.deserialize::<KiteInstrumentRow>().enumerate() {
        let row = row.map_err(|e| BrokerError::ApiError(format!("instrument row {}: {e}", i + 2)))?;
        let expiry = if row.expiry.is_empty() {
            None
        } else {
            Some(NaiveDate::parse_from_str(&row.expiry, "%Y-%m-%d").map_err(|e| {
                BrokerError::ApiError(format!("instrument row {}: bad expiry '{}': {e}", i + 2, row.expiry))
            })?)
        };
        entries.push(InstrumentInfo {
            instrument_token: row.instrument_token,
            symbol: row.tradingsymbol,
            name: row.name,
            exchange: row.exchange,
            expiry,
            strike: row.strike,
            lot_size: row.lot_size,
            instrument_type: row.instrument_type,
        });
    }
    Ok(InstrumentMaster::new(entries))
}

/// Kite Connect client.
pub struct KiteBroker {
    config: KiteConfig,
    client: Client,
}

impl KiteBroker {
    /// Create a new client. Fails when credentials are missing.
    pub fn new(config: KiteConfig) -> Result<Self, BrokerError> {
        if config.api_key.is_empty() || config.access_token.is_empty() {
            return Err(BrokerError::Configuration(
                "api_key and access_token are required".into(),
            ));
        }
        config.offset()?;

        let mut headers = header::HeaderMap::new();
        headers.insert("X-Kite-Version", header::HeaderValue::from_static("3"));
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!(
                "token {}:{}",
                config.api_key, config.access_token
            ))
            .map_err(|e| BrokerError::Configuration(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &KiteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BrokerError> {
        let resp = request
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        decode(status, &body)
    }

    /// Download the instrument master for `exchange`, or the configured
    /// exchange when `None`.
    ///
    /// The dump is CSV rather than the usual JSON envelope; only error
    /// responses carry the envelope.
    pub async fn instruments(&self, exchange: Option<&str>) -> Result<InstrumentMaster, BrokerError> {
        let exchange = exchange.unwrap_or(self.config.exchange.as_str());
        let resp = self
            .client
            .get(self.url(&format!("/instruments/{exchange}")))
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        if !status.is_success() {
            decode::<Value>(status, &body)?;
        }

        let master = parse_instrument_master(&body)?;
        info!(exchange, count = master.len(), "Loaded instrument master");
        Ok(master)
    }

    /// Fetch candles with open interest for an instrument.
    pub async fn get_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, BrokerError> {
        let offset = self.config.offset()?;
        let url = self.url(&format!(
            "/instruments/historical/{}/{}",
            instrument.instrument_token,
            timeframe.api_name()
        ));
        let params = [
            ("from", start.with_timezone(&offset).format(QUERY_TIMESTAMP_FORMAT).to_string()),
            ("to", end.with_timezone(&offset).format(QUERY_TIMESTAMP_FORMAT).to_string()),
            ("oi", "1".to_string()),
        ];

        let data: KiteCandles = self.send(self.client.get(&url).query(&params)).await?;
        let bars = data
            .candles
            .iter()
            .map(|candle| parse_candle(candle))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BrokerError::ApiError(e.to_string()))?;

        debug!(symbol = %instrument.symbol, count = bars.len(), "Fetched candles");
        Ok(bars)
    }
}

#[async_trait]
impl Broker for KiteBroker {
    async fn place_order(&self, request: OrderRequest) -> Result<Order, BrokerError> {
        let url = self.url("/orders/regular");
        let mut form = vec![
            ("tradingsymbol", request.symbol.clone()),
            ("exchange", self.config.exchange.clone()),
            ("transaction_type", request.side.to_string()),
            ("order_type", request.order_type.to_string()),
            ("quantity", request.quantity.trunc().to_string()),
            ("product", request.product.code().to_string()),
            ("validity", "DAY".to_string()),
        ];
        if let Some(limit) = request.limit_price {
            form.push(("price", limit.to_string()));
        }
        if let Some(tag) = &request.tag {
            form.push(("tag", tag.clone()));
        }

        let placed: KiteOrderId = self.send(self.client.post(&url).form(&form)).await?;
        info!(
            order_id = %placed.order_id,
            symbol = %request.symbol,
            side = %request.side,
            quantity = %request.quantity,
            "Order placed"
        );
        Ok(Order::with_id(placed.order_id, &request))
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        let url = self.url(&format!("/orders/{order_id}"));
        let history: Vec<KiteOrder> = self.send(self.client.get(&url)).await?;
        let latest = history
            .into_iter()
            .last()
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;
        parse_order(latest, self.config.offset()?)
    }

    async fn get_orders(&self) -> Result<Vec<Order>, BrokerError> {
        let offset = self.config.offset()?;
        let orders: Vec<KiteOrder> = self.send(self.client.get(self.url("/orders"))).await?;
        orders.into_iter().map(|o| parse_order(o, offset)).collect()
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let data: KitePositions = self
            .send(self.client.get(self.url("/portfolio/positions")))
            .await?;
        Ok(data
            .net
            .into_iter()
            .filter(|p| p.quantity != Decimal::ZERO)
            .map(parse_position)
            .collect())
    }

    fn name(&self) -> &str {
        "Kite"
    }
}

#[async_trait]
impl DataSource for KiteBroker {
    async fn get_historical_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError> {
        self.get_bars(instrument, timeframe, start, end)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))
    }

    fn name(&self) -> &str {
        "Kite"
    }
}
