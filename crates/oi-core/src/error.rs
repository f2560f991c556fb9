//! Error types for the signal engine.

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Broker errors: network, auth and API failures during data fetch or order placement.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error: {0}")]
    ApiError(String),
}

/// Bar ingestion errors.
///
/// Raised when bars are loaded, never silently defaulted. The single
/// exception is a missing open-interest column, which reads as zero.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Malformed field '{field}' at line {line}: {message}")]
    Malformed {
        line: u64,
        field: &'static str,
        message: String,
    },

    #[error("Missing required column '{column}' at line {line}")]
    MissingColumn { line: u64, column: &'static str },

    #[error("Out-of-order timestamp at line {line}: {timestamp} does not follow {previous}")]
    OutOfOrder {
        line: u64,
        timestamp: i64,
        previous: i64,
    },

    #[error("Invalid bar at {timestamp}: {reason}")]
    InvalidBar { timestamp: i64, reason: String },

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Index {index} out of range for history of {len} bars")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Out-of-order sample: {timestamp} does not follow {previous}")]
    OutOfOrder { timestamp: i64, previous: i64 },
}
