//! Candle intervals as named by the broker's historical-data API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "minute")]
    Minute1,
    /// Open-interest refresh cadence on NSE derivatives
    #[serde(rename = "3minute")]
    #[default]
    Minute3,
    #[serde(rename = "5minute")]
    Minute5,
    #[serde(rename = "10minute")]
    Minute10,
    #[serde(rename = "15minute")]
    Minute15,
    #[serde(rename = "30minute")]
    Minute30,
    #[serde(rename = "60minute")]
    Minute60,
    #[serde(rename = "day")]
    Day,
}

impl Timeframe {
    /// Duration of one candle in seconds.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute3 => 180,
            Timeframe::Minute5 => 300,
            Timeframe::Minute10 => 600,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1800,
            Timeframe::Minute60 => 3600,
            Timeframe::Day => 86400,
        }
    }

    /// Duration of one candle in minutes.
    pub fn as_minutes(&self) -> u64 {
        self.as_secs() / 60
    }

    /// Name used in the historical-data endpoint path.
    pub fn api_name(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "minute",
            Timeframe::Minute3 => "3minute",
            Timeframe::Minute5 => "5minute",
            Timeframe::Minute10 => "10minute",
            Timeframe::Minute15 => "15minute",
            Timeframe::Minute30 => "30minute",
            Timeframe::Minute60 => "60minute",
            Timeframe::Day => "day",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minute" | "1minute" | "1m" => Ok(Timeframe::Minute1),
            "3minute" | "3m" => Ok(Timeframe::Minute3),
            "5minute" | "5m" => Ok(Timeframe::Minute5),
            "10minute" | "10m" => Ok(Timeframe::Minute10),
            "15minute" | "15m" => Ok(Timeframe::Minute15),
            "30minute" | "30m" => Ok(Timeframe::Minute30),
            "60minute" | "60m" | "1h" => Ok(Timeframe::Minute60),
            "day" | "1d" => Ok(Timeframe::Day),
            _ => Err(format!("Unknown interval: {}", s)),
        }
    }
}
