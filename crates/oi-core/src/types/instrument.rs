use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A tradable contract as the broker identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Trading symbol used for order placement
    pub symbol: String,
    /// Numeric token used for historical data requests
    pub instrument_token: u64,
    pub exchange: String,
    /// Contracts per lot
    pub lot_size: u32,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, instrument_token: u64, lot_size: u32) -> Self {
        Self {
            symbol: symbol.into(),
            instrument_token,
            exchange: "NFO".to_string(),
            lot_size,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }
}

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    /// Exchange instrument type code.
    pub fn code(&self) -> &'static str {
        match self {
            OptionKind::Call => "CE",
            OptionKind::Put => "PE",
        }
    }
}

/// One row of the broker's instrument master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub instrument_token: u64,
    pub symbol: String,
    /// Underlying name, e.g. `NIFTY`
    pub name: String,
    pub exchange: String,
    pub expiry: Option<NaiveDate>,
    /// Zero for non-options
    pub strike: f64,
    pub lot_size: u32,
    /// `CE`, `PE`, `FUT` or `EQ`
    pub instrument_type: String,
}

impl InstrumentInfo {
    pub fn option_kind(&self) -> Option<OptionKind> {
        match self.instrument_type.as_str() {
            "CE" => Some(OptionKind::Call),
            "PE" => Some(OptionKind::Put),
            _ => None,
        }
    }

    pub fn to_instrument(&self) -> Instrument {
        Instrument::new(&self.symbol, self.instrument_token, self.lot_size)
            .with_exchange(&self.exchange)
    }
}

/// Instrument master for one exchange.
#[derive(Debug, Clone, Default)]
pub struct InstrumentMaster {
    entries: Vec<InstrumentInfo>,
}

impl InstrumentMaster {
    pub fn new(entries: Vec<InstrumentInfo>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentInfo> {
        self.entries.iter()
    }

    pub fn by_token(&self, token: u64) -> Option<&InstrumentInfo> {
        self.entries.iter().find(|e| e.instrument_token == token)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&InstrumentInfo> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    /// Options on `underlying` of the given kind.
    pub fn options<'a>(
        &'a self,
        underlying: &'a str,
        kind: OptionKind,
    ) -> impl Iterator<Item = &'a InstrumentInfo> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name == underlying && e.option_kind() == Some(kind))
    }
}
