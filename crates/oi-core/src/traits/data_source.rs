//! Market-data collaborator.

use crate::error::DataError;
use crate::types::{Bar, Instrument, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of historical bars with open interest.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch bars in `[start, end]`, ordered from oldest to newest.
    async fn get_historical_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError>;

    /// Get the data source name.
    fn name(&self) -> &str;
}
