//! Bar sources for the signal engine.

mod csv_source;
mod resample;
pub mod synthetic;

pub use csv_source::{read_bars, write_bars, CsvBarSource, CsvOptions};
pub use resample::aggregate_to_cadence;

use std::path::Path;

use oi_core::error::DataError;
use oi_core::types::Bar;

/// Load and validate bars from a CSV file.
pub fn load_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Vec<Bar>, DataError> {
    CsvBarSource::new(path, options.clone())?.load()
}
