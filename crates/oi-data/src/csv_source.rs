//! Delimited-text bar files.
//!
//! Columns are positional: `timestamp, open, high, low, close, volume,
//! open_interest`. The open-interest column may be absent, in which case it
//! reads as zero and one warning is logged per file.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, warn};

use oi_core::error::DataError;
use oi_core::traits::DataSource;
use oi_core::types::{Bar, Instrument, Timeframe};

const COLUMNS: [&str; 7] = ["timestamp", "open", "high", "low", "close", "volume", "open_interest"];

/// How to read a bar file.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// chrono format string for the timestamp column
    pub timestamp_format: String,
    /// Whether the first row is a header
    pub has_headers: bool,
    /// Offset applied to timestamps that carry no zone of their own
    pub utc_offset_minutes: i32,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y-%m-%d %H:%M:%S%:z".to_string(),
            has_headers: true,
            utc_offset_minutes: 330,
        }
    }
}

impl CsvOptions {
    fn offset(&self) -> Result<FixedOffset, DataError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            DataError::ParseError(format!("invalid UTC offset: {} minutes", self.utc_offset_minutes))
        })
    }

    /// Parse a timestamp into Unix milliseconds.
    ///
    /// Tries the format as zone-aware, then as naive local time in the
    /// configured offset, then as a Unix timestamp in seconds or millis.
    pub fn parse_timestamp(&self, value: &str) -> Option<i64> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_str(value, &self.timestamp_format) {
            return Some(dt.timestamp_millis());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, &self.timestamp_format) {
            let offset = self.offset().ok()?;
            return naive
                .and_local_timezone(offset)
                .single()
                .map(|dt| dt.timestamp_millis());
        }
        value.parse::<i64>().ok().map(|ts| {
            if ts > 10_000_000_000 {
                ts
            } else {
                ts * 1000
            }
        })
    }

    /// Render Unix milliseconds with the configured format and offset.
    pub fn format_timestamp(&self, millis: i64) -> Result<String, DataError> {
        let offset = self.offset()?;
        let dt = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| DataError::ParseError(format!("timestamp out of range: {millis}")))?;
        Ok(dt.with_timezone(&offset).format(&self.timestamp_format).to_string())
    }
}

fn field<'r>(record: &'r StringRecord, index: usize, line: u64) -> Result<&'r str, DataError> {
    match record.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DataError::MissingColumn {
            line,
            column: COLUMNS[index],
        }),
    }
}

fn parse_price(record: &StringRecord, index: usize, line: u64) -> Result<f64, DataError> {
    let raw = field(record, index, line)?;
    raw.parse::<f64>().map_err(|e| DataError::Malformed {
        line,
        field: COLUMNS[index],
        message: format!("'{raw}': {e}"),
    })
}

/// Integer counts; values written as floats (`1500.0`) are accepted.
fn parse_count(raw: &str, index: usize, line: u64) -> Result<u64, DataError> {
    if let Ok(v) = raw.parse::<u64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(DataError::Malformed {
            line,
            field: COLUMNS[index],
            message: format!("'{raw}' is not a non-negative integer"),
        }),
    }
}

/// Read, validate and order-check bars from any reader.
pub fn read_bars<R: Read>(reader: R, options: &CsvOptions) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(options.has_headers)
        .flexible(true)
        .from_reader(reader);

    let mut bars: Vec<Bar> = Vec::new();
    let mut warned_missing_oi = false;

    for result in reader.records() {
        let record = result.map_err(|e| DataError::ParseError(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let raw_ts = field(&record, 0, line)?;
        let timestamp = options
            .parse_timestamp(raw_ts)
            .ok_or_else(|| DataError::Malformed {
                line,
                field: "timestamp",
                message: format!("'{raw_ts}' does not match '{}'", options.timestamp_format),
            })?;

        let open = parse_price(&record, 1, line)?;
        let high = parse_price(&record, 2, line)?;
        let low = parse_price(&record, 3, line)?;
        let close = parse_price(&record, 4, line)?;
        let volume = parse_count(field(&record, 5, line)?, 5, line)?;

        let open_interest = match record.get(6).map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_count(raw, 6, line)?,
            _ => {
                if !warned_missing_oi {
                    warn!(line, "Open interest missing, defaulting to 0");
                    warned_missing_oi = true;
                }
                0
            }
        };

        let bar = Bar::new(timestamp, open, high, low, close, volume, open_interest);
        bar.validate()?;

        if let Some(previous) = bars.last() {
            if bar.timestamp <= previous.timestamp {
                return Err(DataError::OutOfOrder {
                    line,
                    timestamp: bar.timestamp,
                    previous: previous.timestamp,
                });
            }
        }
        bars.push(bar);
    }

    debug!(bars = bars.len(), "Parsed bar file");
    Ok(bars)
}

/// Write bars in the same positional layout [`read_bars`] accepts.
pub fn write_bars<W: Write>(writer: W, bars: &[Bar], options: &CsvOptions) -> Result<(), DataError> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let csv_err = |e: csv::Error| DataError::ParseError(e.to_string());

    if options.has_headers {
        writer.write_record(COLUMNS).map_err(csv_err)?;
    }
    for bar in bars {
        writer
            .write_record([
                options.format_timestamp(bar.timestamp)?,
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
                bar.open_interest.to_string(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

/// A bar file on disk.
pub struct CsvBarSource {
    path: PathBuf,
    options: CsvOptions,
}

impl CsvBarSource {
    pub fn new(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every bar in the file.
    pub fn load(&self) -> Result<Vec<Bar>, DataError> {
        let file = std::fs::File::open(&self.path)?;
        let bars = read_bars(file, &self.options)?;
        if bars.is_empty() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(bars)
    }
}

#[async_trait]
impl DataSource for CsvBarSource {
    async fn get_historical_bars(
        &self,
        _instrument: &Instrument,
        _timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError> {
        let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
        Ok(self
            .load()?
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
timestamp,open,high,low,close,volume,open_interest
2024-07-03 09:15:00+05:30,100.0,102.0,99.5,101.0,1200,1500000
2024-07-03 09:18:00+05:30,101.0,101.5,98.0,98.5,900,1490000
";

    #[test]
    fn test_read_offset_aware_timestamps() {
        let bars = read_bars(SAMPLE.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(bars.len(), 2);
        // 09:15 IST is 03:45 UTC
        assert_eq!(bars[0].datetime().to_rfc3339(), "2024-07-03T03:45:00+00:00");
        assert_eq!(bars[1].timestamp - bars[0].timestamp, 180_000);
        assert_eq!(bars[1].open_interest, 1_490_000);
    }

    #[test]
    fn test_literal_offset_format_uses_configured_offset() {
        let options = CsvOptions {
            timestamp_format: "%Y-%m-%d %H:%M:%S+05:30".to_string(),
            ..Default::default()
        };
        let bars = read_bars(SAMPLE.as_bytes(), &options).unwrap();
        assert_eq!(bars[0].datetime().to_rfc3339(), "2024-07-03T03:45:00+00:00");
    }

    #[test]
    fn test_headerless_file() {
        let options = CsvOptions {
            has_headers: false,
            ..Default::default()
        };
        let body = SAMPLE.lines().skip(1).collect::<Vec<_>>().join("\n");
        assert_eq!(read_bars(body.as_bytes(), &options).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_open_interest_defaults_to_zero() {
        let data = "\
timestamp,open,high,low,close,volume
2024-07-03 09:15:00+05:30,100,102,99,101,1200
";
        let bars = read_bars(data.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(bars[0].open_interest, 0);
    }

    #[test]
    fn test_missing_required_column() {
        let data = "\
timestamp,open,high,low,close,volume,open_interest
2024-07-03 09:15:00+05:30,100,102,99,101
";
        assert!(matches!(
            read_bars(data.as_bytes(), &CsvOptions::default()),
            Err(DataError::MissingColumn { column: "volume", line: 2 })
        ));
    }

    #[test]
    fn test_malformed_field() {
        let data = "\
timestamp,open,high,low,close,volume,open_interest
2024-07-03 09:15:00+05:30,100,abc,99,101,10,10
";
        assert!(matches!(
            read_bars(data.as_bytes(), &CsvOptions::default()),
            Err(DataError::Malformed { field: "high", .. })
        ));

        let bad_time = "03/07/2024 09:15,100,102,99,101,10,10\n";
        let options = CsvOptions {
            has_headers: false,
            ..Default::default()
        };
        assert!(matches!(
            read_bars(bad_time.as_bytes(), &options),
            Err(DataError::Malformed { field: "timestamp", .. })
        ));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let data = "\
timestamp,open,high,low,close,volume,open_interest
2024-07-03 09:18:00+05:30,100,102,99,101,10,10
2024-07-03 09:15:00+05:30,100,102,99,101,10,10
";
        assert!(matches!(
            read_bars(data.as_bytes(), &CsvOptions::default()),
            Err(DataError::OutOfOrder { line: 3, .. })
        ));
    }

    #[test]
    fn test_inconsistent_ohlc_rejected() {
        let data = "\
timestamp,open,high,low,close,volume,open_interest
2024-07-03 09:15:00+05:30,100,99,98,101,10,10
";
        assert!(matches!(
            read_bars(data.as_bytes(), &CsvOptions::default()),
            Err(DataError::InvalidBar { .. })
        ));
    }

    #[test]
    fn test_unix_timestamp_fallback() {
        let options = CsvOptions::default();
        assert_eq!(options.parse_timestamp("1720000000"), Some(1_720_000_000_000));
        assert_eq!(options.parse_timestamp("1720000000000"), Some(1_720_000_000_000));
    }

    #[test]
    fn test_write_then_read_back() {
        let bars = read_bars(SAMPLE.as_bytes(), &CsvOptions::default()).unwrap();
        let mut out = Vec::new();
        write_bars(&mut out, &bars, &CsvOptions::default()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2024-07-03 09:15:00+05:30"));
        assert_eq!(read_bars(text.as_bytes(), &CsvOptions::default()).unwrap(), bars);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CsvBarSource::new("/nonexistent/bars.csv", CsvOptions::default()),
            Err(DataError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_data_source_filters_window() {
        let path = std::env::temp_dir().join(format!("oi-bars-{}.csv", std::process::id()));
        std::fs::write(&path, SAMPLE).unwrap();

        let source = CsvBarSource::new(&path, CsvOptions::default()).unwrap();
        let first = read_bars(SAMPLE.as_bytes(), &CsvOptions::default()).unwrap()[1];
        let start = first.datetime();
        let bars = source
            .get_historical_bars(&Instrument::new("X", 1, 25), Timeframe::Minute3, start, start)
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(bars, vec![first]);
    }
}
