//! CSV file data adapter.
//!
//! One file per series, `{instrument}_{timeframe}.csv`, with the header
//! `timestamp,open,high,low,close,volume`. Rows are returned in file order;
//! ordering is checked by the consumers, not repaired here.

use crate::domain::error::HulltrendError;
use crate::domain::ohlcv::{Bar, SeriesKey, TIMESTAMP_FORMAT, Timeframe, parse_timestamp};
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;

const HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, instrument: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument, timeframe))
    }

    /// Write a whole series, replacing any existing file.
    pub fn write_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<PathBuf, HulltrendError> {
        let path = self.csv_path(instrument, timeframe);
        let to_err = |e: csv::Error| HulltrendError::Database {
            reason: format!("failed to write {}: {}", path.display(), e),
        };

        let mut wtr = csv::Writer::from_path(&path).map_err(to_err)?;
        wtr.write_record(HEADER).map_err(to_err)?;
        for bar in bars {
            wtr.write_record([
                bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])
            .map_err(to_err)?;
        }
        wtr.flush()?;
        Ok(path)
    }
}

fn column(
    record: &csv::StringRecord,
    index: usize,
    series: &SeriesKey,
) -> Result<f64, HulltrendError> {
    let name = HEADER[index];
    record
        .get(index)
        .ok_or_else(|| HulltrendError::DataIntegrity {
            series: series.to_string(),
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| HulltrendError::DataIntegrity {
            series: series.to_string(),
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl DataPort for CsvAdapter {
    fn get_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, HulltrendError> {
        let series = SeriesKey::new(instrument, timeframe);
        let path = self.csv_path(instrument, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| HulltrendError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| HulltrendError::DataIntegrity {
                series: series.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let raw = record.get(0).ok_or_else(|| HulltrendError::DataIntegrity {
                series: series.to_string(),
                reason: "missing timestamp column".into(),
            })?;
            let timestamp =
                parse_timestamp(raw).ok_or_else(|| HulltrendError::DataIntegrity {
                    series: series.to_string(),
                    reason: format!("invalid timestamp '{}'", raw),
                })?;

            if since.is_some_and(|s| timestamp < s) {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: column(&record, 1, &series)?,
                high: column(&record, 2, &series)?,
                low: column(&record, 3, &series)?,
                close: column(&record, 4, &series)?,
                volume: column(&record, 5, &series)?,
            });
        }

        Ok(bars)
    }

    fn list_instruments(&self, timeframe: Timeframe) -> Result<Vec<String>, HulltrendError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| HulltrendError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut instruments = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(instrument) = name_str.strip_suffix(&suffix) {
                instruments.push(instrument.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}
