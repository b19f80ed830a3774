//! OHLCV bars, price fields, timeframes and series keys.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::fmt;
use std::str::FromStr;

use super::error::HulltrendError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Hl2 => (self.high + self.low) / 2.0,
            PriceField::Hlc3 => self.typical_price(),
            PriceField::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }
}

/// Which bar price feeds the moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceField {
    Open,
    High,
    Low,
    #[default]
    Close,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl FromStr for PriceField {
    type Err = HulltrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "high" => Ok(PriceField::High),
            "low" => Ok(PriceField::Low),
            "close" => Ok(PriceField::Close),
            "hl2" => Ok(PriceField::Hl2),
            "hlc3" => Ok(PriceField::Hlc3),
            "ohlc4" => Ok(PriceField::Ohlc4),
            other => Err(HulltrendError::ConfigInvalid {
                section: "strategy".into(),
                key: "source".into(),
                reason: format!("unknown price field '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn duration(&self) -> TimeDelta {
        match self {
            Timeframe::H1 => TimeDelta::hours(1),
            Timeframe::H4 => TimeDelta::hours(4),
            Timeframe::D1 => TimeDelta::days(1),
            Timeframe::W1 => TimeDelta::weeks(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = HulltrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            "1w" => Ok(Timeframe::W1),
            other => Err(HulltrendError::ConfigInvalid {
                section: "series".into(),
                key: "timeframe".into(),
                reason: format!("unknown timeframe '{other}' (expected 1h, 4h, 1d or 1w)"),
            }),
        }
    }
}

/// Identity of one tracked series: an instrument at a timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub instrument: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.timeframe)
    }
}

/// Reject series whose timestamps are not strictly increasing.
pub fn validate_series(series: &str, bars: &[Bar]) -> Result<(), HulltrendError> {
    for pair in bars.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.timestamp == prev.timestamp {
            return Err(HulltrendError::DataIntegrity {
                series: series.to_string(),
                reason: format!("duplicate timestamp {}", next.timestamp),
            });
        }
        if next.timestamp < prev.timestamp {
            return Err(HulltrendError::DataIntegrity {
                series: series.to_string(),
                reason: format!(
                    "timestamp {} follows {} out of order",
                    next.timestamp, prev.timestamp
                ),
            });
        }
    }
    Ok(())
}

/// Pull one price field out of a bar slice as a fully-defined source line.
pub fn source_values(bars: &[Bar], field: PriceField) -> Vec<Option<f64>> {
    bars.iter().map(|b| Some(b.price(field))).collect()
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` (optional `Z`) or a bare date.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
