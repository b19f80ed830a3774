//! Aggregate bars into a coarser timeframe.
//!
//! Buckets are aligned to the Unix epoch (weeks start on Monday). Each bucket
//! takes the first open, highest high, lowest low, last close and summed
//! volume, and is stamped with the bucket start. Empty buckets are skipped.

use chrono::{DateTime, NaiveDateTime};

use super::error::HulltrendError;
use super::ohlcv::{Bar, Timeframe, validate_series};

const MONDAY_OFFSET_SECS: i64 = 4 * 86_400;

pub fn bucket_start(timestamp: NaiveDateTime, timeframe: Timeframe) -> NaiveDateTime {
    let width = timeframe.duration().num_seconds();
    let offset = if timeframe == Timeframe::W1 {
        MONDAY_OFFSET_SECS
    } else {
        0
    };
    let secs = timestamp.and_utc().timestamp() - offset;
    let start = secs.div_euclid(width) * width + offset;
    DateTime::from_timestamp(start, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(timestamp)
}

pub fn resample(
    series: &str,
    bars: &[Bar],
    timeframe: Timeframe,
) -> Result<Vec<Bar>, HulltrendError> {
    validate_series(series, bars)?;

    let mut out: Vec<Bar> = Vec::new();
    for bar in bars {
        let start = bucket_start(bar.timestamp, timeframe);
        match out.last_mut() {
            Some(current) if current.timestamp == start => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
                current.volume += bar.volume;
            }
            _ => out.push(Bar {
                timestamp: start,
                ..bar.clone()
            }),
        }
    }

    tracing::debug!(series, from = bars.len(), to = out.len(), %timeframe, "resampled bars");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn bar(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn hourly_to_four_hour() {
        let bars = vec![
            bar(at(2, 0), 10.0, 12.0, 9.0, 11.0),
            bar(at(2, 1), 11.0, 15.0, 10.0, 14.0),
            bar(at(2, 3), 14.0, 14.5, 8.0, 9.0),
            bar(at(2, 4), 9.0, 10.0, 8.5, 9.5),
        ];
        let out = resample("BTC/1h", &bars, Timeframe::H4).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Bar {
            timestamp: at(2, 0),
            open: 10.0,
            high: 15.0,
            low: 8.0,
            close: 9.0,
            volume: 30.0,
        });
        assert_eq!(out[1].timestamp, at(2, 4));
        assert_eq!(out[1].volume, 10.0);
    }

    #[test]
    fn bucket_alignment() {
        assert_eq!(bucket_start(at(2, 7), Timeframe::H4), at(2, 4));
        assert_eq!(bucket_start(at(2, 23), Timeframe::D1), at(2, 0));
        // 2024-01-04 is a Thursday; its week starts Monday 2024-01-01.
        assert_eq!(bucket_start(at(4, 13), Timeframe::W1), at(1, 0));
    }

    #[test]
    fn gaps_are_not_filled() {
        let bars = vec![
            bar(at(2, 0), 1.0, 1.0, 1.0, 1.0),
            bar(at(2, 13), 2.0, 2.0, 2.0, 2.0),
        ];
        let out = resample("BTC/1h", &bars, Timeframe::H4).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].timestamp, at(2, 12));
    }

    #[test]
    fn rejects_unordered_input() {
        let bars = vec![
            bar(at(2, 5), 1.0, 1.0, 1.0, 1.0),
            bar(at(2, 1), 2.0, 2.0, 2.0, 2.0),
        ];
        assert!(resample("BTC/1h", &bars, Timeframe::H4).is_err());
    }
}
