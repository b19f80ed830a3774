#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use hulltrend::domain::error::HulltrendError;
pub use hulltrend::domain::ohlcv::{Bar, SeriesKey, Timeframe};
use hulltrend::domain::signal::SignalEvent;
use hulltrend::domain::trend::{TrendConfig, TrendEngine};
use hulltrend::ports::data_port::DataPort;
use hulltrend::ports::notify_port::NotifyPort;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<SeriesKey, Vec<Bar>>,
    pub errors: HashMap<SeriesKey, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.data.insert(SeriesKey::new(instrument, timeframe), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, timeframe: Timeframe, reason: &str) -> Self {
        self.errors
            .insert(SeriesKey::new(instrument, timeframe), reason.to_string());
        self
    }

    pub fn set_bars(&mut self, instrument: &str, timeframe: Timeframe, bars: Vec<Bar>) {
        self.data.insert(SeriesKey::new(instrument, timeframe), bars);
    }
}

impl DataPort for MockDataPort {
    fn get_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, HulltrendError> {
        let key = SeriesKey::new(instrument, timeframe);
        if let Some(reason) = self.errors.get(&key) {
            return Err(HulltrendError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(&key)
            .map(|bars| {
                bars.iter()
                    .filter(|b| since.is_none_or(|s| b.timestamp >= s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_instruments(&self, timeframe: Timeframe) -> Result<Vec<String>, HulltrendError> {
        let mut instruments: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .filter(|k| k.timeframe == timeframe)
            .map(|k| k.instrument.clone())
            .collect();
        instruments.sort();
        instruments.dedup();
        Ok(instruments)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: RefCell<Vec<SignalEvent>>,
    pub fail: Cell<bool>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.events.borrow().len()
    }
}

impl NotifyPort for RecordingNotifier {
    fn notify(&self, event: &SignalEvent) -> Result<(), HulltrendError> {
        if self.fail.get() {
            return Err(HulltrendError::Notify {
                reason: "endpoint unavailable".into(),
            });
        }
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(timestamp: NaiveDateTime, close: f64) -> Bar {
    Bar {
        timestamp,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

/// One bar per `step`, starting at [`start`].
pub fn bars_from_closes(closes: &[f64], step: TimeDelta) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start() + step * i as i32, c))
        .collect()
}

pub fn hourly(closes: &[f64]) -> Vec<Bar> {
    bars_from_closes(closes, TimeDelta::hours(1))
}

/// Falls for `leg` bars, then rises for `leg` bars.
pub fn v_shape(leg: usize, top: f64) -> Vec<f64> {
    let down = (0..leg).map(|i| top - i as f64);
    let up = (0..leg).map(|i| top - leg as f64 + 2.0 + i as f64);
    down.chain(up).collect()
}

/// [`v_shape`] cut right after its DOWN to UP crossing, so the newest
/// classified bar is the crossing itself.
pub fn crossing() -> Vec<f64> {
    v_shape(30, 200.0)[..32].to_vec()
}

pub fn sine(count: usize, period: f64, amplitude: f64) -> Vec<f64> {
    (0..count)
        .map(|i| 100.0 + amplitude * (i as f64 * std::f64::consts::TAU / period).sin())
        .collect()
}

pub fn engine(fast_length: usize, slow_length: usize) -> TrendEngine {
    TrendEngine::new(TrendConfig {
        fast_length,
        slow_length,
        ..Default::default()
    })
    .unwrap()
}
