//! Time-series store port.

use crate::domain::error::HulltrendError;
use crate::domain::ohlcv::{Bar, Timeframe};
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Bars for one series in strictly increasing timestamp order, starting
    /// at `since` (inclusive) when given. May be empty.
    fn get_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, HulltrendError>;

    fn list_instruments(&self, timeframe: Timeframe) -> Result<Vec<String>, HulltrendError>;
}

impl<T: DataPort + ?Sized> DataPort for Box<T> {
    fn get_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, HulltrendError> {
        (**self).get_bars(instrument, timeframe, since)
    }

    fn list_instruments(&self, timeframe: Timeframe) -> Result<Vec<String>, HulltrendError> {
        (**self).list_instruments(timeframe)
    }
}
