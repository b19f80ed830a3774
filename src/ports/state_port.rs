//! Persistence for the signal tracker's last known state per series.

use crate::domain::error::HulltrendError;
use crate::domain::ohlcv::SeriesKey;
use crate::domain::signal::StateRecord;

/// Implementations should report failures as `HulltrendError::Persistence`
/// so callers can retry without having notified anyone.
pub trait StatePort {
    fn load_last_state(&self, key: &SeriesKey) -> Result<Option<StateRecord>, HulltrendError>;

    fn save_last_state(
        &mut self,
        key: &SeriesKey,
        record: &StateRecord,
    ) -> Result<(), HulltrendError>;
}

impl<T: StatePort + ?Sized> StatePort for Box<T> {
    fn load_last_state(&self, key: &SeriesKey) -> Result<Option<StateRecord>, HulltrendError> {
        (**self).load_last_state(key)
    }

    fn save_last_state(
        &mut self,
        key: &SeriesKey,
        record: &StateRecord,
    ) -> Result<(), HulltrendError> {
        (**self).save_last_state(key, record)
    }
}
