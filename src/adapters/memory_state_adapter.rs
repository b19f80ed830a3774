//! In-process signal state store.

use std::collections::HashMap;

use crate::domain::error::HulltrendError;
use crate::domain::ohlcv::SeriesKey;
use crate::domain::signal::StateRecord;
use crate::ports::state_port::StatePort;

/// Keeps tracker state for the lifetime of the process only.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateAdapter {
    records: HashMap<SeriesKey, StateRecord>,
}

impl MemoryStateAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StatePort for MemoryStateAdapter {
    fn load_last_state(&self, key: &SeriesKey) -> Result<Option<StateRecord>, HulltrendError> {
        Ok(self.records.get(key).copied())
    }

    fn save_last_state(
        &mut self,
        key: &SeriesKey,
        record: &StateRecord,
    ) -> Result<(), HulltrendError> {
        self.records.insert(key.clone(), *record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Timeframe;
    use crate::domain::trend::TrendState;
    use chrono::NaiveDate;

    #[test]
    fn save_overwrites_per_key() {
        let mut store = MemoryStateAdapter::new();
        let key = SeriesKey::new("BTC", Timeframe::H1);
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert!(store.load_last_state(&key).unwrap().is_none());
        for state in [TrendState::Up, TrendState::Down] {
            store
                .save_last_state(&key, &StateRecord { state, bar_timestamp: at })
                .unwrap();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.load_last_state(&key).unwrap().map(|r| r.state),
            Some(TrendState::Down)
        );
    }
}
