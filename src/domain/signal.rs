//! Signal history tracker.
//!
//! Remembers the last classified state and bar timestamp per series and turns
//! the newest classification of a [`TrendFrame`] into a [`SignalEvent`].
//! A series seen for the first time takes its baseline from the frame's own
//! history, so deploying against old data only reports a change that happened
//! on the newest classified bar.
//!
//! [`SignalTracker::observe`] compares without writing anything;
//! [`SignalTracker::commit`] stores the result. A caller that has to deliver
//! a transition commits only once delivery succeeded, so a failed delivery is
//! reported again by the next poll.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::error::HulltrendError;
use super::ohlcv::{SeriesKey, Timeframe};
use super::trend::{TrendFrame, TrendState};
use crate::ports::state_port::StatePort;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub bar_timestamp: NaiveDateTime,
    pub state: TrendState,
    pub previous_state: Option<TrendState>,
    pub is_transition: bool,
    pub price: f64,
}

/// What the tracker persists per series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateRecord {
    pub state: TrendState,
    pub bar_timestamp: NaiveDateTime,
}

/// Result of comparing a frame with the recorded state.
///
/// `record` is the state to commit, or `None` when the frame brought nothing
/// newer than what is already stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub event: SignalEvent,
    pub record: Option<StateRecord>,
}

pub struct SignalTracker<S: StatePort> {
    store: S,
    cache: HashMap<SeriesKey, StateRecord>,
}

impl<S: StatePort> SignalTracker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Last recorded state for `key`, from cache or the store.
    pub fn last_state(&mut self, key: &SeriesKey) -> Result<Option<StateRecord>, HulltrendError> {
        if let Some(record) = self.cache.get(key) {
            return Ok(Some(*record));
        }
        let loaded = self.store.load_last_state(key)?;
        if let Some(record) = loaded {
            self.cache.insert(key.clone(), record);
        }
        Ok(loaded)
    }

    /// Compare the newest classified bar in `frame` with the recorded state.
    ///
    /// Returns `None` when nothing in the frame is classified yet. Bars
    /// skipped since the last call are not replayed: only the newest
    /// classification is compared against the recorded one. Nothing is
    /// written.
    pub fn observe(
        &mut self,
        key: &SeriesKey,
        frame: &TrendFrame,
    ) -> Result<Option<Observation>, HulltrendError> {
        let Some(t) = frame.latest_classified() else {
            return Ok(None);
        };
        let Some(state) = frame.states[t] else {
            return Ok(None);
        };
        let bar_timestamp = frame.timestamps[t];
        let last = self.last_state(key)?;

        let observation =
            |previous_state: Option<TrendState>, record: Option<StateRecord>| Observation {
                event: SignalEvent {
                    instrument: key.instrument.clone(),
                    timeframe: key.timeframe,
                    bar_timestamp,
                    state,
                    previous_state,
                    is_transition: record.is_some() && previous_state.is_some_and(|p| p != state),
                    price: frame.closes[t],
                },
                record,
            };

        let observed = match last {
            Some(record) if bar_timestamp == record.bar_timestamp => {
                observation(Some(record.state), None)
            }
            Some(record) if bar_timestamp < record.bar_timestamp => {
                tracing::warn!(
                    series = %key,
                    bar = %bar_timestamp,
                    recorded = %record.bar_timestamp,
                    "newest classified bar is older than the recorded one; ignoring"
                );
                observation(Some(record.state), None)
            }
            _ => {
                let previous = match last {
                    Some(record) => Some(record.state),
                    None => frame.classified_before(t),
                };
                observation(previous, Some(StateRecord { state, bar_timestamp }))
            }
        };

        if observed.event.is_transition {
            tracing::info!(
                series = %key,
                bar = %bar_timestamp,
                from = observed.event.previous_state.map(|s| s.as_str()).unwrap_or("UNKNOWN"),
                to = %state,
                "signal transition"
            );
        }
        Ok(Some(observed))
    }

    /// Store the state carried by an [`Observation`].
    pub fn commit(&mut self, key: &SeriesKey, record: StateRecord) -> Result<(), HulltrendError> {
        self.store.save_last_state(key, &record)?;
        self.cache.insert(key.clone(), record);
        Ok(())
    }

    /// Observe and commit in one step.
    ///
    /// The record is persisted before the event is returned, and re-polling
    /// the same bar finds the timestamp already recorded.
    pub fn detect_new_signal(
        &mut self,
        key: &SeriesKey,
        frame: &TrendFrame,
    ) -> Result<Option<SignalEvent>, HulltrendError> {
        let Some(observed) = self.observe(key, frame)? else {
            return Ok(None);
        };
        if let Some(record) = observed.record {
            self.commit(key, record)?;
        }
        Ok(Some(observed.event))
    }

    /// Record the newest classification without reporting a transition.
    ///
    /// Used when backfilling or deploying against existing history so the
    /// first live poll only fires on a genuine change.
    pub fn prime(
        &mut self,
        key: &SeriesKey,
        frame: &TrendFrame,
    ) -> Result<Option<StateRecord>, HulltrendError> {
        let Some(t) = frame.latest_classified() else {
            return Ok(None);
        };
        let Some(state) = frame.states[t] else {
            return Ok(None);
        };
        let record = StateRecord {
            state,
            bar_timestamp: frame.timestamps[t],
        };
        if let Some(last) = self.last_state(key)? {
            if last.bar_timestamp >= record.bar_timestamp {
                return Ok(Some(last));
            }
        }
        self.commit(key, record)?;
        Ok(Some(record))
    }
}
