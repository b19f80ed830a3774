//! One polling pass per series: fetch, evaluate, detect, notify.

use super::error::HulltrendError;
use super::ohlcv::{SeriesKey, Timeframe};
use super::signal::{SignalEvent, SignalTracker, StateRecord};
use super::trend::{TrendEngine, TrendFrame};
use crate::ports::data_port::DataPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::state_port::StatePort;

pub struct SignalService<D: DataPort, S: StatePort, N: NotifyPort> {
    data: D,
    engine: TrendEngine,
    tracker: SignalTracker<S>,
    notifier: N,
}

impl<D: DataPort, S: StatePort, N: NotifyPort> SignalService<D, S, N> {
    pub fn new(data: D, engine: TrendEngine, store: S, notifier: N) -> Self {
        Self {
            data,
            engine,
            tracker: SignalTracker::new(store),
            notifier,
        }
    }

    pub fn tracker(&mut self) -> &mut SignalTracker<S> {
        &mut self.tracker
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn frame(&self, key: &SeriesKey) -> Result<TrendFrame, HulltrendError> {
        let bars = self.data.get_bars(&key.instrument, key.timeframe, None)?;
        self.engine.evaluate(&key.to_string(), &bars)
    }

    /// Evaluate `key` and hand a transition to the notifier.
    ///
    /// A transition is committed only after the notifier accepted it. A failed
    /// notification comes back as `Notify` with the old state still stored,
    /// so the next poll reports the same transition again.
    pub fn poll(&mut self, key: &SeriesKey) -> Result<Option<SignalEvent>, HulltrendError> {
        let frame = self.frame(key)?;
        let Some(observed) = self.tracker.observe(key, &frame)? else {
            tracing::debug!(series = %key, bars = frame.len(), "no classified bar yet");
            return Ok(None);
        };

        if observed.event.is_transition {
            if let Err(e) = self.notifier.notify(&observed.event) {
                tracing::error!(series = %key, error = %e, "failed to deliver signal");
                return Err(match e {
                    HulltrendError::Notify { .. } => e,
                    other => HulltrendError::Notify {
                        reason: other.to_string(),
                    },
                });
            }
        }
        if let Some(record) = observed.record {
            self.tracker.commit(key, record)?;
        }
        Ok(Some(observed.event))
    }

    /// Poll every instrument the data source lists for `timeframe`.
    ///
    /// One failing series does not stop the others.
    pub fn poll_all(
        &mut self,
        timeframe: Timeframe,
    ) -> Result<Vec<(SeriesKey, Result<Option<SignalEvent>, HulltrendError>)>, HulltrendError>
    {
        let instruments = self.data.list_instruments(timeframe)?;
        let mut results = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            let key = SeriesKey::new(instrument, timeframe);
            let result = self.poll(&key);
            if let Err(e) = &result {
                tracing::warn!(series = %key, error = %e, "poll failed");
            }
            results.push((key, result));
        }
        Ok(results)
    }

    /// Record the current state of `key` without notifying.
    pub fn prime(&mut self, key: &SeriesKey) -> Result<Option<StateRecord>, HulltrendError> {
        let frame = self.frame(key)?;
        let record = self.tracker.prime(key, &frame)?;
        if let Some(r) = &record {
            tracing::info!(series = %key, state = %r.state, bar = %r.bar_timestamp, "primed signal state");
        }
        Ok(record)
    }
}
