//! Notification sink that writes transitions to the log.

use crate::domain::error::HulltrendError;
use crate::domain::signal::SignalEvent;
use crate::ports::notify_port::NotifyPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    fn notify(&self, event: &SignalEvent) -> Result<(), HulltrendError> {
        tracing::info!(
            instrument = %event.instrument,
            timeframe = %event.timeframe,
            bar = %event.bar_timestamp,
            state = %event.state,
            previous = event.previous_state.map(|s| s.as_str()).unwrap_or("UNKNOWN"),
            price = event.price,
            "trend signal"
        );
        Ok(())
    }
}
