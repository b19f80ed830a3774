//! Notification sink port.

use crate::domain::error::HulltrendError;
use crate::domain::signal::SignalEvent;

/// Downstream channel for signal changes. Delivery may be at-least-once;
/// the tracker guarantees each transition is handed over at most once.
pub trait NotifyPort {
    fn notify(&self, event: &SignalEvent) -> Result<(), HulltrendError>;
}

impl<T: NotifyPort + ?Sized> NotifyPort for Box<T> {
    fn notify(&self, event: &SignalEvent) -> Result<(), HulltrendError> {
        (**self).notify(event)
    }
}
