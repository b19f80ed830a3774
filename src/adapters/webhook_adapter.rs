//! Discord-style webhook notifier.
//!
//! Posts one embed per transition. Discord answers 204 on success; any 2xx is
//! accepted.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::domain::error::HulltrendError;
use crate::domain::ohlcv::TIMESTAMP_FORMAT;
use crate::domain::signal::SignalEvent;
use crate::domain::trend::TrendState;
use crate::ports::config_port::ConfigPort;
use crate::ports::notify_port::NotifyPort;

const DEFAULT_USERNAME: &str = "Hull Trend Bot";
const COLOR_UP: u32 = 0x00ff00;
const COLOR_DOWN: u32 = 0xff0000;

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub username: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

fn field(name: &str, value: String) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline: true,
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, username: Option<String>) -> Result<Self, HulltrendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HulltrendError::Notify {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            username: username.unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, HulltrendError> {
        let url = config.require_string("webhook", "url")?;
        Self::new(url, config.get_string("webhook", "username"))
    }

    pub fn build_payload(&self, event: &SignalEvent) -> WebhookPayload {
        let (color, description) = match event.state {
            TrendState::Up => (COLOR_UP, "Trend is up and the fast Hull line is rising"),
            TrendState::Down => (COLOR_DOWN, "Trend is down and the fast Hull line is falling"),
        };
        let previous = event
            .previous_state
            .map(|s| s.as_str())
            .unwrap_or("UNKNOWN");

        WebhookPayload {
            username: self.username.clone(),
            embeds: vec![Embed {
                title: format!("{} {} trend {}", event.instrument, event.timeframe, event.state),
                description: description.to_string(),
                color,
                timestamp: event.bar_timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                fields: vec![
                    field("Instrument", event.instrument.clone()),
                    field("Timeframe", event.timeframe.to_string()),
                    field("Price", format!("{:.2}", event.price)),
                    field("Signal", format!("{previous} -> {}", event.state)),
                    field(
                        "Bar",
                        format!("{} UTC", event.bar_timestamp.format(TIMESTAMP_FORMAT)),
                    ),
                ],
            }],
        }
    }
}

impl NotifyPort for WebhookNotifier {
    fn notify(&self, event: &SignalEvent) -> Result<(), HulltrendError> {
        let body = serde_json::to_vec(&self.build_payload(event)).map_err(|e| {
            HulltrendError::Notify {
                reason: format!("failed to encode payload: {e}"),
            }
        })?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| HulltrendError::Notify {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(HulltrendError::Notify {
                reason: format!("webhook returned {status}: {text}"),
            });
        }

        tracing::info!(
            instrument = %event.instrument,
            timeframe = %event.timeframe,
            state = %event.state,
            "webhook alert sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Timeframe;
    use chrono::NaiveDate;

    fn event() -> SignalEvent {
        SignalEvent {
            instrument: "BTC".into(),
            timeframe: Timeframe::H4,
            bar_timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            state: TrendState::Down,
            previous_state: Some(TrendState::Up),
            is_transition: true,
            price: 67_012.456,
        }
    }

    #[test]
    fn payload_shape() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", None).unwrap();
        let value = serde_json::to_value(notifier.build_payload(&event())).unwrap();

        assert_eq!(value["username"], DEFAULT_USERNAME);
        let embed = &value["embeds"][0];
        assert_eq!(embed["title"], "BTC 4h trend DOWN");
        assert_eq!(embed["color"], COLOR_DOWN);
        assert_eq!(embed["timestamp"], "2024-06-01T08:00:00Z");
        assert_eq!(embed["fields"][2]["value"], "67012.46");
        assert_eq!(embed["fields"][3]["value"], "UP -> DOWN");
    }

    #[test]
    fn unreachable_endpoint_is_notify_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", Some("bot".into())).unwrap();
        let err = notifier.notify(&event()).unwrap_err();
        assert!(matches!(err, HulltrendError::Notify { .. }));
    }
}
