//! Notification delivery for Supply Watch
//!
//! Tracker events are rendered to text and handed to a [`NotificationSink`]
//! addressed by the tracker's destination (a chat id for Telegram).
//! Delivery is at-most-once: failures are logged and never retried here.

pub mod telegram;

pub use telegram::TelegramSink;

use crate::error::DeliveryError;
use crate::metrics::MetricsState;
use crate::models::TrackType;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Direction of a significant move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Direction of travel from `from` to `to`
    pub fn between(from: Decimal, to: Decimal) -> Self {
        if to >= from {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "increased"),
            Direction::Down => write!(f, "decreased"),
        }
    }
}

/// Events that produce a user-facing message
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// Holding moved by at least the threshold since the last baseline
    SignificantChange {
        ticker: String,
        token_address: String,
        track_type: TrackType,
        direction: Direction,
        previous: Decimal,
        current: Decimal,
        delta: Decimal,
    },
    /// Tracker reached its lifetime and was removed
    Expired {
        ticker: String,
        token_address: String,
        track_type: TrackType,
        ttl_hours: i64,
    },
}

impl TrackerEvent {
    /// Short event kind for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerEvent::SignificantChange { .. } => "significant_change",
            TrackerEvent::Expired { .. } => "expired",
        }
    }

    /// Format the event as a notification message
    pub fn format_message(&self) -> String {
        match self {
            TrackerEvent::SignificantChange {
                ticker,
                token_address,
                track_type,
                direction,
                previous,
                current,
                delta,
            } => {
                let emoji = match direction {
                    Direction::Up => "📈",
                    Direction::Down => "📉",
                };
                format!(
                    "{} {} holding of ${} {} by {}%\n{}% -> {}%\nToken: {}",
                    emoji,
                    track_type.label(),
                    ticker,
                    direction,
                    delta.round_dp(4),
                    previous.round_dp(4),
                    current.round_dp(4),
                    token_address
                )
            }
            TrackerEvent::Expired {
                ticker,
                token_address,
                track_type,
                ttl_hours,
            } => format!(
                "⏰ {} tracking for ${} stopped after {}h\nToken: {}",
                track_type.label(),
                ticker,
                ttl_hours,
                token_address
            ),
        }
    }
}

/// Outbound text channel
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `destination`
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Sink that only writes messages to the log
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        tracing::info!(destination = destination, message = text, "Notification");
        Ok(())
    }
}

/// Formats events and delivers them with a bounded timeout
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
    metrics: Arc<MetricsState>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, timeout: Duration, metrics: Arc<MetricsState>) -> Self {
        Self {
            sink,
            timeout,
            metrics,
        }
    }

    /// Deliver an event; returns whether delivery succeeded
    ///
    /// Failures are logged and counted, never propagated.
    pub async fn notify(&self, destination: &str, event: &TrackerEvent) -> bool {
        let text = event.format_message();
        let result = match tokio::time::timeout(self.timeout, self.sink.send(destination, &text)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut),
        };

        match result {
            Ok(()) => {
                self.metrics.notifications_total.inc();
                tracing::info!(
                    destination = destination,
                    event = event.kind(),
                    "Sent notification"
                );
                true
            }
            Err(e) => {
                self.metrics.delivery_failures_total.inc();
                tracing::error!(
                    destination = destination,
                    event = event.kind(),
                    error = %e,
                    "Failed to send notification"
                );
                false
            }
        }
    }
}
