//! Change detection and notification
//!
//! A new observation always becomes the tracker's current percentage. When it
//! is at least `threshold` percentage points away from the baseline, the
//! owner is notified and the baseline moves to the new value, so a sustained
//! deviation is reported once and the next report needs a further full move.

use crate::decimal::abs_delta;
use crate::models::Tracker;
use crate::notifications::{Direction, Notifier, TrackerEvent};
use crate::registry::TrackerRegistry;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Record `new_percentage` on the tracker; returns the event to send, if any
pub fn apply_observation(tracker: &mut Tracker, new_percentage: Decimal) -> Option<TrackerEvent> {
    let previous = tracker.baseline_percentage;
    let delta = abs_delta(new_percentage, previous);

    tracker.current_percentage = new_percentage;

    if delta < tracker.significant_change_threshold {
        return None;
    }

    tracker.baseline_percentage = new_percentage;

    Some(TrackerEvent::SignificantChange {
        ticker: tracker.ticker.clone(),
        token_address: tracker.token_address.clone(),
        track_type: tracker.track_type,
        direction: Direction::between(previous, new_percentage),
        previous,
        current: new_percentage,
        delta,
    })
}

/// What a detection pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectOutcome {
    /// Tracker was removed while the observation was in flight
    Missing,
    /// Observation recorded, below threshold
    Unchanged,
    /// Threshold crossed and baseline rebased; `delivered` reports the send
    Notified { delivered: bool },
}

impl DetectOutcome {
    pub fn notified(&self) -> bool {
        matches!(self, DetectOutcome::Notified { .. })
    }
}

/// Applies observations to live trackers and sends change notices
pub struct ChangeDetector {
    registry: Arc<TrackerRegistry>,
    notifier: Arc<Notifier>,
}

impl ChangeDetector {
    pub fn new(registry: Arc<TrackerRegistry>, notifier: Arc<Notifier>) -> Self {
        Self { registry, notifier }
    }

    /// Compare `new_percentage` against the baseline of the `observed` tracker
    ///
    /// The state update happens first under the registry lock; delivery runs
    /// afterwards and a failed send does not roll the baseline back. A tracker
    /// stopped and re-created under the same key since `observed` was read is
    /// left untouched.
    pub async fn detect(&self, observed: &Tracker, new_percentage: Decimal) -> DetectOutcome {
        let key = observed.key();
        let applied = self
            .registry
            .update(&key.owner, &key.tracker_id, |tracker| {
                if !tracker.same_instance(observed) {
                    return None;
                }
                Some(
                    apply_observation(tracker, new_percentage)
                        .map(|event| (event, tracker.destination.clone())),
                )
            })
            .flatten();

        match applied {
            None => {
                tracing::debug!(tracker = %key, "Tracker gone or replaced before update, dropping observation");
                DetectOutcome::Missing
            }
            Some(None) => DetectOutcome::Unchanged,
            Some(Some((event, destination))) => {
                tracing::info!(
                    tracker = %key,
                    percentage = %new_percentage,
                    "Significant holding change detected"
                );
                let delivered = self.notifier.notify(&destination, &event).await;
                DetectOutcome::Notified { delivered }
            }
        }
    }
}
