//! Movement-filtered location reporting.

use crate::client::offline::{ActionSink, EnqueueOutcome};
use crate::shared::{LocationPing, MovementFilter, Position, SyncAction};

/// What happened to one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Too close to the last reported position
    Suppressed,
    /// Handed to the outbox, which synced or queued it
    Reported(EnqueueOutcome),
    /// The outbox could neither sync nor queue it
    Lost,
}

/// Turns position samples into `location_ping` actions
///
/// The reference point only advances when a ping is accepted, so a lost
/// ping is retried with the next sample instead of being suppressed.
pub struct LocationReporter<K> {
    sink: K,
    filter: MovementFilter,
    last_reported: Option<Position>,
}

impl<K: ActionSink> LocationReporter<K> {
    pub fn new(sink: K, filter: MovementFilter) -> Self {
        Self {
            sink,
            filter,
            last_reported: None,
        }
    }

    pub fn last_reported(&self) -> Option<&Position> {
        self.last_reported.as_ref()
    }

    pub async fn report(&mut self, sample: Position) -> ReportOutcome {
        if !self.filter.is_significant(self.last_reported.as_ref(), &sample) {
            tracing::trace!(
                latitude = sample.latitude,
                longitude = sample.longitude,
                "movement below threshold, not reporting"
            );
            return ReportOutcome::Suppressed;
        }

        let outcome = self.sink.submit(SyncAction::LocationPing(ping(&sample))).await;
        if outcome.is_accepted() {
            self.last_reported = Some(sample);
            ReportOutcome::Reported(outcome)
        } else {
            tracing::warn!("location ping was neither sent nor queued");
            ReportOutcome::Lost
        }
    }
}

fn ping(sample: &Position) -> LocationPing {
    LocationPing {
        latitude: sample.latitude,
        longitude: sample.longitude,
        speed_kmh: sample.speed_kmh(),
        heading: sample.heading,
        accuracy_m: sample.accuracy.map(|meters| meters.round().max(0.0) as u32),
        timestamp: sample.timestamp,
    }
}
