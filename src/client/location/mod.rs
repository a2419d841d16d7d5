//! # Location Module
//!
//! Driver location tracking while a route is active.
//!
//! Two independent flows run while tracking is enabled:
//!
//! - a continuous platform watch that keeps the displayed position fresh
//! - a periodic sampler that reports through the outbox, at most once per
//!   interval and only after meaningful movement
//!
//! The first report fires immediately on enable. Disabling tracking (or
//! dropping the tracker) cancels the platform watch and the timer. A ping
//! already handed to the sink is allowed to finish.

pub mod reporter;

pub use reporter::{LocationReporter, ReportOutcome};

use crate::client::offline::ActionSink;
use crate::client::subscription::Subscription;
use crate::shared::{LocationConfig, MovementFilter, Position};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Geolocation failures reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    Denied,
    #[error("position request timed out")]
    Timeout,
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Options for a one-shot position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may return
    pub maximum_age: Duration,
}

impl From<&LocationConfig> for SampleOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: config.sample_timeout(),
            maximum_age: config.maximum_age(),
        }
    }
}

pub type PositionHandler = Box<dyn Fn(Result<Position, PositionError>) + Send + Sync>;

/// Platform geolocation service
pub trait PositionSource: Send + Sync + 'static {
    /// Continuous updates until the returned subscription is released
    fn watch(&self, handler: PositionHandler) -> Subscription;

    /// One-shot position request
    fn current_position(
        &self,
        options: SampleOptions,
    ) -> impl Future<Output = Result<Position, PositionError>> + Send;
}

/// What the UI shows for the driver's location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingState {
    /// Latest known position; kept when a later update fails
    pub position: Option<Position>,
    pub error: Option<PositionError>,
    pub last_reported: Option<Position>,
}

/// Resources of one enabled period
///
/// Dropping the shutdown sender stops the report loop at its next wait.
struct TrackingSession {
    _watch: Subscription,
    _shutdown: oneshot::Sender<()>,
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        tracing::debug!("location tracking stopped");
    }
}

/// Location tracking controller
pub struct LocationTracker<S, K> {
    source: Arc<S>,
    sink: K,
    config: LocationConfig,
    state: Arc<watch::Sender<TrackingState>>,
    session: Option<TrackingSession>,
}

impl<S, K> LocationTracker<S, K>
where
    S: PositionSource,
    K: ActionSink + Clone,
{
    pub fn new(source: Arc<S>, sink: K, config: LocationConfig) -> Self {
        let (state, _) = watch::channel(TrackingState::default());
        Self {
            source,
            sink,
            config,
            state: Arc::new(state),
            session: None,
        }
    }

    /// Build a tracker and enable it right away
    pub fn start(source: Arc<S>, sink: K, config: LocationConfig) -> Self {
        let mut tracker = Self::new(source, sink, config);
        tracker.set_enabled(true);
        tracker
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    /// Enable or disable tracking; must be called inside a tokio runtime
    pub fn set_enabled(&mut self, enabled: bool) {
        match (enabled, self.session.is_some()) {
            (true, false) => self.session = Some(self.begin()),
            (false, true) => self.session = None,
            _ => {}
        }
    }

    pub fn stop(&mut self) {
        self.set_enabled(false);
    }

    pub fn position(&self) -> Option<Position> {
        self.state.borrow().position.clone()
    }

    pub fn error(&self) -> Option<PositionError> {
        self.state.borrow().error.clone()
    }

    pub fn state(&self) -> TrackingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingState> {
        self.state.subscribe()
    }

    fn begin(&self) -> TrackingSession {
        let state = Arc::clone(&self.state);
        let platform_watch = self.source.watch(Box::new(move |update| {
            state.send_modify(|s| match update {
                Ok(position) => {
                    s.position = Some(position);
                    s.error = None;
                }
                Err(e) => s.error = Some(e),
            });
        }));

        let reporter = LocationReporter::new(
            self.sink.clone(),
            MovementFilter::new(self.config.min_displacement_m),
        );
        let (shutdown, stopped) = oneshot::channel();
        tokio::spawn(report_loop(
            Arc::clone(&self.source),
            reporter,
            SampleOptions::from(&self.config),
            self.config.report_interval(),
            Arc::clone(&self.state),
            stopped,
        ));

        tracing::debug!(
            interval_secs = self.config.report_interval_secs,
            "location tracking started"
        );
        TrackingSession {
            _watch: platform_watch,
            _shutdown: shutdown,
        }
    }
}

async fn report_loop<S: PositionSource, K: ActionSink>(
    source: Arc<S>,
    mut reporter: LocationReporter<K>,
    options: SampleOptions,
    period: Duration,
    state: Arc<watch::Sender<TrackingState>>,
    mut stopped: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Sampling may be cut short; a submit already started may not.
        let fix = tokio::select! {
            _ = &mut stopped => break,
            fix = take_sample(source.as_ref(), options) => fix,
        };
        if let Some(fix) = fix {
            report(&mut reporter, fix, &state).await;
        }

        tokio::select! {
            _ = &mut stopped => break,
            _ = ticker.tick() => {}
        }
    }
}

async fn take_sample<S: PositionSource>(source: &S, options: SampleOptions) -> Option<Position> {
    match tokio::time::timeout(options.timeout, source.current_position(options)).await {
        Ok(Ok(fix)) => Some(fix),
        Ok(Err(e)) => {
            tracing::warn!("skipping location report: {}", e);
            None
        }
        Err(_) => {
            tracing::warn!("skipping location report: {}", PositionError::Timeout);
            None
        }
    }
}

async fn report<K: ActionSink>(
    reporter: &mut LocationReporter<K>,
    sample: Position,
    state: &watch::Sender<TrackingState>,
) {
    if let ReportOutcome::Reported(_) = reporter.report(sample).await {
        let reported = reporter.last_reported().cloned();
        state.send_modify(|s| s.last_reported = reported);
    }
}
