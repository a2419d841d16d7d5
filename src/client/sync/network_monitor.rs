//! # Network Monitor
//!
//! Single process-wide view of platform connectivity. Components read the
//! current flag with [`NetworkMonitor::is_online`] and listen for
//! transitions through [`NetworkMonitor::subscribe`].
//!
//! The flag is best effort: it may say "online" while the API host is
//! unreachable. The sync processor handles call failures on its own, so a
//! false positive only costs one failed attempt.

use crate::client::subscription::Subscription;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 16;

/// Connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    WentOnline,
    WentOffline,
}

/// Platform connectivity source (browser `online`/`offline` events, OS
/// reachability callbacks, ...)
pub trait ConnectivityProvider {
    /// Connectivity right now
    fn is_online(&self) -> bool;

    /// Register a handler called with the new state on every change
    fn subscribe(&self, handler: Box<dyn Fn(bool) + Send + Sync>) -> Subscription;
}

#[derive(Debug)]
struct MonitorInner {
    online: watch::Sender<bool>,
    events: broadcast::Sender<NetworkEvent>,
    platform: Mutex<Option<Subscription>>,
}

/// Shared handle to the connectivity flag; clones observe the same state
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (online, _) = watch::channel(initially_online);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(MonitorInner {
                online,
                events,
                platform: Mutex::new(None),
            }),
        }
    }

    /// Build a monitor seeded from the platform and attached to its events
    pub fn from_provider(provider: &impl ConnectivityProvider) -> Self {
        let monitor = Self::new(provider.is_online());
        monitor.attach(provider);
        monitor
    }

    /// Follow a platform provider, replacing any earlier attachment
    pub fn attach(&self, provider: &impl ConnectivityProvider) {
        let weak: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let subscription = provider.subscribe(Box::new(move |online| {
            if let Some(inner) = weak.upgrade() {
                NetworkMonitor { inner }.set_online(online);
            }
        }));

        self.set_online(provider.is_online());
        let previous = self.lock_platform().replace(subscription);
        drop(previous);
    }

    /// Stop following the platform provider
    pub fn detach(&self) {
        let subscription = self.lock_platform().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    /// Record a connectivity change; emits an event only on a transition
    pub fn set_online(&self, online: bool) {
        let changed = self.inner.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            let event = if online {
                NetworkEvent::WentOnline
            } else {
                NetworkEvent::WentOffline
            };
            tracing::info!(?event, "network state changed");
            // No receivers is fine: nobody is waiting on transitions yet.
            let _ = self.inner.events.send(event);
        }
    }

    /// Stream of transitions from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.inner.events.subscribe()
    }

    fn lock_platform(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.inner
            .platform
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
