//! Telemetry event notifications.
//!
//! The categorizer reports what happened (a blushy site was hit, a site was
//! whitelisted, ...) through an [`EventSink`]. Batching and upload live with
//! the host; sinks here only hand events over and never block.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Named events reported to the telemetry collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// The user added a site with "blush this site".
    AddBlushlist,
    /// A search query matched the searchterms list and was not excused.
    BlushyQuery,
    /// A host matched the blushlist and was not excused.
    BlushySite,
    /// The user forgot a site.
    ForgetSite,
    /// The user chose to continue in a normal window.
    OpenNormal,
    /// The user chose to continue in a private window.
    OpenPrivate,
    /// A user-added site was taken off the blushlist.
    RemoveBlushlist,
    /// A blushy query was let through because it is whitelisted.
    WhitelistedQuery,
    /// A blushy site was let through because it is whitelisted.
    WhitelistedSite,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddBlushlist => "add-blushlist",
            Self::BlushyQuery => "blushy-query",
            Self::BlushySite => "blushy-site",
            Self::ForgetSite => "forget-site",
            Self::OpenNormal => "open-normal",
            Self::OpenPrivate => "open-private",
            Self::RemoveBlushlist => "remove-blushlist",
            Self::WhitelistedQuery => "whitelisted-query",
            Self::WhitelistedSite => "whitelisted-site",
        };
        f.write_str(name)
    }
}

/// An event stamped with the hour it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Start of the hour the event happened in.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub event: EventKind,
}

impl TelemetryEvent {
    /// Stamp `event` with the current hour.
    #[must_use]
    pub fn now(event: EventKind) -> Self {
        Self::at(event, Utc::now())
    }

    /// Stamp `event` with the hour containing `at`. Minutes and below are
    /// dropped so uploads cannot be matched to individual page loads.
    #[must_use]
    pub fn at(event: EventKind, at: DateTime<Utc>) -> Self {
        let timestamp = at.duration_trunc(TimeDelta::hours(1)).unwrap_or(at);
        Self { timestamp, event }
    }
}

/// Fire-and-forget receiver of telemetry events.
pub trait EventSink: Send + Sync {
    /// Report an event. Must not block or fail.
    fn notify(&self, event: EventKind);
}

/// Discards every event. Used when reporting is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&self, _event: EventKind) {}
}

/// Forwards events to an uploader task over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the uploader reads from.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: EventKind) {
        if let Err(e) = self.tx.try_send(TelemetryEvent::now(event)) {
            debug!(%event, error = %e, "Dropping telemetry event");
        }
    }
}

/// Keeps events in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event kinds recorded so far.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.lock().iter().map(|e| e.event).collect()
    }

    /// Take all recorded events, leaving the sink empty.
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TelemetryEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: EventKind) {
        self.lock().push(TelemetryEvent::now(event));
    }
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn notify(&self, event: EventKind) {
        (**self).notify(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn notify(&self, event: EventKind) {
        (**self).notify(event);
    }
}
