// ── State sink ──
//
// One-way notifications from the controller to whoever observes the
// channel. The sink only ever receives shared references and owns no handle
// back into the controller, so it cannot mutate channel state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use pushline_api::EventRecord;

use crate::error::ChannelError;

const EVENT_CHANNEL_SIZE: usize = 256;
const ERROR_CHANNEL_SIZE: usize = 16;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting {
        identity: String,
    },
    Connected {
        connection_id: Uuid,
        identity: String,
    },
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

// ── StateSink ────────────────────────────────────────────────────

/// Observer of channel lifecycle, errors, and forwarded events.
///
/// Called from the controller's tasks, in the order state changed.
/// Implementations must not block and must not call back into
/// `connect` or `disconnect`.
pub trait StateSink: Send + Sync {
    fn on_state(&self, state: &ConnectionState);

    fn on_error(&self, error: &ChannelError);

    /// A non-probe record arrived on the channel.
    fn on_event(&self, event: &EventRecord);
}

// ── BroadcastSink ────────────────────────────────────────────────

/// Sink that fans notifications out over tokio channels.
///
/// Connection state goes through a `watch` (latest value wins); events
/// and errors through `broadcast` channels. Lagging subscribers receive
/// [`broadcast::error::RecvError::Lagged`].
pub struct BroadcastSink {
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<Arc<EventRecord>>,
    errors: broadcast::Sender<Arc<ChannelError>>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_SIZE);
        Self {
            state,
            events,
            errors,
        }
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to forwarded events.
    pub fn events(&self) -> broadcast::Receiver<Arc<EventRecord>> {
        self.events.subscribe()
    }

    /// Subscribe to reported errors.
    pub fn errors(&self) -> broadcast::Receiver<Arc<ChannelError>> {
        self.errors.subscribe()
    }
}

impl StateSink for BroadcastSink {
    fn on_state(&self, state: &ConnectionState) {
        self.state.send_replace(state.clone());
    }

    fn on_error(&self, error: &ChannelError) {
        // No subscribers is fine.
        let _ = self.errors.send(Arc::new(error.clone()));
    }

    fn on_event(&self, event: &EventRecord) {
        let _ = self.events.send(Arc::new(event.clone()));
    }
}
