// ── Heartbeat responder ──
//
// Answers the server's liveness probe. Acks are spawned and never awaited
// by the read loop; a failed ack is logged and otherwise ignored, since the
// server decides what a missed ack means.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pushline_api::EventRecord;

use crate::credentials::CredentialProvider;
use crate::link::ChannelLink;

pub struct HeartbeatResponder {
    link: Arc<dyn ChannelLink>,
    credentials: Arc<dyn CredentialProvider>,
    probe_event: String,
    last_acked_id: Mutex<Option<String>>,
}

impl HeartbeatResponder {
    pub fn new(
        link: Arc<dyn ChannelLink>,
        credentials: Arc<dyn CredentialProvider>,
        probe_event: impl Into<String>,
    ) -> Self {
        Self {
            link,
            credentials,
            probe_event: probe_event.into(),
            last_acked_id: Mutex::new(None),
        }
    }

    pub fn probe_event(&self) -> &str {
        &self.probe_event
    }

    pub fn is_probe(&self, record: &EventRecord) -> bool {
        record.event_type == self.probe_event
    }

    /// Acknowledge `probe` once. Returns the spawned ack task, or `None`
    /// when the probe was already acknowledged or no token is available.
    pub fn respond(&self, probe: &EventRecord) -> Option<JoinHandle<()>> {
        if !probe.id.is_empty() {
            let mut last = self
                .last_acked_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(probe.id.as_str()) {
                debug!(probe_id = %probe.id, "Probe already acknowledged");
                return None;
            }
            *last = Some(probe.id.clone());
        }

        let Some(token) = self.credentials.bearer_token() else {
            warn!("No bearer token for heartbeat ack, skipping");
            return None;
        };

        let link = Arc::clone(&self.link);
        let probe_id = probe.id.clone();
        Some(tokio::spawn(async move {
            match link.acknowledge(&token).await {
                Ok(()) => debug!(%probe_id, "Heartbeat acknowledged"),
                Err(e) => warn!(error = %e, %probe_id, "Heartbeat ack failed"),
            }
        }))
    }
}
