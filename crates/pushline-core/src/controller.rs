// ── Channel controller ──
//
// Full lifecycle management for one push channel: claiming and opening an
// attempt, consuming the stream, routing probes to the heartbeat responder,
// and arming reconnections through the scheduler. This is the only place
// that opens or closes the transport-level stream.
//
// All state lives behind one `std::sync::Mutex` that is never held across
// an `.await`. Each attempt carries an epoch; results from an attempt whose
// epoch has been superseded are dropped without touching state.
//
// A second lock, `transitions`, is held from a state change until its sink
// notifications have been sent, so the sink sees changes in the order they
// were made. Lock order is always `transitions` then `state`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::SecretString;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pushline_api::{ByteStream, EventRecord, FrameParser};

use crate::config::ChannelConfig;
use crate::credentials::CredentialProvider;
use crate::error::ChannelError;
use crate::heartbeat::HeartbeatResponder;
use crate::link::ChannelLink;
use crate::reconnect::{Decision, ReconnectPolicy, ReconnectScheduler};
use crate::sink::{ConnectionState, StateSink};

// ── Phase ────────────────────────────────────────────────────────

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing open or pending. Initial state, and the state after an
    /// explicit disconnect or an exhausted retry budget.
    Idle,
    /// Open request in flight.
    Opening,
    /// Channel open, read loop running.
    Streaming,
    /// Waiting out the backoff delay before the next attempt.
    ReconnectPending,
}

// ── ConnectionHandle ─────────────────────────────────────────────

/// Identifies the currently open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// Fresh for every successful open.
    pub connection_id: Uuid,
    /// Subject the channel was opened for.
    pub identity: String,
}

// ── Attempt outcomes ─────────────────────────────────────────────

/// How an open request ended.
enum OpenOutcome {
    Opened(ByteStream),
    Cancelled,
    Failed(pushline_api::Error),
}

/// How a read loop ended.
enum Termination {
    Cancelled,
    EndOfStream,
    Failed(pushline_api::Error),
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    /// External `connect` call.
    Caller,
    /// Armed reconnection timer for the given epoch.
    Scheduled { epoch: u64 },
}

// ── ChannelState ─────────────────────────────────────────────────

struct ChannelState {
    phase: Phase,
    /// Identity of the attempt in flight, open, or pending.
    identity: Option<String>,
    handle: Option<ConnectionHandle>,
    cancel: Option<CancellationToken>,
    timer: Option<JoinHandle<()>>,
    scheduler: ReconnectScheduler,
    epoch: u64,
}

impl ChannelState {
    fn new(policy: ReconnectPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            identity: None,
            handle: None,
            cancel: None,
            timer: None,
            scheduler: ReconnectScheduler::new(policy),
            epoch: 0,
        }
    }

    /// Cancel whatever is live and return to `Idle`. Returns `true` if
    /// anything was live.
    fn teardown(&mut self) -> bool {
        let was_active = self.phase != Phase::Idle;

        self.epoch = self.epoch.wrapping_add(1);
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.handle = None;
        self.identity = None;
        self.phase = Phase::Idle;

        was_active
    }
}

// ── ChannelController ────────────────────────────────────────────

/// Owner of the push channel lifecycle.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Construct one per
/// application and share it; it keeps at most one channel open.
/// [`connect`](Self::connect) and [`disconnect`](Self::disconnect) must be
/// called from within a Tokio runtime.
#[derive(Clone)]
pub struct ChannelController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    link: Arc<dyn ChannelLink>,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn StateSink>,
    heartbeat: HeartbeatResponder,
    transitions: Mutex<()>,
    state: Mutex<ChannelState>,
}

impl ChannelController {
    pub fn new(
        link: Arc<dyn ChannelLink>,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn StateSink>,
        policy: ReconnectPolicy,
        probe_event: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        policy
            .validate()
            .map_err(|message| ChannelError::Config { message })?;

        let heartbeat =
            HeartbeatResponder::new(Arc::clone(&link), Arc::clone(&credentials), probe_event);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                link,
                credentials,
                sink,
                heartbeat,
                transitions: Mutex::new(()),
                state: Mutex::new(ChannelState::new(policy)),
            }),
        })
    }

    /// Build a controller backed by a real HTTP client.
    pub fn from_config(
        config: &ChannelConfig,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn StateSink>,
    ) -> Result<Self, ChannelError> {
        let client = config.build_client()?;
        Self::new(
            Arc::new(client),
            credentials,
            sink,
            config.reconnect.clone(),
            config.probe_event.clone(),
        )
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the channel for `identity`.
    ///
    /// Returns immediately; progress is reported through the sink. A call
    /// while an attempt is in flight, or while the channel is open for the
    /// same identity, does nothing. A call for a different identity while
    /// open replaces the channel.
    pub fn connect(&self, identity: impl Into<String>) {
        self.begin_attempt(identity.into(), Trigger::Caller);
    }

    /// Close the channel and cancel any pending reconnection.
    ///
    /// Idempotent: only the first call after activity notifies the sink.
    pub fn disconnect(&self) {
        let _transition = self.lock_transitions();
        let was_active = self.lock_state().teardown();

        if was_active {
            info!("Push channel disconnected");
            self.inner.sink.on_state(&ConnectionState::Disconnected);
        } else {
            debug!("Push channel already disconnected");
        }
    }

    /// Forward a new bearer token to the credential provider. Takes effect
    /// on the next open or heartbeat.
    pub fn set_token(&self, token: Option<SecretString>) {
        self.inner.credentials.set_token(token);
    }

    // ── State observation ────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.lock_state().phase
    }

    /// The open channel, if any.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.lock_state().handle.clone()
    }

    pub fn connection_id(&self) -> Option<Uuid> {
        self.lock_state().handle.as_ref().map(|h| h.connection_id)
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempt_count(&self) -> u32 {
        self.lock_state().scheduler.attempt_count()
    }

    // ── Attempt ──────────────────────────────────────────────────

    fn begin_attempt(&self, identity: String, trigger: Trigger) {
        let _transition = self.lock_transitions();

        let Some(token) = self.inner.credentials.bearer_token() else {
            self.report_missing_credential(&identity, trigger);
            return;
        };

        let Some((epoch, cancel)) = self.claim_attempt(&identity, trigger) else {
            return;
        };

        self.inner.sink.on_state(&ConnectionState::Connecting {
            identity: identity.clone(),
        });

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_attempt(epoch, identity, token, cancel).await;
        });
    }

    /// Check the guard and, if permitted, mark an attempt as in progress.
    /// Runs entirely under the state lock so two racing calls cannot both
    /// pass.
    fn claim_attempt(
        &self,
        identity: &str,
        trigger: Trigger,
    ) -> Option<(u64, CancellationToken)> {
        let mut state = self.lock_state();

        match trigger {
            Trigger::Caller => {
                match state.phase {
                    Phase::Opening => {
                        debug!(%identity, pending = ?state.identity, "Push channel attempt already in flight");
                        return None;
                    }
                    Phase::Streaming if state.identity.as_deref() == Some(identity) => {
                        debug!(%identity, "Push channel already open");
                        return None;
                    }
                    Phase::Streaming => {
                        info!(from = ?state.identity, to = %identity, "Switching push channel identity");
                        state.teardown();
                    }
                    Phase::ReconnectPending => {
                        debug!(%identity, "Connect preempts pending reconnection");
                        state.teardown();
                    }
                    Phase::Idle => {}
                }
                state.scheduler.reset();
            }
            Trigger::Scheduled { epoch } => {
                if state.epoch != epoch || state.phase != Phase::ReconnectPending {
                    debug!(%identity, "Scheduled reconnection superseded");
                    return None;
                }
                // This is the timer's own task; forget the handle.
                state.timer = None;
            }
        }

        state.epoch = state.epoch.wrapping_add(1);
        let cancel = CancellationToken::new();
        state.phase = Phase::Opening;
        state.identity = Some(identity.to_owned());
        state.cancel = Some(cancel.clone());

        Some((state.epoch, cancel))
    }

    fn report_missing_credential(&self, identity: &str, trigger: Trigger) {
        let parked = match trigger {
            Trigger::Caller => false,
            Trigger::Scheduled { epoch } => {
                let mut state = self.lock_state();
                if state.epoch != epoch || state.phase != Phase::ReconnectPending {
                    return;
                }
                // Running inside the timer task; don't abort ourselves.
                state.timer = None;
                state.teardown()
            }
        };

        warn!(%identity, "No bearer token available, push channel not opened");
        self.inner.sink.on_error(&ChannelError::MissingCredential);
        if parked {
            self.inner.sink.on_state(&ConnectionState::Disconnected);
        }
    }

    /// Drive one attempt: open, then read until the stream ends.
    async fn run_attempt(
        self,
        epoch: u64,
        identity: String,
        token: Arc<SecretString>,
        cancel: CancellationToken,
    ) {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => OpenOutcome::Cancelled,
            result = self.inner.link.open(&identity, &token) => match result {
                Ok(reader) => OpenOutcome::Opened(reader),
                Err(e) => OpenOutcome::Failed(e),
            },
        };

        let reader = match opened {
            OpenOutcome::Opened(reader) => reader,
            OpenOutcome::Cancelled => {
                debug!(%identity, "Push channel open cancelled");
                return;
            }
            OpenOutcome::Failed(e) => {
                warn!(error = %e, status = ?e.status(), %identity, "Push channel open failed");
                self.handle_loss(epoch, &identity, Some(e));
                return;
            }
        };

        {
            let _transition = self.lock_transitions();
            let Some(handle) = self.mark_open(epoch, &identity) else {
                debug!(%identity, "Push channel opened after teardown, dropping it");
                return;
            };

            info!(%identity, connection_id = %handle.connection_id, "Push channel open");
            self.inner.sink.on_state(&ConnectionState::Connected {
                connection_id: handle.connection_id,
                identity: handle.identity,
            });
        }

        match self.consume(epoch, reader, &cancel).await {
            Termination::Cancelled => {
                debug!(%identity, "Push channel read loop cancelled");
            }
            Termination::EndOfStream => {
                info!(%identity, "Push channel closed by server");
                self.handle_loss(epoch, &identity, None);
            }
            Termination::Failed(e) => {
                warn!(error = %e, %identity, "Push channel read failed");
                self.handle_loss(epoch, &identity, Some(e));
            }
        }
    }

    fn mark_open(&self, epoch: u64, identity: &str) -> Option<ConnectionHandle> {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            return None;
        }

        let handle = ConnectionHandle {
            connection_id: Uuid::new_v4(),
            identity: identity.to_owned(),
        };
        state.phase = Phase::Streaming;
        state.scheduler.reset();
        state.handle = Some(handle.clone());

        Some(handle)
    }

    /// Read chunks until cancellation, end of stream, or a read error.
    /// The reader is dropped on every exit path.
    async fn consume(
        &self,
        epoch: u64,
        mut reader: ByteStream,
        cancel: &CancellationToken,
    ) -> Termination {
        let mut parser = FrameParser::new();

        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Termination::Cancelled,
                chunk = reader.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    let records = parser.feed(&bytes);
                    if !records.is_empty() {
                        self.dispatch(epoch, &records);
                    }
                }
                Some(Err(e)) => return Termination::Failed(e),
                None => return Termination::EndOfStream,
            }
        }
    }

    /// Route parsed records, unless the attempt was superseded while the
    /// chunk was being read.
    fn dispatch(&self, epoch: u64, records: &[EventRecord]) {
        let _transition = self.lock_transitions();
        if self.lock_state().epoch != epoch {
            return;
        }

        for record in records {
            if self.inner.heartbeat.is_probe(record) {
                self.inner.heartbeat.respond(record);
            } else {
                self.inner.sink.on_event(record);
            }
        }
    }

    // ── Loss & reconnection ──────────────────────────────────────

    /// Route a failed or ended attempt through the scheduler.
    fn handle_loss(&self, epoch: u64, identity: &str, error: Option<pushline_api::Error>) {
        let _transition = self.lock_transitions();

        let decision = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                debug!(%identity, "Ignoring loss of superseded push channel attempt");
                return;
            }

            state.handle = None;
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }

            let decision = state.scheduler.next_attempt();
            match decision {
                Decision::Retry { delay, .. } => {
                    state.phase = Phase::ReconnectPending;
                    let timer = self.arm_reconnect(epoch, identity.to_owned(), delay);
                    if let Some(previous) = state.timer.replace(timer) {
                        previous.abort();
                    }
                }
                Decision::Exhausted { .. } => {
                    state.teardown();
                }
            }
            decision
        };

        if let Some(e) = error {
            self.inner.sink.on_error(&ChannelError::from(e));
        }

        match decision {
            Decision::Retry { attempt, delay } => {
                info!(
                    %identity,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Waiting before reconnect"
                );
                self.inner
                    .sink
                    .on_state(&ConnectionState::Reconnecting { attempt, delay });
            }
            Decision::Exhausted { attempts } => {
                error!(%identity, attempts, "Push channel reconnection limit reached, giving up");
                self.inner
                    .sink
                    .on_error(&ChannelError::MaxAttemptsExceeded { attempts });
                self.inner.sink.on_state(&ConnectionState::Disconnected);
            }
        }
    }

    fn arm_reconnect(&self, epoch: u64, identity: String, delay: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.begin_attempt(identity, Trigger::Scheduled { epoch });
        })
    }

    fn lock_transitions(&self) -> MutexGuard<'_, ()> {
        self.inner
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::testing::{FakeLink, OpenScript, RecordingSink, settle};

    fn controller(
        link: &Arc<FakeLink>,
        sink: &Arc<RecordingSink>,
        token: Option<&str>,
    ) -> ChannelController {
        let credentials = Arc::new(StaticCredentials::new(token.map(SecretString::from)));
        ChannelController::new(
            link.clone(),
            credentials,
            sink.clone(),
            ReconnectPolicy::default(),
            "ping",
        )
        .unwrap()
    }

    fn setup() -> (Arc<FakeLink>, Arc<RecordingSink>, ChannelController) {
        let link = Arc::new(FakeLink::new());
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&link, &sink, Some("secret"));
        (link, sink, controller)
    }

    fn connecting(identity: &str) -> ConnectionState {
        ConnectionState::Connecting {
            identity: identity.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_connects_issue_one_open() {
        let (link, sink, controller) = setup();
        link.push(OpenScript::Hang);

        controller.connect("alice");
        controller.connect("alice");
        controller.connect("bob");
        settle().await;

        assert_eq!(link.open_count(), 1);
        assert_eq!(controller.phase(), Phase::Opening);
        assert_eq!(sink.states(), vec![connecting("alice")]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_an_open_is_silent_and_idempotent() {
        let (link, sink, controller) = setup();
        link.push(OpenScript::Hang);

        controller.connect("alice");
        settle().await;
        controller.disconnect();
        controller.disconnect();
        sleep(Duration::from_secs(60)).await;

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(link.open_count(), 1);
        assert!(sink.errors().is_empty());
        assert_eq!(
            sink.states(),
            vec![connecting("alice"), ConnectionState::Disconnected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_when_idle_notifies_nothing() {
        let (_link, sink, controller) = setup();

        controller.disconnect();

        assert!(sink.notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_exponentially_then_give_up() {
        let (link, sink, controller) = setup();

        controller.connect("alice");
        sleep(Duration::from_secs(60)).await;

        assert_eq!(link.open_count(), 6);
        assert_eq!(link.open_gaps_ms(), vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(controller.phase(), Phase::Idle);

        let errors = sink.errors();
        assert_eq!(errors.len(), 7);
        assert!(errors[..6]
            .iter()
            .all(|e| matches!(e, ChannelError::Rejected { status: 503, .. })));
        assert_eq!(errors[6], ChannelError::MaxAttemptsExceeded { attempts: 5 });

        let reconnecting: Vec<u32> = sink
            .states()
            .iter()
            .filter_map(|s| match s {
                ConnectionState::Reconnecting { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(reconnecting, vec![1, 2, 3, 4, 5]);
        assert_eq!(sink.states().last(), Some(&ConnectionState::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_open_resets_attempt_count() {
        let (link, sink, controller) = setup();

        controller.connect("alice");
        settle().await;
        assert_eq!(controller.attempt_count(), 1);
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(controller.attempt_count(), 2);
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(controller.attempt_count(), 3);

        let _tx = link.push_stream();
        sleep(Duration::from_millis(4000)).await;

        assert_eq!(controller.phase(), Phase::Streaming);
        assert_eq!(controller.attempt_count(), 0);
        let handle = controller.handle().unwrap();
        assert_eq!(handle.identity, "alice");
        assert_eq!(controller.connection_id(), Some(handle.connection_id));
        assert_eq!(
            sink.states().last(),
            Some(&ConnectionState::Connected {
                connection_id: handle.connection_id,
                identity: "alice".into(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_stream_schedules_reconnect() {
        let (link, sink, controller) = setup();
        let tx = link.push_stream();

        controller.connect("alice");
        settle().await;
        assert_eq!(controller.phase(), Phase::Streaming);

        drop(tx);
        settle().await;

        assert_eq!(controller.phase(), Phase::ReconnectPending);
        assert_eq!(controller.handle(), None);
        assert!(sink.errors().is_empty());
        assert_eq!(
            sink.states().last(),
            Some(&ConnectionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_millis(1000),
            })
        );

        let _tx = link.push_stream();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(link.open_count(), 2);
        assert_eq!(controller.phase(), Phase::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn read_error_is_reported_and_schedules_reconnect() {
        let (link, sink, controller) = setup();
        let tx = link.push_stream();

        controller.connect("alice");
        settle().await;
        tx.send(Err(pushline_api::Error::Status {
            endpoint: "/stream".into(),
            status: 502,
        }))
        .unwrap();
        settle().await;

        assert_eq!(controller.phase(), Phase::ReconnectPending);
        assert_eq!(sink.errors().len(), 1);
        assert!(matches!(
            sink.errors()[0],
            ChannelError::Rejected { status: 502, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_prevents_open() {
        let link = Arc::new(FakeLink::new());
        let sink = Arc::new(RecordingSink::default());
        let controller = controller(&link, &sink, None);

        controller.connect("alice");
        settle().await;

        assert_eq!(link.open_count(), 0);
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(sink.errors(), vec![ChannelError::MissingCredential]);
        assert!(sink.states().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn token_removed_before_scheduled_retry_parks_controller() {
        let (link, sink, controller) = setup();

        controller.connect("alice");
        settle().await;
        controller.set_token(None);
        sleep(Duration::from_secs(5)).await;

        assert_eq!(link.open_count(), 1);
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(sink.errors().last(), Some(&ChannelError::MissingCredential));
        assert_eq!(sink.states().last(), Some(&ConnectionState::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn switching_identity_replaces_the_channel() {
        let (link, sink, controller) = setup();
        let alice_tx = link.push_stream();
        let _bob_tx = link.push_stream();

        controller.connect("alice");
        settle().await;
        let first = controller.connection_id().unwrap();

        controller.connect("alice");
        settle().await;
        assert_eq!(link.open_count(), 1);

        controller.connect("bob");
        settle().await;

        assert_eq!(link.opened_identities(), vec!["alice", "bob"]);
        assert!(alice_tx.is_closed());
        assert_eq!(controller.phase(), Phase::Streaming);
        let handle = controller.handle().unwrap();
        assert_eq!(handle.identity, "bob");
        assert_ne!(handle.connection_id, first);
        assert!(sink.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn probes_are_acknowledged_and_not_forwarded() {
        let (link, sink, controller) = setup();
        let tx = link.push_stream();

        controller.connect("alice");
        settle().await;
        tx.send(Ok(Bytes::from_static(
            b"event: notification\ndata: one\n\n\
              event: ping\ndata: ok\nid: p-1\n\n\
              event: notification\ndata: two\n\n",
        )))
        .unwrap();
        settle().await;

        assert_eq!(link.ack_count(), 1);
        assert_eq!(
            sink.events(),
            vec![
                EventRecord::new("notification", "one", ""),
                EventRecord::new("notification", "two", ""),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn records_split_across_chunks_are_reassembled() {
        let (link, sink, controller) = setup();
        let tx = link.push_stream();

        controller.connect("alice");
        settle().await;
        tx.send(Ok(Bytes::from_static(b"event: notif"))).unwrap();
        tx.send(Ok(Bytes::from_static(b"ication\ndata: hel"))).unwrap();
        tx.send(Ok(Bytes::from_static(b"lo\n\n"))).unwrap();
        settle().await;

        assert_eq!(
            sink.events(),
            vec![EventRecord::new("notification", "hello", "")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_preempts_pending_reconnect() {
        let (link, _sink, controller) = setup();

        controller.connect("alice");
        settle().await;
        assert_eq!(controller.phase(), Phase::ReconnectPending);

        link.push(OpenScript::Hang);
        controller.connect("alice");
        settle().await;
        assert_eq!(link.open_count(), 2);
        assert_eq!(controller.phase(), Phase::Opening);

        // The old timer must not fire a third open.
        sleep(Duration::from_secs(10)).await;
        assert_eq!(link.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let (link, sink, controller) = setup();

        controller.connect("alice");
        settle().await;
        controller.disconnect();
        sleep(Duration::from_secs(60)).await;

        assert_eq!(link.open_count(), 1);
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(sink.states().last(), Some(&ConnectionState::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn caller_connect_after_exhaustion_starts_a_fresh_budget() {
        let (link, _sink, controller) = setup();

        controller.connect("alice");
        sleep(Duration::from_secs(60)).await;
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.attempt_count(), 5);

        controller.connect("alice");
        settle().await;

        assert_eq!(link.open_count(), 7);
        assert_eq!(controller.attempt_count(), 1);
        assert_eq!(controller.phase(), Phase::ReconnectPending);
    }

    #[test]
    fn out_of_range_jitter_is_rejected_at_construction() {
        let link = Arc::new(FakeLink::new());
        let sink = Arc::new(RecordingSink::default());
        let credentials = Arc::new(StaticCredentials::new(Some(SecretString::from("t"))));
        let policy = ReconnectPolicy {
            jitter: 3.0,
            ..ReconnectPolicy::default()
        };

        let result = ChannelController::new(link, credentials, sink, policy, "ping");

        assert!(matches!(result, Err(ChannelError::Config { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disconnect_during_slow_failure_report_ends_disconnected() {
        let link = Arc::new(FakeLink::new());
        let sink = Arc::new(RecordingSink::slow_on_error(Duration::from_millis(300)));
        let controller = controller(&link, &sink, Some("secret"));

        controller.connect("alice");
        // The failed open is still being reported when disconnect arrives.
        sleep(Duration::from_millis(100)).await;
        controller.disconnect();
        sleep(Duration::from_millis(400)).await;

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(link.open_count(), 1);
        assert_eq!(sink.states().last(), Some(&ConnectionState::Disconnected));
    }
}
