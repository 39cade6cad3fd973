// In-memory link and recording sink for driving the controller in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::time::Instant;

use pushline_api::{ByteStream, EventRecord};

use crate::error::ChannelError;
use crate::link::ChannelLink;
use crate::sink::{ConnectionState, StateSink};

/// What the next `open` call does.
pub(crate) enum OpenScript {
    /// Never resolves.
    Hang,
    /// Rejects with the given HTTP status.
    Reject(u16),
    /// Succeeds; the stream yields whatever the paired sender pushes and
    /// ends when the sender is dropped.
    Stream(mpsc::UnboundedReceiver<Result<Bytes, pushline_api::Error>>),
}

pub(crate) struct FakeLink {
    script: Mutex<VecDeque<OpenScript>>,
    opens: Mutex<Vec<(String, Instant)>>,
    acks: AtomicUsize,
    ack_failure: Mutex<Option<u16>>,
}

impl FakeLink {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            opens: Mutex::new(Vec::new()),
            acks: AtomicUsize::new(0),
            ack_failure: Mutex::new(None),
        }
    }

    pub(crate) fn push(&self, step: OpenScript) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Queue a successful open and return the sender feeding its body.
    pub(crate) fn push_stream(&self) -> mpsc::UnboundedSender<Result<Bytes, pushline_api::Error>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(OpenScript::Stream(rx));
        tx
    }

    pub(crate) fn fail_acks_with(&self, status: u16) {
        *self.ack_failure.lock().unwrap() = Some(status);
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub(crate) fn opened_identities(&self) -> Vec<String> {
        self.opens.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Gaps between consecutive open calls, in milliseconds.
    pub(crate) fn open_gaps_ms(&self) -> Vec<u128> {
        let opens = self.opens.lock().unwrap();
        opens
            .windows(2)
            .map(|pair| (pair[1].1 - pair[0].1).as_millis())
            .collect()
    }

    pub(crate) fn ack_count(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }
}

impl ChannelLink for FakeLink {
    fn open<'a>(
        &'a self,
        identity: &'a str,
        _token: &'a SecretString,
    ) -> BoxFuture<'a, Result<ByteStream, pushline_api::Error>> {
        self.opens
            .lock()
            .unwrap()
            .push((identity.to_owned(), Instant::now()));

        // An empty script rejects, like a server that is down.
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OpenScript::Reject(503));

        match step {
            OpenScript::Hang => futures_util::future::pending().boxed(),
            OpenScript::Reject(status) => async move {
                Err(pushline_api::Error::Status {
                    endpoint: "/stream".into(),
                    status,
                })
            }
            .boxed(),
            OpenScript::Stream(rx) => {
                let body = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                let stream: ByteStream = Box::pin(body);
                async move { Ok(stream) }.boxed()
            }
        }
    }

    fn acknowledge<'a>(
        &'a self,
        _token: &'a SecretString,
    ) -> BoxFuture<'a, Result<(), pushline_api::Error>> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        let failure = *self.ack_failure.lock().unwrap();
        Box::pin(async move {
            match failure {
                Some(status) => Err(pushline_api::Error::Status {
                    endpoint: "/heartbeat".into(),
                    status,
                }),
                None => Ok(()),
            }
        })
    }
}

/// Everything a sink was told, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notice {
    State(ConnectionState),
    Error(ChannelError),
    Event(EventRecord),
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
    error_delay: Option<Duration>,
}

impl RecordingSink {
    /// A sink whose `on_error` blocks the calling thread for `delay`.
    pub(crate) fn slow_on_error(delay: Duration) -> Self {
        Self {
            error_delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub(crate) fn errors(&self) -> Vec<ChannelError> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn events(&self) -> Vec<EventRecord> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn states(&self) -> Vec<ConnectionState> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl StateSink for RecordingSink {
    fn on_state(&self, state: &ConnectionState) {
        self.notices.lock().unwrap().push(Notice::State(state.clone()));
    }

    fn on_error(&self, error: &ChannelError) {
        if let Some(delay) = self.error_delay {
            std::thread::sleep(delay);
        }
        self.notices.lock().unwrap().push(Notice::Error(error.clone()));
    }

    fn on_event(&self, event: &EventRecord) {
        self.notices.lock().unwrap().push(Notice::Event(event.clone()));
    }
}

/// Let spawned tasks run without advancing past any real delay.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
