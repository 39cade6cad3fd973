// pushline-core: Push channel lifecycle between pushline-api and consumers.

pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod heartbeat;
pub mod link;
pub mod reconnect;
pub mod sink;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ChannelConfig, TlsVerification, DEFAULT_PROBE_EVENT};
pub use controller::{ChannelController, ConnectionHandle, Phase};
pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::{ChannelError, ErrorKind};
pub use heartbeat::HeartbeatResponder;
pub use link::ChannelLink;
pub use reconnect::{Decision, ReconnectPolicy, ReconnectScheduler};
pub use sink::{BroadcastSink, ConnectionState, StateSink};

pub use pushline_api::{Endpoints, EventRecord};
