// ── Runtime channel configuration ──
//
// These types describe *where* the push channel lives and how the client
// behaves around it. They never touch disk: pushline-config (or any other
// composition root) builds a `ChannelConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use pushline_api::transport::{TlsMode, TransportConfig};
use pushline_api::{Endpoints, PushClient};

use crate::error::ChannelError;
use crate::reconnect::ReconnectPolicy;

/// Name of the reserved liveness-probe event.
pub const DEFAULT_PROBE_EVENT: &str = "ping";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (development servers).
    DangerAcceptInvalid,
}

/// Configuration for a single push channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Server base URL (e.g., `https://push.example.com`).
    pub base_url: Url,
    /// Channel, heartbeat and identity parameter names.
    pub endpoints: Endpoints,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Bound on establishing the connection.
    pub connect_timeout: Duration,
    /// Bound on heartbeat acknowledgements.
    pub request_timeout: Duration,
    /// Event type answered by the heartbeat responder.
    pub probe_event: String,
    /// Backoff and retry ceiling.
    pub reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            endpoints: Endpoints::default(),
            tls: TlsVerification::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            probe_event: DEFAULT_PROBE_EVENT.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Translate into the transport-level config, with a cookie jar so
    /// server-set cookies ride along on every request.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            cookie_jar: None,
        }
        .with_cookie_jar()
    }

    /// Build the HTTP client for this channel.
    pub fn build_client(&self) -> Result<PushClient, ChannelError> {
        self.reconnect
            .validate()
            .map_err(|message| ChannelError::Config { message })?;

        if self.probe_event.trim().is_empty() {
            return Err(ChannelError::Config {
                message: "probe event name must not be empty".into(),
            });
        }

        let client = PushClient::new(
            self.base_url.clone(),
            self.endpoints.clone(),
            &self.transport(),
        )?;
        Ok(client)
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
