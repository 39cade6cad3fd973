//! HTTP client for the push channel and its heartbeat endpoint.
//!
//! [`PushClient`] issues the two requests the channel needs:
//!
//! - `GET <base>/<channel_path>?<identity_param>=<identity>` with
//!   `Accept: text/event-stream`, returning the response body as a
//!   [`ByteStream`] that stays open for the lifetime of the connection.
//! - `POST <base>/<heartbeat_path>`, acknowledging a liveness probe.
//!
//! Both carry `Authorization: Bearer <token>`. Cookies travel through the
//! client's cookie jar when the transport was configured with one.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{self, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// The response body of an open channel, read chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

const EVENT_STREAM: &str = "text/event-stream";

// ── Endpoints ────────────────────────────────────────────────────────

/// Paths of the push channel endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Long-lived event stream.
    pub channel_path: String,
    /// Liveness acknowledgement.
    pub heartbeat_path: String,
    /// Query parameter carrying the subscriber identity.
    pub identity_param: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            channel_path: "/api/notifications/stream".into(),
            heartbeat_path: "/api/notifications/heartbeat".into(),
            identity_param: "identity".into(),
        }
    }
}

// ── PushClient ───────────────────────────────────────────────────────

/// Raw HTTP client for one push-channel server.
#[derive(Debug, Clone)]
pub struct PushClient {
    http: reqwest::Client,
    base_url: Url,
    endpoints: Endpoints,
    request_timeout: Duration,
}

impl PushClient {
    /// Build a client with its own `reqwest::Client` from the transport config.
    pub fn new(
        base_url: Url,
        endpoints: Endpoints,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            endpoints,
            request_timeout: transport.request_timeout,
        })
    }

    /// Wrap an existing `reqwest::Client` using default endpoints.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            endpoints: Endpoints::default(),
            request_timeout: TransportConfig::default().request_timeout,
        })
    }

    /// Replace the endpoint paths.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ── URL construction ─────────────────────────────────────────────

    /// Full URL of the channel for `identity`.
    pub fn channel_url(&self, identity: &str) -> Url {
        let mut url = self.endpoint_url(&self.endpoints.channel_path);
        url.query_pairs_mut()
            .append_pair(&self.endpoints.identity_param, identity);
        url
    }

    /// Full URL of the heartbeat endpoint.
    pub fn heartbeat_url(&self) -> Url {
        self.endpoint_url(&self.endpoints.heartbeat_path)
    }

    /// Append `path` to the base URL, keeping any path prefix the base has.
    fn endpoint_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Open the push channel for `identity`.
    ///
    /// Resolves once response headers arrive. The returned stream yields
    /// body chunks until the server closes the connection or a read fails.
    /// Dropping the stream aborts the underlying request.
    pub async fn open_channel(
        &self,
        identity: &str,
        token: &SecretString,
    ) -> Result<ByteStream, Error> {
        let url = self.channel_url(identity);
        tracing::debug!(url = %url, "Opening push channel");

        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, EVENT_STREAM)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::AUTHORIZATION, bearer(token)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                endpoint: url.path().to_owned(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response.headers().get(header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.starts_with(EVENT_STREAM) {
                return Err(Error::UnexpectedContentType {
                    content_type: content_type.to_owned(),
                });
            }
        }

        Ok(response.bytes_stream().map(|chunk| chunk.map_err(Error::from)).boxed())
    }

    /// Acknowledge a liveness probe.
    pub async fn acknowledge(&self, token: &SecretString) -> Result<(), Error> {
        let url = self.heartbeat_url();

        let response = self
            .http
            .post(url.clone())
            .header(header::AUTHORIZATION, bearer(token)?)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                endpoint: url.path().to_owned(),
                status: status.as_u16(),
            });
        }

        tracing::trace!("Heartbeat acknowledged");
        Ok(())
    }
}

fn bearer(token: &SecretString) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|_| Error::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}
