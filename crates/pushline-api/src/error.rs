use thiserror::Error;

/// Top-level error type for the `pushline-api` crate.
///
/// Covers every failure mode of the transport layer: building the HTTP
/// client, opening the push channel, reading its body, and acknowledging
/// heartbeats. `pushline-core` maps these into channel-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, body read, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Push channel ────────────────────────────────────────────────
    /// The server answered with a non-success status.
    #[error("Server rejected request to {endpoint} (HTTP {status})")]
    Status { endpoint: String, status: u16 },

    /// The channel endpoint answered, but not with an event stream.
    #[error("Expected text/event-stream, got '{content_type}'")]
    UnexpectedContentType { content_type: String },

    /// The bearer token cannot be carried in an HTTP header.
    #[error("Bearer token contains characters not allowed in a header")]
    InvalidToken,
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
