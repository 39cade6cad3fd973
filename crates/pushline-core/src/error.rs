// ── Core error types ──
//
// Channel-level errors reported to the state sink. Consumers never see raw
// transport errors: the `From<pushline_api::Error>` impl folds them into
// the transient variants. There is no cancellation variant: an explicit
// disconnect only changes state.

use thiserror::Error;

/// Broad category of a [`ChannelError`], deciding what happens next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A precondition is missing; nothing was sent, no retry follows.
    Precondition,
    /// The network failed; a retry is scheduled unless the budget is spent.
    Transient,
    /// The retry budget is spent; a fresh `connect` is required.
    Terminal,
    /// The channel could not be configured.
    Configuration,
}

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    // ── Precondition ─────────────────────────────────────────────────
    #[error("No bearer token available -- cannot open push channel")]
    MissingCredential,

    // ── Transient ────────────────────────────────────────────────────
    #[error("Push channel rejected by server (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Push channel network failure: {message}")]
    Network { message: String },

    // ── Terminal ─────────────────────────────────────────────────────
    #[error("Push channel gave up after {attempts} reconnection attempts")]
    MaxAttemptsExceeded { attempts: u32 },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::Precondition,
            Self::Rejected { .. } | Self::Network { .. } => ErrorKind::Transient,
            Self::MaxAttemptsExceeded { .. } => ErrorKind::Terminal,
            Self::Config { .. } => ErrorKind::Configuration,
        }
    }

    /// `true` when a fresh external `connect` is the only way forward.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self.kind(), ErrorKind::Precondition | ErrorKind::Terminal)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pushline_api::Error> for ChannelError {
    fn from(err: pushline_api::Error) -> Self {
        match err {
            pushline_api::Error::Status { endpoint, status } => ChannelError::Rejected {
                status,
                message: format!("{endpoint} answered HTTP {status}"),
            },
            pushline_api::Error::UnexpectedContentType { content_type } => {
                ChannelError::Rejected {
                    status: 200,
                    message: format!("expected text/event-stream, got '{content_type}'"),
                }
            }
            pushline_api::Error::InvalidUrl(e) => ChannelError::Config {
                message: format!("Invalid URL: {e}"),
            },
            pushline_api::Error::Tls(msg) => ChannelError::Config {
                message: format!("TLS error: {msg}"),
            },
            pushline_api::Error::InvalidToken => ChannelError::Network {
                message: "bearer token is not a valid header value".into(),
            },
            pushline_api::Error::Transport(e) => ChannelError::Network {
                message: e.to_string(),
            },
        }
    }
}
