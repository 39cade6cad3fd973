//! CLI error types with miette diagnostics.
//!
//! Maps `ChannelError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pushline_config::ConfigError;
use pushline_core::ChannelError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Gave up on the push channel after {attempts} reconnection attempts")]
    #[diagnostic(
        code(pushline::gave_up),
        help(
            "Check that the server is running and reachable.\n\
             Try: pushline listen <identity> -vv"
        )
    )]
    GaveUp { attempts: u32 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No bearer token configured for profile '{profile}'")]
    #[diagnostic(
        code(pushline::no_credentials),
        help(
            "Set token or token_env in the profile,\n\
             or pass --token / set PUSHLINE_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pushline::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pushline::profile_not_found),
        help("Add a [profiles.{name}] table, or pass --server.")
    )]
    ProfileNotFound { name: String },

    #[error("No server configured")]
    #[diagnostic(
        code(pushline::no_config),
        help(
            "Pass --server, or create a profile in:\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{0}")]
    #[diagnostic(code(pushline::config))]
    Config(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode event: {0}")]
    #[diagnostic(code(pushline::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::GaveUp { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound { name },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            other => CliError::Config(other.to_string()),
        }
    }
}

impl From<ChannelError> for CliError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::MissingCredential => CliError::NoCredentials {
                profile: "current".into(),
            },
            ChannelError::MaxAttemptsExceeded { attempts } => CliError::GaveUp { attempts },
            ChannelError::Config { message } => CliError::Validation {
                field: "channel".into(),
                reason: message,
            },
            other => CliError::Config(other.to_string()),
        }
    }
}
