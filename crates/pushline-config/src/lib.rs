//! Configuration for the pushline CLI and other embedders.
//!
//! TOML profiles, bearer token resolution (env + plaintext), and
//! translation to `pushline_core::ChannelConfig`. The CLI layers its flag
//! overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pushline_core::{ChannelConfig, Endpoints, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("no bearer token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, falling back to `default_profile`, then `"default"`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");

        self.profiles
            .get(name)
            .map(|profile| (name.to_owned(), profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Render as TOML with every plaintext token replaced.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        for profile in redacted.profiles.values_mut() {
            if profile.token.is_some() {
                profile.token = Some("<redacted>".into());
            }
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Seconds allowed for establishing a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Seconds allowed for a heartbeat acknowledgement.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    30
}

/// A named push server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "https://push.example.com").
    pub server: String,

    /// Override the stream path.
    pub channel_path: Option<String>,

    /// Override the heartbeat path.
    pub heartbeat_path: Option<String>,

    /// Override the identity query parameter name.
    pub identity_param: Option<String>,

    /// Bearer token (plaintext, prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override connect timeout, in seconds.
    pub connect_timeout: Option<u64>,

    /// Override request timeout, in seconds.
    pub request_timeout: Option<u64>,

    /// Event type treated as the liveness probe.
    pub probe_event: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "pushline", "pushline").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pushline");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults;
/// `PUSHLINE_` environment variables are layered on top, with `__`
/// separating nested keys (`PUSHLINE_DEFAULTS__INSECURE=true`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PUSHLINE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the bearer token: the profile's `token_env` variable first,
/// then the plaintext `token`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Build a `ChannelConfig` from a profile, no CLI flag overrides.
pub fn profile_to_channel_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ChannelConfig, ConfigError> {
    let url: url::Url = profile
        .server
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", profile.server),
        })?;

    let mut config = ChannelConfig::new(url);

    let fallback = Endpoints::default();
    config.endpoints = Endpoints {
        channel_path: profile
            .channel_path
            .clone()
            .unwrap_or(fallback.channel_path),
        heartbeat_path: profile
            .heartbeat_path
            .clone()
            .unwrap_or(fallback.heartbeat_path),
        identity_param: profile
            .identity_param
            .clone()
            .unwrap_or(fallback.identity_param),
    };

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    config.connect_timeout =
        Duration::from_secs(profile.connect_timeout.unwrap_or(defaults.connect_timeout));
    config.request_timeout =
        Duration::from_secs(profile.request_timeout.unwrap_or(defaults.request_timeout));

    if let Some(ref probe) = profile.probe_event {
        if probe.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "probe_event".into(),
                reason: "must not be empty".into(),
            });
        }
        config.probe_event.clone_from(probe);
    }

    Ok(config)
}
