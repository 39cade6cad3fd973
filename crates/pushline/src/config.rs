//! CLI flag overrides on top of `pushline-config` profiles.

use secrecy::SecretString;

use pushline_config::{self as config, Profile};
use pushline_core::{ChannelConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything `listen` needs, resolved from file, env, and flags.
pub struct Resolved {
    pub profile_name: String,
    pub channel: ChannelConfig,
    pub token: Option<SecretString>,
}

/// Resolve the active profile and apply `--server`, `--token`, and
/// `--insecure`. A missing profile is fine as long as `--server` is given.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = config::load_config()?;

    let named = global.profile.is_some();
    let (profile_name, profile) = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name, profile.clone()),
        Err(e) if named => return Err(e.into()),
        Err(_) => {
            let server = global.server.clone().ok_or_else(|| CliError::NoConfig {
                path: config::config_path().display().to_string(),
            })?;
            let profile = Profile {
                server,
                ..Profile::default()
            };
            ("default".to_owned(), profile)
        }
    };

    let mut profile = profile;
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }

    let mut channel = config::profile_to_channel_config(&profile, &cfg.defaults)?;
    if global.insecure {
        channel.tls = TlsVerification::DangerAcceptInvalid;
    }

    let token = match global.token {
        Some(ref token) => Some(SecretString::from(token.clone())),
        None => config::resolve_token(&profile, &profile_name).ok(),
    };

    tracing::debug!(profile = %profile_name, server = %channel.base_url, "resolved channel config");

    Ok(Resolved {
        profile_name,
        channel,
        token,
    })
}
