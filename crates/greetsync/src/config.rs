//! CLI configuration -- thin wrapper around `greetsync_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --insecure, --timeout).

use std::time::Duration;

use greetsync_config::{ProfileTokenStorage, profile_to_client_config, token_store_kind};
use greetsync_core::{ClientConfig, GreetingClient, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use greetsync_config::{
    Config, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Everything a command needs to know about the active profile.
#[derive(Debug)]
pub struct ActiveProfile {
    pub name: String,
    pub username: Option<String>,
    pub client_config: ClientConfig,
    pub token_store: String,
}

impl ActiveProfile {
    /// Build a client with this profile's token storage.
    pub fn connect(&self) -> Result<GreetingClient, CliError> {
        let storage = ProfileTokenStorage::open(&self.token_store, &self.name)?;
        Ok(GreetingClient::new(self.client_config.clone(), storage)?)
    }
}

/// Translate the config file + global flags into an [`ActiveProfile`].
///
/// CLI flag overrides take priority over profile values. Without a
/// matching profile, `--api-url` alone is enough.
pub fn resolve_active(global: &GlobalOpts) -> Result<ActiveProfile, CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.api_url.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: available.join(", "),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // 1. API URL (flag > env > profile)
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }

    let mut client_config = profile_to_client_config(&profile, &cfg.defaults)?;

    // 2. TLS verification
    if global.insecure {
        client_config.tls = TlsVerification::DangerAcceptInvalid;
    }

    // 3. Timeout
    if let Some(seconds) = global.timeout {
        client_config.timeout = Duration::from_secs(seconds);
    }

    Ok(ActiveProfile {
        token_store: token_store_kind(&profile, &cfg.defaults).to_owned(),
        username: profile.username.clone(),
        name,
        client_config,
    })
}
