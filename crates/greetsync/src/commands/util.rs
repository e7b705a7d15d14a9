//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;

use greetsync_core::{GreetingClient, User};

use crate::config::ActiveProfile;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.trim_end_matches('?').to_owned(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    Ok(confirmed)
}

/// Map a dialoguer failure (no TTY, interrupted) to an IO error.
pub fn prompt_err(err: dialoguer::Error) -> CliError {
    CliError::Io(std::io::Error::other(err))
}

/// Fail early when the stored session has no tokens.
pub fn require_session(client: &GreetingClient, profile: &ActiveProfile) -> Result<(), CliError> {
    if client.is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn {
            profile: profile.name.clone(),
        })
    }
}

/// Load the signed-in user, required before list events are applied.
pub async fn hydrate_user(
    client: &GreetingClient,
    profile: &ActiveProfile,
) -> Result<Arc<User>, CliError> {
    require_session(client, profile)?;
    Ok(client.load_profile().await?)
}
