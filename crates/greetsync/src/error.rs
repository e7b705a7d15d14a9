//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use greetsync_config::ConfigError;
use greetsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the backend")]
    #[diagnostic(
        code(greetsync::connection_failed),
        help(
            "Check that the API is running and accessible.\n\
             Reason: {reason}\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(greetsync::auth_failed),
        help("Verify your username and password, then run: greetsync login")
    )]
    AuthFailed { message: String },

    #[error("Not logged in")]
    #[diagnostic(
        code(greetsync::not_logged_in),
        help("Run: greetsync login --profile {profile}")
    )]
    NotLoggedIn { profile: String },

    #[error("Session expired")]
    #[diagnostic(
        code(greetsync::session_expired),
        help("The refresh token was rejected ({message}).\nRun: greetsync login")
    )]
    SessionExpired { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(greetsync::not_found),
        help("Run: greetsync {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(greetsync::api_error))]
    ApiError { code: String, message: String },

    #[error("Push hub unavailable: {reason}")]
    #[diagnostic(
        code(greetsync::hub_unavailable),
        help("Live updates need a hub link from the API; run `greetsync list` first.")
    )]
    HubUnavailable { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(greetsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(greetsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: greetsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(greetsync::no_config),
        help(
            "Create one with: greetsync config init\n\
             Or pass --api-url. Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(greetsync::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(greetsync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(greetsync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::HubUnavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NotLoggedIn { .. } | Self::SessionExpired { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::SessionExpired { message } => CliError::SessionExpired { message },

            CoreError::GreetingNotFound { id } => CliError::NotFound {
                resource_type: "greeting".into(),
                identifier: id,
                list_command: "list".into(),
            },

            CoreError::PendingUpdateNotFound { id } => CliError::NotFound {
                list_command: format!("watch --id {id}"),
                resource_type: "pending update".into(),
                identifier: id,
            },

            CoreError::InvalidGreeting { message } => CliError::Validation {
                field: "greeting".into(),
                reason: message,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::HubNotReady => CliError::HubUnavailable {
                reason: "not authorized yet".into(),
            },

            CoreError::HubUnavailable { reason } => CliError::HubUnavailable { reason },

            CoreError::ChannelAuthorizationFailed { message } => CliError::ApiError {
                code: "channel_authorization".into(),
                message,
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}
