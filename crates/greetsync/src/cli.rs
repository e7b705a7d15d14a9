//! Clap derive structures for the `greetsync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// greetsync -- greetings from the command line, kept live by the push hub
#[derive(Debug, Parser)]
#[command(
    name = "greetsync",
    version,
    about = "Read, write and watch greetings from the command line",
    long_about = "A CLI for the greetings backend.\n\n\
        Keeps the session's token pair fresh, caches the most recent greetings\n\
        and follows server-pushed changes through the Mercure hub.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "GREETSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, short = 'u', env = "GREETSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GREETSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "GREETSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "GREETSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session tokens
    Login(LoginArgs),

    /// End the session on this device
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List the most recent greetings
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one greeting
    Show {
        /// Greeting ID
        id: String,
    },

    /// Create a greeting
    Create {
        /// Greeting text
        text: String,

        /// Presentation variant (e.g. info, warning)
        #[arg(long)]
        variant: Option<String>,
    },

    /// Edit a greeting
    Update {
        /// Greeting ID
        id: String,

        /// New text
        #[arg(long)]
        text: Option<String>,

        /// New variant
        #[arg(long)]
        variant: Option<String>,
    },

    /// Delete a greeting
    #[command(alias = "rm")]
    Delete {
        /// Greeting ID
        id: String,
    },

    /// Follow live changes to the list or one greeting
    Watch(WatchArgs),

    /// Broadcast an administrative greeting
    AdminGreet {
        /// Greeting text
        text: String,
    },

    /// Manage the account and its device sessions
    Account(AccountArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Arguments ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Login name (defaults to the profile's username)
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Max results (defaults to the profile's list_limit)
    #[arg(long, short = 'l')]
    pub limit: Option<u32>,

    /// Pagination offset
    #[arg(long, default_value = "0")]
    pub offset: u32,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Follow one greeting instead of the list; changes are staged, not applied
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct AccountArgs {
    #[command(subcommand)]
    pub command: AccountCommand,
}

#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Revoke every device session of this account
    SignOut,

    /// Revoke one device session
    LogoutDevice {
        /// Device token ID (see `greetsync whoami`)
        token_id: String,
    },

    /// Change first and last name
    UpdateProfile {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },

    /// Change the account password (prompts)
    ChangePassword,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive profile setup
    Init,

    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
