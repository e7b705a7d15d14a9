//! Command dispatch: bridges CLI args -> client operations -> output formatting.

pub mod account;
pub mod auth;
pub mod config_cmd;
pub mod greetings;
pub mod util;
pub mod watch;

use greetsync_core::GreetingClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::ActiveProfile;
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &GreetingClient,
    profile: &ActiveProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => auth::login(client, profile, args, global).await,
        Command::Logout => auth::logout(client, global).await,
        Command::Whoami => auth::whoami(client, profile, global).await,
        Command::List(args) => greetings::list(client, args, global).await,
        Command::Show { id } => greetings::show(client, &id, global).await,
        Command::Create { text, variant } => greetings::create(client, text, variant, global).await,
        Command::Update { id, text, variant } => {
            greetings::update(client, &id, text, variant, global).await
        }
        Command::Delete { id } => greetings::delete(client, &id, global).await,
        Command::AdminGreet { text } => greetings::admin_greet(client, &text, global).await,
        Command::Watch(args) => watch::handle(client, profile, args, global).await,
        Command::Account(args) => account::handle(client, profile, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
