//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Password, Select};

use greetsync_config::store_password;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::output::Renderer;

use super::util::prompt_err;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            Renderer::new(global).one(
                &cfg,
                |c, _| format!("{c:#?}"),
                |c| c.default_profile.clone().unwrap_or_default(),
            );
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("greetsync configuration wizard");
    eprintln!("  Config path: {}\n", config_path.display());

    let mut cfg = config::load_config_or_default();

    // 1. Profile name
    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(config::active_profile_name(global, &cfg))
        .interact_text()
        .map_err(prompt_err)?;

    // 2. API URL
    let api_url: String = Input::new()
        .with_prompt("API URL")
        .default("http://localhost:8000".into())
        .validate_with(|input: &String| -> Result<(), String> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("invalid URL: {e}"))
        })
        .interact_text()
        .map_err(prompt_err)?;

    // 3. Username
    let username: String = Input::new()
        .with_prompt("Username (blank to ask at login)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    // 4. Token storage
    let store_choices = &["System keyring (recommended)", "File in the data directory"];
    let token_store = match Select::new()
        .with_prompt("Where to keep session tokens?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?
    {
        0 => "keyring",
        _ => "file",
    };

    // 5. Optional saved password
    if !username.is_empty()
        && Confirm::new()
            .with_prompt("Store the password in the system keyring?")
            .default(false)
            .interact()
            .map_err(prompt_err)?
    {
        let password = Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(prompt_err)?;
        store_password(&profile_name, &password)?;
        eprintln!("  Password stored in system keyring");
    }

    let profile = Profile {
        api_url,
        username: (!username.is_empty()).then_some(username),
        token_store: Some(token_store.into()),
        ..Profile::default()
    };
    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    config::save_config(&cfg)?;

    eprintln!("\nConfiguration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Next: greetsync login --profile {profile_name}");
    Ok(())
}
