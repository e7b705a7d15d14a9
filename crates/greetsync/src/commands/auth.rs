//! Session command handlers: login, logout, whoami.

use secrecy::ExposeSecret;
use tabled::Tabled;

use greetsync_config::resolve_password;
use greetsync_core::{DeviceSession, GreetingClient, User};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::ActiveProfile;
use crate::error::CliError;
use crate::output::{self, Renderer};

use super::util;

// ── Table row ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Token ID")]
    id: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Since")]
    created_at: String,
}

impl From<&DeviceSession> for DeviceRow {
    fn from(d: &DeviceSession) -> Self {
        Self {
            id: d.id.clone(),
            device: d.device.clone().unwrap_or_else(|| "-".into()),
            created_at: d.created_at.clone().unwrap_or_default(),
        }
    }
}

fn user_detail(user: &User, color: bool) -> String {
    let mut lines = vec![
        format!("Name:    {}", user.display_name),
        format!("Email:   {}", user.email),
        format!("ID:      {}", output::dim(&user.id, color)),
    ];
    if user.is_admin() {
        lines.push("Role:    admin".into());
    }
    if !user.devices.is_empty() {
        let rows: Vec<DeviceRow> = user.devices.iter().map(DeviceRow::from).collect();
        lines.push(String::new());
        lines.push(
            tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string(),
        );
    }
    lines.join("\n")
}

pub fn print_user(user: &User, out: &Renderer) {
    out.one(user, user_detail, |u| u.email.clone());
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn login(
    client: &GreetingClient,
    profile: &ActiveProfile,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let username = match args.username.or_else(|| profile.username.clone()) {
        Some(name) => name,
        None => dialoguer::Input::<String>::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(util::prompt_err)?,
    };

    let password = match resolve_password(&profile.name) {
        Some(secret) => secret,
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(util::prompt_err)?
            .into(),
    };

    client.login(&username, password.expose_secret()).await?;
    let user = client.load_profile().await?;

    let out = Renderer::new(global);
    out.note(&format!("Logged in as {}", user.display_name));
    if out.is_structured() {
        print_user(&user, &out);
    }
    Ok(())
}

pub async fn logout(client: &GreetingClient, global: &GlobalOpts) -> Result<(), CliError> {
    client.logout().await;
    Renderer::new(global).note("Logged out");
    Ok(())
}

pub async fn whoami(
    client: &GreetingClient,
    profile: &ActiveProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let user = util::hydrate_user(client, profile).await?;
    print_user(&user, &Renderer::new(global));
    Ok(())
}
