//! Account command handlers.

use dialoguer::Password;

use greetsync_core::{GreetingClient, PasswordChange, ProfileUpdate};

use crate::cli::{AccountArgs, AccountCommand, GlobalOpts};
use crate::config::ActiveProfile;
use crate::error::CliError;
use crate::output::Renderer;

use super::{auth, util};

pub async fn handle(
    client: &GreetingClient,
    profile: &ActiveProfile,
    args: AccountArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(client, profile)?;
    let out = Renderer::new(global);

    match args.command {
        AccountCommand::SignOut => {
            if !util::confirm("Revoke every device session of this account?", global.yes)? {
                return Ok(());
            }
            let user = client.sign_out().await?;
            out.note("All device sessions revoked");
            auth::print_user(&user, &out);
            Ok(())
        }

        AccountCommand::LogoutDevice { token_id } => {
            let user = client.logout_device(&token_id).await?;
            out.note("Device session revoked");
            auth::print_user(&user, &out);
            Ok(())
        }

        AccountCommand::UpdateProfile {
            first_name,
            last_name,
        } => {
            let user = client
                .update_profile(&ProfileUpdate {
                    first_name,
                    last_name,
                })
                .await?;
            out.note("Profile updated");
            auth::print_user(&user, &out);
            Ok(())
        }

        AccountCommand::ChangePassword => {
            let current_password = Password::new()
                .with_prompt("Current password")
                .interact()
                .map_err(util::prompt_err)?;
            let password = Password::new()
                .with_prompt("New password")
                .interact()
                .map_err(util::prompt_err)?;
            let password_confirmation = Password::new()
                .with_prompt("Confirm new password")
                .interact()
                .map_err(util::prompt_err)?;

            // The backend reports mismatches as field errors; send as typed.
            client
                .change_password(&PasswordChange {
                    current_password,
                    password,
                    password_confirmation,
                })
                .await?;
            out.note("Password changed");
            Ok(())
        }
    }
}
