// Account endpoints
//
// Login and logout also settle the session store; every other call only
// returns the refreshed user the backend sends back.

use tracing::{debug, info, warn};

use crate::LOGIN_PATH;
use crate::endpoints::item_path;
use crate::error::Error;
use crate::gateway::Gateway;
use crate::models::{LoginRequest, PasswordChange, ProfileUpdate, User, UserResponse};
use crate::refresh::TokenResponse;

impl Gateway {
    /// Exchange credentials for a token pair and store it.
    ///
    /// `POST /login_check` with `{"username": ..., "password": ...}`.
    /// A 401 here is reported as [`Error::Authentication`], never refreshed.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        debug!(username, "logging in");
        let resp = self
            .post(LOGIN_PATH, &LoginRequest { username, password })
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    Error::Authentication { message: e.message }
                } else {
                    Error::Request(e)
                }
            })?;

        let tokens: TokenResponse = resp.json()?;
        if tokens.token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(Error::Authentication {
                message: "login response did not include a token pair".into(),
            });
        }
        self.session()
            .set_credentials(&tokens.token, &tokens.refresh_token);
        info!("logged in");
        Ok(())
    }

    /// `GET /dashboard`
    pub async fn load_profile(&self) -> Result<User, Error> {
        debug!("loading profile");
        let resp = self.get("/dashboard").await?;
        Ok(resp.json::<UserResponse>()?.user)
    }

    /// Invalidate the current refresh token server-side.
    ///
    /// `POST /account/me/logout`. The local session is cleared whatever the
    /// outcome; the server error, if any, is still returned.
    pub async fn logout(&self) -> Result<(), Error> {
        debug!("logging out");
        let result = self.post("/account/me/logout", &serde_json::json!({})).await;
        self.session().clear_credentials();
        match result {
            Ok(_) => {
                info!("logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "logout request failed, session cleared locally");
                Err(e.into())
            }
        }
    }

    /// Sign out every other device.
    ///
    /// `POST /account/me/sign-out`
    pub async fn sign_out(&self) -> Result<User, Error> {
        debug!("signing out other devices");
        let resp = self
            .post("/account/me/sign-out", &serde_json::json!({}))
            .await?;
        Ok(resp.json::<UserResponse>()?.user)
    }

    /// Revoke one device's refresh token.
    ///
    /// `DELETE /account/logout/{token_id}`
    pub async fn logout_device(&self, token_id: &str) -> Result<User, Error> {
        debug!(token_id, "logging out device");
        let resp = self.delete(&item_path("/account/logout", token_id)?).await?;
        Ok(resp.json::<UserResponse>()?.user)
    }

    /// `PATCH /account/me/update`
    pub async fn update_profile(&self, profile: &ProfileUpdate) -> Result<User, Error> {
        debug!("updating profile");
        let resp = self.patch("/account/me/update", profile).await?;
        Ok(resp.json::<UserResponse>()?.user)
    }

    /// `PATCH /account/me/change-password`
    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), Error> {
        debug!("changing password");
        self.patch("/account/me/change-password", change).await?;
        Ok(())
    }
}
