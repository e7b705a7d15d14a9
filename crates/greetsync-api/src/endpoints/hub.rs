// Push-hub and channel authorization endpoints

use secrecy::SecretString;
use tracing::debug;

use crate::HUB_AUTH_PATH;
use crate::error::Error;
use crate::gateway::Gateway;
use crate::models::{ChannelAuthorization, HubTokenResponse};

impl Gateway {
    /// Subscriber token for the push hub.
    ///
    /// `GET /mercure-auth`
    pub async fn hub_token(&self) -> Result<SecretString, Error> {
        debug!("requesting hub subscriber token");
        let resp = self.get(HUB_AUTH_PATH).await?;
        let body: HubTokenResponse = resp.json()?;
        Ok(SecretString::from(body.token))
    }

    /// Authorize a third-party realtime channel.
    ///
    /// `POST /pusher-auth` with a form-encoded `socket_id=..&channel_name=..`
    /// body, answered by `{"auth": "..."}`.
    pub async fn authorize_channel(
        &self,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<ChannelAuthorization, Error> {
        debug!(socket_id, channel_name, "authorizing channel");
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("socket_id", socket_id)
            .append_pair("channel_name", channel_name)
            .finish();

        let resp = self
            .post_raw("/pusher-auth", &form)
            .await
            .map_err(|e| Error::ChannelAuthorization(e.to_string()))?;
        resp.json::<ChannelAuthorization>()
            .map_err(|e| Error::ChannelAuthorization(e.to_string()))
    }
}
