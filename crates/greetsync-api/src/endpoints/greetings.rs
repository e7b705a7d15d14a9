// Greeting endpoints
//
// List/detail reads carry the push-hub `Link` header; writes return the
// stored greeting so the caller can reconcile its local copy.

use tracing::debug;

use crate::endpoints::{Discovered, item_path};
use crate::error::Error;
use crate::gateway::{Gateway, RequestDescriptor};
use crate::models::{
    AdminGreetingRequest, Greeting, GreetingListResponse, GreetingPayload, GreetingResponse,
};

impl Gateway {
    /// Most recent greetings.
    ///
    /// `GET /greetings?limit={limit}&offset={offset}`
    pub async fn list_greetings(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Discovered<Vec<Greeting>>, Error> {
        debug!(limit, offset, "listing greetings");
        let req = RequestDescriptor::get("/greetings")
            .query("limit", limit)
            .query("offset", offset);
        let resp = self.send(&req).await?;
        let body: GreetingListResponse = resp.json()?;
        Ok(Discovered {
            data: body.greetings,
            hub_url: resp.hub_url(),
        })
    }

    /// `GET /greeting/{id}`
    pub async fn get_greeting(&self, id: &str) -> Result<Discovered<Greeting>, Error> {
        debug!(id, "fetching greeting");
        let resp = self.get(&item_path("/greeting", id)?).await?;
        let body: GreetingResponse = resp.json()?;
        Ok(Discovered {
            data: body.greeting,
            hub_url: resp.hub_url(),
        })
    }

    /// `POST /greetings` with `{"text": ..., "variant": ...}`
    pub async fn create_greeting(&self, payload: &GreetingPayload) -> Result<Greeting, Error> {
        debug!("creating greeting");
        let resp = self.post("/greetings", payload).await?;
        Ok(resp.json::<GreetingResponse>()?.greeting)
    }

    /// `PATCH /greeting/{id}`
    pub async fn update_greeting(
        &self,
        id: &str,
        payload: &GreetingPayload,
    ) -> Result<Greeting, Error> {
        debug!(id, "updating greeting");
        let resp = self.patch(&item_path("/greeting", id)?, payload).await?;
        Ok(resp.json::<GreetingResponse>()?.greeting)
    }

    /// `DELETE /greeting/{id}`
    pub async fn delete_greeting(&self, id: &str) -> Result<(), Error> {
        debug!(id, "deleting greeting");
        self.delete(&item_path("/greeting", id)?).await?;
        Ok(())
    }

    /// Broadcast an administrative greeting. The response shape is not
    /// fixed, so the raw JSON is returned.
    ///
    /// `POST /admin-greeting` with `{"greeting": ...}`
    pub async fn send_admin_greeting(&self, greeting: &str) -> Result<serde_json::Value, Error> {
        debug!("sending admin greeting");
        let resp = self
            .post("/admin-greeting", &AdminGreetingRequest { greeting })
            .await?;
        if resp.text().trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        resp.json()
    }
}
