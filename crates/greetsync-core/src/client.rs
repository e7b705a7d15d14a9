// ── Greeting client facade ──
//
// Wires the gateway, greeting store, current user and event hub into one
// explicitly constructed handle. Nothing here is global: tests and the
// CLI each build their own instance.

use std::sync::Arc;

use greetsync_api::models::{ChannelAuthorization, PasswordChange, ProfileUpdate};
use greetsync_api::{
    ActivityTracker, Gateway, Session, TokenStorage, ValidationRegistry,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::dispatch::{Topics, apply_list_event, apply_record_event};
use crate::error::CoreError;
use crate::hub::{EventHub, HandlerId, HubConnector, SseConnector};
use crate::model::{Greeting, GreetingDraft, GreetingId, User};
use crate::store::GreetingStore;
use crate::stream::StoreStream;
use crate::user::CurrentUser;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ClientInner>`.
#[derive(Clone)]
pub struct GreetingClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    gateway: Gateway,
    store: Arc<GreetingStore>,
    user: Arc<CurrentUser>,
    hub: EventHub,
    topics: Topics,
}

impl GreetingClient {
    /// Build a client over `storage` using the SSE hub connector.
    ///
    /// Does not touch the network.
    pub fn new(
        config: ClientConfig,
        storage: impl TokenStorage + 'static,
    ) -> Result<Self, CoreError> {
        let transport = config.transport();
        let session = Arc::new(Session::new(storage));
        let activity =
            ActivityTracker::new(config.busy_watchdog, config.quiet_endpoints.clone());
        let gateway = Gateway::with_client(
            transport.build_client()?,
            config.api_url.clone(),
            session,
            activity,
            ValidationRegistry::new(),
        );
        let connector = SseConnector::new(
            transport.build_stream_client()?,
            config.reconnect.clone(),
        );
        Ok(Self::with_parts(config, gateway, Arc::new(connector)))
    }

    /// Build a client around a pre-built gateway and hub connector.
    pub fn with_parts(
        config: ClientConfig,
        gateway: Gateway,
        connector: Arc<dyn HubConnector>,
    ) -> Self {
        let store = Arc::new(GreetingStore::new(config.store_capacity()));
        let user = Arc::new(CurrentUser::new(Arc::clone(gateway.session())));
        let hub = EventHub::new(gateway.clone(), connector);
        let topics = Topics::new(config.topic_base());

        Self {
            inner: Arc::new(ClientInner {
                config,
                gateway,
                store,
                user,
                hub,
                topics,
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    pub fn session(&self) -> &Arc<Session> {
        self.inner.gateway.session()
    }

    pub fn activity(&self) -> &ActivityTracker {
        self.inner.gateway.activity()
    }

    pub fn validation(&self) -> &ValidationRegistry {
        self.inner.gateway.validation()
    }

    pub fn store(&self) -> &Arc<GreetingStore> {
        &self.inner.store
    }

    pub fn hub(&self) -> &EventHub {
        &self.inner.hub
    }

    pub fn topics(&self) -> &Topics {
        &self.inner.topics
    }

    /// Subscribe to greeting store changes.
    pub fn greetings(&self) -> StoreStream {
        self.inner.store.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    pub fn current_user(&self) -> Option<Arc<User>> {
        self.inner.user.get()
    }

    // ── Account ──────────────────────────────────────────────────────

    pub async fn login(&self, username: &str, password: &str) -> Result<(), CoreError> {
        self.inner.gateway.login(username, password).await?;
        Ok(())
    }

    /// Fetch the signed-in user and make it the current user.
    pub async fn load_profile(&self) -> Result<Arc<User>, CoreError> {
        let user = User::from(self.inner.gateway.load_profile().await?);
        Ok(self.set_user(user))
    }

    /// Tear down the session locally, telling the backend when possible.
    ///
    /// Never fails: the local state is cleared even if the call does.
    pub async fn logout(&self) {
        if let Err(e) = self.inner.gateway.logout().await {
            warn!(error = %e, "server-side logout failed, cleared locally");
        }
        self.inner.user.clear();
        self.inner.hub.reset();
        self.inner.store.clear();
    }

    /// Revoke every device session of this account.
    pub async fn sign_out(&self) -> Result<Arc<User>, CoreError> {
        let user = User::from(self.inner.gateway.sign_out().await?);
        Ok(self.set_user(user))
    }

    pub async fn logout_device(&self, token_id: &str) -> Result<Arc<User>, CoreError> {
        let user = User::from(self.inner.gateway.logout_device(token_id).await?);
        Ok(self.set_user(user))
    }

    pub async fn update_profile(&self, profile: &ProfileUpdate) -> Result<Arc<User>, CoreError> {
        let user = User::from(self.inner.gateway.update_profile(profile).await?);
        Ok(self.set_user(user))
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), CoreError> {
        self.inner.gateway.change_password(change).await?;
        Ok(())
    }

    fn set_user(&self, user: User) -> Arc<User> {
        debug!(id = %user.id, "current user updated");
        self.inner.user.set(user)
    }

    // ── Greetings ────────────────────────────────────────────────────

    /// Fetch a page of greetings and make it the cached list.
    ///
    /// Also authorizes the push hub advertised by the response and starts
    /// following the list topic. Neither step can fail the load.
    pub async fn load_greetings(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Arc<Greeting>>, CoreError> {
        let page = self.inner.gateway.list_greetings(limit, offset).await?;
        self.discover(page.hub_url.as_ref()).await;
        self.follow_list();

        self.inner
            .store
            .replace_all(page.data.into_iter().map(Greeting::from));
        Ok(self.inner.store.sorted_view())
    }

    /// Fetch one greeting, refreshing the cached copy if present.
    pub async fn load_greeting(&self, id: &GreetingId) -> Result<Greeting, CoreError> {
        let found = self
            .inner
            .gateway
            .get_greeting(id.as_str())
            .await
            .map_err(|e| not_found_as(e, id))?;
        self.discover(found.hub_url.as_ref()).await;

        let greeting = Greeting::from(found.data);
        self.inner.store.replace(greeting.clone());
        Ok(greeting)
    }

    pub async fn create_greeting(&self, draft: &GreetingDraft) -> Result<Greeting, CoreError> {
        let created = self
            .inner
            .gateway
            .create_greeting(&draft.into())
            .await?;
        let greeting = Greeting::from(created);
        info!(id = %greeting.id, "greeting created");
        self.inner.store.insert(greeting.clone());
        Ok(greeting)
    }

    pub async fn update_greeting(&self, draft: &GreetingDraft) -> Result<Greeting, CoreError> {
        if !draft.id.is_valid() {
            return Err(CoreError::InvalidGreeting {
                message: "cannot update a greeting without an id".into(),
            });
        }
        let updated = self
            .inner
            .gateway
            .update_greeting(draft.id.as_str(), &draft.into())
            .await
            .map_err(|e| not_found_as(e, &draft.id))?;
        let greeting = Greeting::from(updated);
        self.inner.store.replace(greeting.clone());
        Ok(greeting)
    }

    pub async fn delete_greeting(&self, id: &GreetingId) -> Result<(), CoreError> {
        self.inner
            .gateway
            .delete_greeting(id.as_str())
            .await
            .map_err(|e| not_found_as(e, id))?;
        self.inner.store.remove(id);
        info!(%id, "greeting deleted");
        Ok(())
    }

    /// Accept a staged remote update as an edit draft.
    pub fn consume_pending_update(&self, id: &GreetingId) -> Result<GreetingDraft, CoreError> {
        self.inner.store.consume_pending_update(id)
    }

    pub async fn send_admin_greeting(&self, text: &str) -> Result<serde_json::Value, CoreError> {
        Ok(self.inner.gateway.send_admin_greeting(text).await?)
    }

    pub async fn authorize_channel(
        &self,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<ChannelAuthorization, CoreError> {
        Ok(self
            .inner
            .gateway
            .authorize_channel(socket_id, channel_name)
            .await?)
    }

    // ── Real-time ────────────────────────────────────────────────────

    async fn discover(&self, hub_url: Option<&Url>) {
        match hub_url {
            Some(url) => {
                self.inner.hub.discover(url).await;
            }
            None => debug!("response advertised no push hub"),
        }
    }

    /// Subscribe the list topic once per hub session.
    fn follow_list(&self) {
        if !self.inner.hub.is_ready() {
            return;
        }
        if self.inner.hub.has_subscription(&self.inner.topics.list()) {
            return;
        }
        if let Err(e) = self.add_subscription(None) {
            warn!(error = %e, "could not follow greeting list");
        }
    }

    /// Route push events for the list (`None`) or one greeting into the store.
    ///
    /// List events mutate the cached list; single-greeting events are staged
    /// as pending updates. `Ok(None)` means the stream could not be opened;
    /// the reason has been logged.
    pub fn add_subscription(
        &self,
        id: Option<&GreetingId>,
    ) -> Result<Option<HandlerId>, CoreError> {
        if !self.inner.hub.is_ready() {
            return Err(CoreError::HubNotReady);
        }
        let topic = self.inner.topics.for_target(id);
        let store = Arc::clone(&self.inner.store);

        let handler_id = if id.is_some() {
            self.inner.hub.subscribe(&topic, move |event| {
                apply_record_event(&store, event);
            })
        } else {
            let user = Arc::clone(&self.inner.user);
            self.inner.hub.subscribe(&topic, move |event| {
                apply_list_event(&store, &user, event);
            })
        };
        Ok(handler_id)
    }

    /// Close the list (`None`) or per-greeting subscription.
    pub fn remove_subscription(&self, id: Option<&GreetingId>) -> bool {
        self.inner
            .hub
            .unsubscribe(&self.inner.topics.for_target(id))
    }

    /// Close every push stream. Cached data stays available.
    pub fn shutdown(&self) {
        self.inner.hub.reset();
    }
}

impl std::fmt::Debug for GreetingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreetingClient")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("store", &self.inner.store)
            .field("hub", &self.inner.hub)
            .finish_non_exhaustive()
    }
}

fn not_found_as(err: greetsync_api::Error, id: &GreetingId) -> CoreError {
    match err {
        greetsync_api::Error::Request(e) if e.is_not_found() => CoreError::GreetingNotFound {
            id: id.to_string(),
        },
        other => other.into(),
    }
}
