#![allow(clippy::unwrap_used)]
// Client facade against a wiremock backend and an in-process push hub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use greetsync_api::{
    ActivityTracker, EventStreamHandle, Gateway, MemoryTokenStorage, Session, ValidationRegistry,
};
use greetsync_core::{
    ClientConfig, CoreError, GreetingClient, GreetingDraft, GreetingId, HubAuthorization,
    HubConnector, PushEvent,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Hub connector that hands out in-process channels per topic.
#[derive(Default)]
struct LocalHub {
    topics: Mutex<HashMap<String, broadcast::Sender<Arc<PushEvent>>>>,
}

impl LocalHub {
    fn publish(&self, topic: &str, event: serde_json::Value) {
        let event: PushEvent = serde_json::from_value(event).unwrap();
        let topics = self.topics.lock().unwrap();
        topics[topic].send(Arc::new(event)).unwrap();
    }

    fn opened(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.topics.lock().unwrap().keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl HubConnector for LocalHub {
    fn open(
        &self,
        _authorization: &HubAuthorization,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<EventStreamHandle, greetsync_api::Error> {
        let (tx, rx) = broadcast::channel(16);
        self.topics.lock().unwrap().insert(topic.to_owned(), tx);
        Ok(EventStreamHandle::from_channel(topic, rx, cancel))
    }
}

async fn setup() -> (MockServer, GreetingClient, Arc<LocalHub>) {
    let server = MockServer::start().await;
    let api_url = Url::parse(&server.uri()).unwrap();
    let gateway = Gateway::with_client(
        reqwest::Client::new(),
        api_url.clone(),
        Arc::new(Session::new(MemoryTokenStorage::with_tokens("access", "refresh"))),
        ActivityTracker::default(),
        ValidationRegistry::new(),
    );
    let hub = Arc::new(LocalHub::default());
    let client = GreetingClient::with_parts(ClientConfig::new(api_url), gateway, hub.clone());
    (server, client, hub)
}

fn authorize(client: &GreetingClient, server: &MockServer) {
    let hub_url = Url::parse(&format!("{}/.well-known/mercure", server.uri())).unwrap();
    client
        .hub()
        .set_authorization(HubAuthorization::new(hub_url, "hub-token"));
}

async fn mount_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 1, "email": "ada@example.com", "first_name": "Ada" }
        })))
        .mount(server)
        .await;
}

/// Poll until `check` holds or a second passes.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_created_greeting_lands_at_the_head() {
    let (server, client, _hub) = setup().await;
    client.store().insert(greetsync_core::Greeting {
        id: "g0".into(),
        ..Default::default()
    });

    Mock::given(method("POST"))
        .and(path("/greetings"))
        .and(header("Authorization", "Bearer access"))
        .and(body_json(json!({ "text": "hi", "variant": "info" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "greeting": { "id": "g1", "text": "hi", "variant": { "name": "info" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let draft = GreetingDraft {
        text: "hi".into(),
        variant: Some("info".into()),
        ..GreetingDraft::default()
    };
    let created = client.create_greeting(&draft).await.unwrap();

    assert_eq!(created.id.as_str(), "g1");
    let list = client.store().greetings();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id.as_str(), "g1");
    assert_eq!(list[0].variant.as_deref(), Some("info"));
}

#[tokio::test]
async fn test_list_delete_event_removes_greeting_and_prunes_pending() {
    let (server, client, hub) = setup().await;
    mount_profile(&server).await;
    client.load_profile().await.unwrap();
    authorize(&client, &server);

    let g1 = GreetingId::from("g1");
    client.store().insert(greetsync_core::Greeting {
        id: g1.clone(),
        text: "hi".into(),
        ..Default::default()
    });
    client.add_subscription(None).unwrap().unwrap();
    client.add_subscription(Some(&g1)).unwrap().unwrap();

    let record_topic = client.topics().record(&g1);
    hub.publish(
        &record_topic,
        json!({ "reason": "update", "greeting": { "id": "g1", "text": "remote" } }),
    );
    assert!(eventually(|| client.store().has_update(&g1)).await);
    // Staged, not applied.
    assert_eq!(client.store().get(&g1).unwrap().text, "hi");

    hub.publish(
        &client.topics().list(),
        json!({ "reason": "delete", "greeting": { "id": "g1" } }),
    );
    assert!(eventually(|| client.store().get(&g1).is_none()).await);
    assert!(client.store().pending_updates().is_empty());
}

#[tokio::test]
async fn test_list_events_before_profile_are_dropped() {
    let (server, client, hub) = setup().await;
    authorize(&client, &server);
    client.add_subscription(None).unwrap().unwrap();

    hub.publish(
        &client.topics().list(),
        json!({ "reason": "create", "greeting": { "id": "g9" } }),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.store().is_empty());
}

#[tokio::test]
async fn test_subscription_needs_authorized_hub() {
    let (_server, client, hub) = setup().await;

    let err = client.add_subscription(None).unwrap_err();
    assert!(matches!(err, CoreError::HubNotReady));
    assert!(hub.opened().is_empty());
}

#[tokio::test]
async fn test_load_greetings_discovers_hub_and_follows_list() {
    let (server, client, hub) = setup().await;
    let hub_url = format!("{}/.well-known/mercure", server.uri());

    Mock::given(method("GET"))
        .and(path("/greetings"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!("<{hub_url}>; rel=\"mercure\"").as_str())
                .set_body_json(json!({ "greetings": [
                    { "id": "a", "text": "older", "created_at": "2024-01-01T00:00:00Z" },
                    { "id": "b", "text": "newer", "created_at": "2024-02-01T00:00:00Z" }
                ]})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mercure-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "hub-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let sorted = client.load_greetings(10, 0).await.unwrap();
    let ids: Vec<_> = sorted.iter().map(|g| g.id.to_string()).collect();
    assert_eq!(ids, ["b", "a"]);

    assert!(client.hub().is_ready());
    assert_eq!(
        client.hub().authorization().unwrap().hub_url.as_str(),
        hub_url
    );
    assert_eq!(hub.opened(), [client.topics().list()]);

    // A second load reuses the authorization and the subscription.
    client.load_greetings(10, 0).await.unwrap();
    assert_eq!(client.hub().handler_count(&client.topics().list()), 1);
}

#[tokio::test]
async fn test_load_greetings_without_hub_link_still_loads() {
    let (server, client, hub) = setup().await;

    Mock::given(method("GET"))
        .and(path("/greetings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "greetings": [{ "id": "a" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mercure-auth"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let loaded = client.load_greetings(10, 0).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(!client.hub().is_ready());
    assert!(hub.opened().is_empty());
}

#[tokio::test]
async fn test_missing_greeting_maps_to_not_found() {
    let (server, client, _hub) = setup().await;

    Mock::given(method("GET"))
        .and(path("/greeting/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.load_greeting(&"nope".into()).await.unwrap_err();
    assert!(matches!(err, CoreError::GreetingNotFound { ref id } if id == "nope"));
}

#[tokio::test]
async fn test_logout_clears_local_state_even_on_server_error() {
    let (server, client, hub) = setup().await;
    mount_profile(&server).await;
    client.load_profile().await.unwrap();
    authorize(&client, &server);
    client.add_subscription(None).unwrap();
    client.store().insert(greetsync_core::Greeting {
        id: "g1".into(),
        ..Default::default()
    });

    Mock::given(method("POST"))
        .and(path("/account/me/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    client.logout().await;

    assert!(!client.is_authenticated());
    assert!(client.current_user().is_none());
    assert!(client.store().is_empty());
    assert!(!client.hub().is_ready());
    assert!(client.hub().topics().is_empty());
    assert_eq!(hub.opened().len(), 1);
}

#[tokio::test]
async fn test_update_without_id_is_rejected_locally() {
    let (server, client, _hub) = setup().await;

    let err = client
        .update_greeting(&GreetingDraft::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidGreeting { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
