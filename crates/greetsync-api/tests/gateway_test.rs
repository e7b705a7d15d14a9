#![allow(clippy::unwrap_used)]
// Integration tests for `Gateway` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use greetsync_api::models::GreetingPayload;
use greetsync_api::{
    ActivityTracker, Error, Gateway, MemoryTokenStorage, RequestError, Session, ValidationRegistry,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(session: Session) -> (MockServer, Gateway) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let gateway = Gateway::with_client(
        reqwest::Client::new(),
        base_url,
        Arc::new(session),
        ActivityTracker::default(),
        ValidationRegistry::new(),
    );
    (server, gateway)
}

fn logged_in() -> Session {
    Session::new(MemoryTokenStorage::with_tokens("access-1", "refresh-1"))
}

fn greeting(id: &str, text: &str) -> serde_json::Value {
    json!({
        "id": id,
        "text": text,
        "variant": { "name": "info" },
        "author": { "id": 1, "first_name": "Ada", "last_name": "L", "display_name": "Ada L" },
        "created_at": "2024-03-01T10:00:00+00:00"
    })
}

// ── Credentials ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_header_attached() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "user": { "id": 7, "email": "a@b.c" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let user = gateway.load_profile().await.unwrap();
    assert_eq!(user.id, "7");
    assert_eq!(user.email, "a@b.c");
}

#[tokio::test]
async fn test_login_stores_token_pair() {
    let (server, gateway) = setup(Session::in_memory()).await;

    Mock::given(method("POST"))
        .and(path("/login_check"))
        .and(body_json(json!({ "username": "ada", "password": "secret" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "access-9", "refresh_token": "refresh-9" })),
        )
        .mount(&server)
        .await;

    gateway.login("ada", "secret").await.unwrap();

    assert!(gateway.session().is_authenticated());
    assert_eq!(gateway.session().access_token(), "access-9");
    assert_eq!(gateway.session().refresh_token(), "refresh-9");
}

#[tokio::test]
async fn test_login_failure_is_not_refreshed() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("POST"))
        .and(path("/login_check"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "code": 401, "message": "Invalid credentials." })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = gateway.login("ada", "wrong").await;

    assert!(
        matches!(&result, Err(Error::Authentication { message }) if message == "Invalid credentials."),
        "expected Authentication error, got: {result:?}"
    );
    assert_eq!(gateway.refresh_coordinator().refreshes_issued(), 0);
}

#[tokio::test]
async fn test_logout_clears_session_even_on_failure() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("POST"))
        .and(path("/account/me/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = gateway.logout().await;

    assert!(result.is_err());
    assert!(!gateway.session().is_authenticated());
    assert_eq!(gateway.session().access_token(), "");
}

// ── Error normalization ─────────────────────────────────────────────

#[tokio::test]
async fn test_server_message_preferred() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("DELETE"))
        .and(path("/greeting/g1"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "message": "Not your greeting" })),
        )
        .mount(&server)
        .await;

    let err = gateway.delete("/greeting/g1").await.unwrap_err();
    assert_eq!(err, RequestError::new(403, "Not your greeting"));
}

#[tokio::test]
async fn test_status_reason_fallback() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/greeting/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = gateway.get_greeting("missing").await;
    match result {
        Err(Error::Request(e)) => {
            assert_eq!(e.code, 404);
            assert_eq!(e.message, "Not Found");
        }
        other => panic!("expected normalized 404, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_failure_normalizes_to_code_zero() {
    let session = Arc::new(logged_in());
    let gateway = Gateway::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:1").unwrap(),
        session,
        ActivityTracker::default(),
        ValidationRegistry::new(),
    );

    let err = gateway.get("/greetings").await.unwrap_err();
    assert_eq!(err.code, 0);
    assert!(!err.message.is_empty());
    assert!(!gateway.activity().is_busy(), "failed request must settle the counter");
}

// ── Validation errors ───────────────────────────────────────────────

#[tokio::test]
async fn test_validation_errors_forwarded_on_failure() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("POST"))
        .and(path("/greetings"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": [
                { "property": "text", "context": "greeting", "errors": ["This value should not be blank."] }
            ]
        })))
        .mount(&server)
        .await;

    let payload = GreetingPayload {
        text: Some(String::new()),
        variant: Some("info".into()),
        ..Default::default()
    };
    let result = gateway.create_greeting(&payload).await;

    assert!(matches!(result, Err(Error::Request(ref e)) if e.code == 422));
    assert_eq!(
        gateway.validation().property_errors("text", "greeting"),
        vec!["This value should not be blank.".to_string()]
    );
}

#[tokio::test]
async fn test_validation_errors_forwarded_on_success() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("PATCH"))
        .and(path("/account/me/update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 7, "first_name": "Ada" },
            "errors": [{ "property": "last_name", "context": "profile", "errors": ["Too short"] }]
        })))
        .mount(&server)
        .await;

    let profile = greetsync_api::models::ProfileUpdate {
        first_name: "Ada".into(),
        last_name: "L".into(),
    };
    let user = gateway.update_profile(&profile).await.unwrap();

    assert_eq!(user.first_name, "Ada");
    assert_eq!(
        gateway.validation().property_errors("last_name", "profile"),
        vec!["Too short".to_string()]
    );
}

// ── Busy counters ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_counters_track_in_flight_requests() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/greetings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "greetings": [] }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let task = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.list_greetings(10, 0).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(gateway.activity().is_loading());
    assert!(!gateway.activity().is_action_in_progress());

    task.await.unwrap().unwrap();
    assert!(!gateway.activity().is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_quiet_endpoints_not_counted() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/mercure-auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "hub-token" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let task = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.hub_token().await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!gateway.activity().is_busy());

    task.await.unwrap().unwrap();
}

// ── Greeting endpoints ──────────────────────────────────────────────

#[tokio::test]
async fn test_list_greetings_discovers_hub() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/greetings"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    r#"<https://hub.test/.well-known/mercure>; rel="mercure""#,
                )
                .set_body_json(json!({ "greetings": [greeting("g1", "hi"), greeting("g2", "yo")] })),
        )
        .mount(&server)
        .await;

    let list = gateway.list_greetings(10, 0).await.unwrap();

    assert_eq!(list.data.len(), 2);
    assert_eq!(list.data[0].id, "g1");
    assert_eq!(list.data[1].text, "yo");
    assert_eq!(
        list.hub_url.map(String::from).as_deref(),
        Some("https://hub.test/.well-known/mercure")
    );
}

#[tokio::test]
async fn test_missing_link_header_degrades() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/greeting/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "greeting": greeting("42", "hi") })))
        .mount(&server)
        .await;

    let detail = gateway.get_greeting("42").await.unwrap();
    assert_eq!(detail.data.id, "42");
    assert!(detail.hub_url.is_none());
}

#[tokio::test]
async fn test_create_greeting_returns_stored_record() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("POST"))
        .and(path("/greetings"))
        .and(body_json(json!({ "text": "hi", "variant": "info" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "greeting": greeting("g1", "hi") })))
        .mount(&server)
        .await;

    let payload = GreetingPayload {
        text: Some("hi".into()),
        variant: Some("info".into()),
        ..Default::default()
    };
    let created = gateway.create_greeting(&payload).await.unwrap();

    assert_eq!(created.id, "g1");
    assert_eq!(created.variant.map(|v| v.name).as_deref(), Some("info"));
}

// ── Channel authorization ───────────────────────────────────────────

#[tokio::test]
async fn test_channel_authorization_posts_form_body() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("POST"))
        .and(path("/pusher-auth"))
        .and(body_string("socket_id=123.456&channel_name=private-greetings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth": "key:signature" })))
        .mount(&server)
        .await;

    let auth = gateway
        .authorize_channel("123.456", "private-greetings")
        .await
        .unwrap();
    assert_eq!(auth.auth, "key:signature");
}

#[tokio::test]
async fn test_channel_authorization_failure() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("POST"))
        .and(path("/pusher-auth"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = gateway.authorize_channel("1.2", "private-x").await;
    assert!(
        matches!(result, Err(Error::ChannelAuthorization(_))),
        "expected ChannelAuthorization error, got: {result:?}"
    );
}

// ── Malformed bodies and identifiers ────────────────────────────────

#[tokio::test]
async fn test_non_json_body_with_multibyte_text_is_rejected() {
    let (server, gateway) = setup(logged_in()).await;

    // Byte 200 falls inside the two-byte 'é'.
    let body = format!("{}é and more non-json text", "x".repeat(199));
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;

    let err = gateway.load_profile().await.unwrap_err();
    match err {
        Error::Deserialization { message, body: raw } => {
            assert!(message.contains('é'), "{message}");
            assert_eq!(raw, body);
        }
        other => panic!("expected a deserialization error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_identifiers_stay_inside_their_path_segment() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("GET"))
        .and(path("/greeting/..%2Faccount%2Flogout%2F5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "greeting": greeting("g1", "hi") })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/account/logout/5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let found = gateway.get_greeting("../account/logout/5").await.unwrap();
    assert_eq!(found.data.id, "g1");
}

#[tokio::test]
async fn test_dot_segment_identifier_is_rejected_locally() {
    let (server, gateway) = setup(logged_in()).await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = gateway.delete_greeting("..").await.unwrap_err();
    assert_eq!(err.status_code(), Some(400));
}
