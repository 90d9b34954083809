#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use school_api::{
    ApiClient, Error, Identity, MemorySessionStore, Method, Payload, Role, SessionStatus,
    SessionStore, StoredSession,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Memory store that counts how often it was cleared.
#[derive(Default)]
struct CountingStore {
    inner: MemorySessionStore,
    clears: AtomicUsize,
}

impl SessionStore for CountingStore {
    fn load(&self) -> Result<Option<StoredSession>, Error> {
        self.inner.load()
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        self.inner.save(session)
    }

    fn clear(&self) -> Result<(), Error> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

fn admin() -> Value {
    json!({
        "id": 1,
        "name": "Admin User",
        "role": "admin",
        "email": "admin@school.com"
    })
}

async fn setup() -> (MockServer, ApiClient, Arc<CountingStore>) {
    let server = MockServer::start().await;
    let store = Arc::new(CountingStore::default());
    let client = ApiClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        store.clone(),
    );
    (server, client, store)
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "user": admin()
        })))
        .mount(server)
        .await;
}

async fn logged_in() -> (MockServer, ApiClient, Arc<CountingStore>) {
    let (server, client, store) = setup().await;
    mount_login(&server, "tok-1").await;
    let password = SecretString::from("admin123".to_string());
    client.login("admin@school.com", &password).await.unwrap();
    (server, client, store)
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_installs_and_persists_session() {
    let (server, client, store) = setup().await;
    mount_login(&server, "tok-1").await;

    let password = SecretString::from("admin123".to_string());
    let identity = client.login("admin@school.com", &password).await.unwrap();

    assert_eq!(identity.display_name, "Admin User");
    assert_eq!(identity.role, Role::Admin);
    assert_eq!(client.credential().unwrap().expose_secret(), "tok-1");
    assert_eq!(store.load().unwrap().unwrap().token, "tok-1");
    assert_eq!(
        *client.session_events().borrow(),
        SessionStatus::Active(identity)
    );
}

#[tokio::test]
async fn test_login_without_user_fetches_identity() {
    let (server, client, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-9" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer tok-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4,
            "full_name": "Bob Parent",
            "role": "parent",
            "email": "parent@school.com"
        })))
        .mount(&server)
        .await;

    let password = SecretString::from("parent123".to_string());
    let identity = client.login("parent@school.com", &password).await.unwrap();

    assert_eq!(identity.role, Role::Parent);
    assert_eq!(identity.display_name, "Bob Parent");
}

#[tokio::test]
async fn test_login_failure() {
    let (server, client, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Incorrect email or password" })),
        )
        .mount(&server)
        .await;

    let password = SecretString::from("wrong".to_string());
    let result = client.login("admin@school.com", &password).await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(message.contains("Incorrect email"), "got: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert!(!client.is_authenticated());
    assert_eq!(store.clears.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resume_from_store() {
    let server = MockServer::start().await;
    let stored = StoredSession {
        token: "persisted".into(),
        user: Identity {
            id: 3,
            display_name: "Alice Student".into(),
            role: Role::Student,
            email: "student@school.com".into(),
        },
    };
    let client = ApiClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        Arc::new(MemorySessionStore::with_session(stored)),
    );

    let identity = client.resume().unwrap().unwrap();
    assert_eq!(identity.role, Role::Student);
    assert_eq!(client.credential().unwrap().expose_secret(), "persisted");
}

#[tokio::test]
async fn test_resume_with_empty_store() {
    let (_server, client, _store) = setup().await;
    assert!(client.resume().unwrap().is_none());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_store() {
    let (_server, client, store) = logged_in().await;

    client.logout().unwrap();

    assert!(!client.is_authenticated());
    assert!(store.load().unwrap().is_none());
    assert_eq!(*client.session_events().borrow(), SessionStatus::LoggedOut);
}

// ── Resource call tests ─────────────────────────────────────────────

#[tokio::test]
async fn test_call_attaches_bearer_credential() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/students"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "students": [{ "id": 1, "name": "Alice" }]
        })))
        .mount(&server)
        .await;

    let body = client
        .call("/api/students", Method::GET, Payload::Empty)
        .await
        .unwrap();

    assert_eq!(body["students"][0]["name"], "Alice");
}

#[tokio::test]
async fn test_call_without_session_omits_header() {
    let (server, client, _store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/announcements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    client
        .call("announcements", Method::GET, Payload::Empty)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let (server, client, _store) = logged_in().await;

    let student = json!({ "name": "Carol", "class": "10-A" });
    Mock::given(method("POST"))
        .and(path("/api/students"))
        .and(body_json(&student))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 42 })))
        .mount(&server)
        .await;

    let created = client
        .call("students", Method::POST, Payload::Json(student))
        .await
        .unwrap();
    assert_eq!(created["id"], 42);
}

#[tokio::test]
async fn test_multipart_upload() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/api/homework/7/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "submitted" })))
        .mount(&server)
        .await;

    let payload = Payload::file("file", "essay.txt", b"my essay".to_vec());
    client
        .call("homework/7/submit", Method::POST, payload)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let upload = requests.last().unwrap();
    let content_type = upload
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data"), "got: {content_type}");
    assert!(String::from_utf8_lossy(&upload.body).contains("my essay"));
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("DELETE"))
        .and(path("/api/students/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let body = client
        .call("students/5", Method::DELETE, Payload::Empty)
        .await
        .unwrap();
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_call_json_deserializes() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(admin()))
        .mount(&server)
        .await;

    let me: Identity = client
        .call_json("auth/me", Method::GET, Payload::Empty)
        .await
        .unwrap();
    assert_eq!(me.email, "admin@school.com");
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_expires_session() {
    let (server, client, store) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/api/students"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = client
        .call("/api/students", Method::POST, Payload::Json(json!({ "name": "X" })))
        .await;

    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
    assert!(client.credential().is_none());
    assert!(client.identity().is_none());
    assert!(store.load().unwrap().is_none());
    assert_eq!(*client.session_events().borrow(), SessionStatus::Expired);

    // The next call goes out without a credential.
    client
        .call("/api/students", Method::GET, Payload::Empty)
        .await
        .unwrap();
    let requests = server.received_requests().await.unwrap();
    assert!(requests.last().unwrap().headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_concurrent_unauthorized_clears_once() {
    let (server, client, store) = logged_in().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let (a, b, c) = tokio::join!(
        client.call("students", Method::GET, Payload::Empty),
        client.call("homework", Method::GET, Payload::Empty),
        client.call("fees", Method::GET, Payload::Empty),
    );

    assert!(matches!(a, Err(Error::SessionExpired)));
    assert!(matches!(b, Err(Error::SessionExpired)));
    assert!(matches!(c, Err(Error::SessionExpired)));
    assert_eq!(store.clears.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_late_unauthorized_does_not_end_newer_session() {
    let (server, client, store) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/students"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let password = SecretString::from("admin123".to_string());
    let (stale, relogin) = tokio::join!(
        client.call("students", Method::GET, Payload::Empty),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.login("admin@school.com", &password).await
        },
    );

    assert!(matches!(stale, Err(Error::SessionExpired)));
    relogin.unwrap();
    assert!(client.is_authenticated());
    assert_eq!(store.clears.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_api_error_carries_detail() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/api/fees"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Amount must be positive" })),
        )
        .mount(&server)
        .await;

    let result = client
        .call("fees", Method::POST, Payload::Json(json!({ "amount": -1 })))
        .await;

    match result {
        Err(Error::Api { status, ref message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Amount must be positive");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
    // Non-401 failures leave the session alone.
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_api_error_raw_text() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/attendance"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let result = client.call("attendance", Method::GET, Payload::Empty).await;

    match result {
        Err(Error::Api { status, ref message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_success_body() {
    let (server, client, _store) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/exams"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = client.call("exams", Method::GET, Payload::Empty).await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}
