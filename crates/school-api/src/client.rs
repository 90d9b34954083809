// Authenticated request client
//
// Wraps `reqwest::Client` with bearer-credential injection, uniform
// error-body parsing, and the session-invalidation sequence run on a 401.
// The client never retries: retry policy belongs to the caller.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::session::{Identity, Session, SessionStore};
use crate::transport::TransportConfig;

/// Body of a resource call.
pub enum Payload {
    /// No body.
    Empty,
    /// Structured body, sent as `application/json`.
    Json(Value),
    /// File-bearing submission, sent as `multipart/form-data`.
    Multipart(reqwest::multipart::Form),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| Error::Deserialization {
                message: format!("failed to encode payload: {e}"),
                body: String::new(),
            })
    }

    /// Single-file multipart payload.
    pub fn file(field: &str, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.into());
        Self::Multipart(reqwest::multipart::Form::new().part(field.to_owned(), part))
    }
}

/// Lifecycle of the session as seen by observers of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential held.
    Anonymous,
    /// A credential is held for this identity.
    Active(Identity),
    /// The server rejected the credential; the session was torn down.
    Expired,
    /// The user logged out deliberately.
    LoggedOut,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "token")]
    access_token: String,
    #[serde(default)]
    user: Option<Identity>,
}

#[derive(Default)]
struct SessionSlot {
    session: Option<Session>,
    /// Bumped on every install so a late 401 from an older session
    /// can be told apart from one against the current credential.
    generation: u64,
}

/// Request/response client for the school resource API.
///
/// Owns the session: it is created by [`login`](Self::login) or
/// [`resume`](Self::resume) and destroyed by [`logout`](Self::logout) or by
/// any call that comes back 401.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<dyn SessionStore>,
    slot: RwLock<SessionSlot>,
    status: watch::Sender<SessionStatus>,
    timeout_secs: u64,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the server root (e.g. `https://school.example.com`);
    /// resources are resolved under `/api/`.
    pub fn new(
        base_url: Url,
        transport: &TransportConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, base_url, store);
        client.timeout_secs = transport.timeout_secs();
        Ok(client)
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, store: Arc<dyn SessionStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Anonymous);
        Self {
            http,
            base_url,
            store,
            slot: RwLock::new(SessionSlot::default()),
            status,
            timeout_secs: 0,
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Session access ───────────────────────────────────────────────

    /// The current session, if one is held.
    pub fn session(&self) -> Option<Session> {
        self.read_slot().session.clone()
    }

    /// The current credential, if one is held.
    pub fn credential(&self) -> Option<SecretString> {
        self.read_slot()
            .session
            .as_ref()
            .map(|s| s.credential.clone())
    }

    /// The identity of the current session, if one is held.
    pub fn identity(&self) -> Option<Identity> {
        self.read_slot()
            .session
            .as_ref()
            .map(|s| s.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_slot().session.is_some()
    }

    /// Subscribe to session lifecycle changes.
    pub fn session_events(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    // ── Login / resume / logout ──────────────────────────────────────

    /// Authenticate with email and password.
    ///
    /// On success the session is installed and persisted. If the login
    /// response carries no user record, the identity is fetched from
    /// `auth/me` with the fresh credential.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Identity, Error> {
        let url = self.resource_url("auth/login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!(
                    "login failed (HTTP {status}): {}",
                    extract_error_message(status, &text)
                ),
            });
        }

        let text = resp.text().await.map_err(|e| self.map_transport(e))?;
        let login: LoginResponse = serde_json::from_str(&text).map_err(|e| {
            Error::Deserialization {
                message: format!("unexpected login response: {e}"),
                body: text.clone(),
            }
        })?;

        let credential = SecretString::from(login.access_token);
        let identity = match login.user {
            Some(user) => user,
            None => self.fetch_identity(&credential).await?,
        };

        let session = Session {
            credential,
            identity: identity.clone(),
        };
        self.store.save(&session.to_stored())?;
        self.install(session);

        info!(user = %identity.email, role = %identity.role, "login successful");
        Ok(identity)
    }

    /// Resume a session from the store without a fresh login.
    ///
    /// Returns `None` when the store holds no credential.
    pub fn resume(&self) -> Result<Option<Identity>, Error> {
        let Some(stored) = self.store.load()? else {
            debug!("no stored session to resume");
            return Ok(None);
        };
        let session = Session::from(stored);
        let identity = session.identity.clone();
        self.install(session);
        info!(user = %identity.email, "resumed stored session");
        Ok(Some(identity))
    }

    /// End the session deliberately and discard the stored entries.
    pub fn logout(&self) -> Result<(), Error> {
        self.take_session(None);
        self.store.clear()?;
        self.status.send_replace(SessionStatus::LoggedOut);
        debug!("logout complete");
        Ok(())
    }

    /// Tear down the current session because the server rejected it.
    ///
    /// Idempotent: returns `true` only for the call that actually removed
    /// a session, so storage is cleared exactly once.
    pub fn invalidate_session(&self) -> bool {
        let removed = self.take_session(None);
        if removed {
            self.finish_expiry();
        }
        removed
    }

    // ── Resource calls ───────────────────────────────────────────────

    /// Perform one request against `/api/<resource>`.
    ///
    /// Returns the parsed response body (`Value::Null` for an empty body).
    /// A 401 discards the session and fails with [`Error::SessionExpired`].
    pub async fn call(
        &self,
        resource: &str,
        method: Method,
        payload: Payload,
    ) -> Result<Value, Error> {
        let url = self.resource_url(resource)?;
        let (credential, generation) = {
            let slot = self.read_slot();
            (
                slot.session.as_ref().map(|s| s.credential.clone()),
                slot.generation,
            )
        };

        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, url);
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(&body),
            Payload::Multipart(form) => builder.multipart(form),
        };
        if let Some(ref token) = credential {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let resp = builder.send().await.map_err(|e| self.map_transport(e))?;
        self.parse_response(resp, credential.is_some().then_some(generation))
            .await
    }

    /// Like [`call`](Self::call), deserializing the body into `T`.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        method: Method,
        payload: Payload,
    ) -> Result<T, Error> {
        let value = self.call(resource, method, payload).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Build `{base}/api/{resource}`. Accepts `students`, `/students`,
    /// and `/api/students` alike.
    pub(crate) fn resource_url(&self, resource: &str) -> Result<Url, Error> {
        let trimmed = resource.trim_start_matches('/');
        let path = trimmed.strip_prefix("api/").unwrap_or(trimmed);
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    async fn fetch_identity(&self, credential: &SecretString) -> Result<Identity, Error> {
        let url = self.resource_url("auth/me")?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_transport(e))?;
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!(
                    "could not load identity (HTTP {status}): {}",
                    extract_error_message(status, &text)
                ),
            });
        }
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: format!("unexpected identity response: {e}"),
            body: text.clone(),
        })
    }

    async fn parse_response(
        &self,
        resp: reqwest::Response,
        generation: Option<u64>,
    ) -> Result<Value, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            if let Some(generation) = generation {
                if self.take_session(Some(generation)) {
                    self.finish_expiry();
                }
            }
            return Err(Error::SessionExpired);
        }

        let text = resp.text().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: extract_error_message(status, &text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            let preview = text.chars().take(200).collect::<String>();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: text.clone(),
            }
        })
    }

    fn install(&self, session: Session) {
        let identity = session.identity.clone();
        {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            slot.generation += 1;
            slot.session = Some(session);
        }
        self.status.send_replace(SessionStatus::Active(identity));
    }

    /// Remove the session if present (and, when given, only if it is still
    /// the generation the failing request was issued with).
    fn take_session(&self, generation: Option<u64>) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if generation.is_some_and(|g| g != slot.generation) {
            debug!("ignoring 401 from a superseded session");
            return false;
        }
        slot.session.take().is_some()
    }

    fn finish_expiry(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
        self.status.send_replace(SessionStatus::Expired);
        info!("session expired, credential discarded");
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, SessionSlot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Best-effort extraction of the server's error text.
///
/// Looks for `detail`, then `message`, then `error`; falls back to the
/// raw body, then to the status reason.
pub(crate) fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("API Error")
            .to_owned()
    } else {
        trimmed.to_owned()
    }
}
