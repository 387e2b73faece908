// Async client for the hosted backend.
//
// Row API:   /rest/v1/{table}
// Auth:      /auth/v1/...
// Functions: /functions/v1/{name}
// Every request carries the project `apikey` header plus a bearer token
// (the session's access token once signed in, the project key before).

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::Query;
use crate::Error;
use crate::auth::Session;

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";

// ── Error response shapes ────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct StoreErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(serde::Deserialize)]
struct FunctionErrorResponse {
    #[serde(default, alias = "message")]
    error: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the backend's rows, auth, and functions.
///
/// The session is held in an [`ArcSwapOption`] so a single client can be
/// shared across tasks while sign-in and sign-out swap the token.
pub struct StoreClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    session: ArcSwapOption<Session>,
}

impl StoreClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from the project URL, project key, and transport config.
    pub fn new(
        base_url: &str,
        api_key: &SecretString,
        transport: &crate::TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid project key header value: {e}"),
            })?;
        key_value.set_sensitive(true);
        headers.insert("apikey", key_value);

        let http = transport.build_client_with_headers(headers)?;
        Self::from_reqwest(base_url, http, api_key.clone())
    }

    /// Wrap an existing `reqwest::Client`.
    ///
    /// The `apikey` header is still attached per request, so the given
    /// client does not need default headers.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        api_key: SecretString,
    ) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        let path = base_url.path().trim_end_matches('/').to_owned();
        base_url.set_path(&format!("{path}/"));
        Ok(Self {
            http,
            base_url,
            api_key,
            session: ArcSwapOption::empty(),
        })
    }

    // ── Session ──────────────────────────────────────────────────────

    pub fn set_session(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.session.store(Some(Arc::clone(&session)));
        session
    }

    pub fn clear_session(&self) {
        self.session.store(None);
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.load_full()
    }

    /// The current session, or [`Error::NotAuthenticated`].
    pub fn require_session(&self) -> Result<Arc<Session>, Error> {
        self.session().ok_or(Error::NotAuthenticated)
    }

    /// The signed-in user's id, or [`Error::NotAuthenticated`].
    pub fn user_id(&self) -> Result<Uuid, Error> {
        self.require_session().map(|s| s.user_id)
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// WebSocket endpoint for realtime change subscriptions.
    pub fn realtime_url(&self) -> Result<Url, Error> {
        let mut url = self.url("realtime/v1/websocket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::RealtimeConnect(format!("cannot derive ws scheme for {url}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", self.api_key.expose_secret())
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn rest_url(&self, table: &str) -> Result<Url, Error> {
        self.url(&format!("rest/v1/{table}"))
    }

    /// Attach `apikey` and the bearer token.
    pub(crate) fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("apikey", self.api_key.expose_secret());
        match self.session() {
            Some(session) => builder.bearer_auth(session.access_token.expose_secret()),
            None => builder.bearer_auth(self.api_key.expose_secret()),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Row operations ───────────────────────────────────────────────

    /// `GET /rest/v1/{table}?{query}`
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, Error> {
        let url = self.rest_url(table)?;
        debug!("GET {url} params={:?}", query.params());

        let resp = self
            .authorize(self.http.get(url))
            .query(query.params())
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `POST /rest/v1/{table}` returning the inserted rows.
    pub async fn insert<T, B>(&self, table: &str, rows: &B) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = self.rest_url(table)?;
        debug!("POST {url}");

        let resp = self
            .authorize(self.http.post(url))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(rows)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `POST /rest/v1/{table}?on_conflict={cols}` merging on the given key.
    pub async fn upsert<T, B>(&self, table: &str, rows: &B, on_conflict: &str) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = self.rest_url(table)?;
        debug!("POST {url} on_conflict={on_conflict}");

        let resp = self
            .authorize(self.http.post(url))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", PREFER_UPSERT)
            .json(rows)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `PATCH /rest/v1/{table}?{query}` returning updated rows.
    pub async fn update<T, B>(&self, table: &str, query: &Query, patch: &B) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = self.rest_url(table)?;
        debug!("PATCH {url} params={:?}", query.params());

        let resp = self
            .authorize(self.http.patch(url))
            .query(query.params())
            .header("Prefer", PREFER_REPRESENTATION)
            .json(patch)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `DELETE /rest/v1/{table}?{query}` returning the deleted rows.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, Error> {
        let url = self.rest_url(table)?;
        debug!("DELETE {url} params={:?}", query.params());

        let resp = self
            .authorize(self.http.delete(url))
            .query(query.params())
            .header("Prefer", PREFER_REPRESENTATION)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    // ── Functions ────────────────────────────────────────────────────

    /// `POST /functions/v1/{name}` with a JSON body.
    pub async fn invoke<T, B>(&self, name: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(&format!("functions/v1/{name}"))?;
        debug!("POST {url}");

        let resp = self
            .authorize(self.http.post(url))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return decode_body(resp).await;
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<FunctionErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| if raw.is_empty() { status.to_string() } else { raw });
        Err(Error::Function {
            name: name.to_owned(),
            message,
            status: status.as_u16(),
        })
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            decode_body(resp).await
        } else {
            Err(parse_store_error(status, resp).await)
        }
    }
}

pub(crate) async fn decode_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

async fn parse_store_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::SessionExpired;
    }

    let raw = resp.text().await.unwrap_or_default();

    if let Ok(err) = serde_json::from_str::<StoreErrorResponse>(&raw) {
        let mut message = err.message.unwrap_or_else(|| status.to_string());
        if let Some(details) = err.details {
            message = format!("{message} ({details})");
        }
        Error::Store {
            status: status.as_u16(),
            message,
            code: err.code,
        }
    } else {
        Error::Store {
            status: status.as_u16(),
            message: if raw.is_empty() {
                status.to_string()
            } else {
                raw
            },
            code: None,
        }
    }
}
