//! Realtime row-change stream with auto-reconnect.
//!
//! Connects to the backend's Phoenix-channel WebSocket, joins one channel
//! carrying a set of `postgres_changes` filters, and streams parsed
//! [`ChangeEvent`]s through a [`tokio::sync::broadcast`] channel. Sends a
//! heartbeat every 30 s and reconnects with exponential backoff + jitter.
//!
//! A [`RealtimeHandle`] owns its background task: dropping the handle (or
//! calling [`shutdown`](RealtimeHandle::shutdown)) cancels it. The access
//! token is read from a [`TokenSource`] on every attempt, so a reconnect
//! after a token refresh joins with the current token.
//!
//! # Example
//!
//! ```rust,ignore
//! use homeboard_api::{ChangeFilter, ChangeKind, RealtimeHandle, ReconnectConfig, token_source};
//! use tokio_util::sync::CancellationToken;
//!
//! let filters = vec![
//!     ChangeFilter::new("smart_home_devices", ChangeKind::Update)
//!         .with_filter(format!("user_id=eq.{user_id}")),
//! ];
//! let token = token_source(move || {
//!     let store = Arc::clone(&store);
//!     async move { store.current_access_token().await.ok() }
//! });
//! let handle = RealtimeHandle::connect(
//!     store.realtime_url()?, token, filters,
//!     ReconnectConfig::default(), CancellationToken::new(),
//! )?;
//! let mut rx = handle.subscribe();
//! while let Ok(change) = rx.recv().await {
//!     println!("{} {:?}", change.table, change.kind);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Constants ────────────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CHANNEL_TOPIC: &str = "realtime:homeboard";
const JOIN_REF: &str = "1";

/// Yields the access token to join with, or `None` once signed out.
pub type TokenSource = Arc<dyn Fn() -> BoxFuture<'static, Option<SecretString>> + Send + Sync>;

/// Wrap an async closure as a [`TokenSource`].
pub fn token_source<F, Fut>(f: F) -> TokenSource
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<SecretString>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

// ── Change types ─────────────────────────────────────────────────────

/// Row-level change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// One `postgres_changes` subscription: a table, an optional event kind
/// (`None` means all), and an optional row filter such as `user_id=eq.<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    pub event: Option<ChangeKind>,
    pub filter: Option<String>,
}

impl ChangeFilter {
    pub fn new(table: impl Into<String>, event: ChangeKind) -> Self {
        Self {
            table: table.into(),
            event: Some(event),
            filter: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn to_json(&self) -> serde_json::Value {
        let mut cfg = serde_json::json!({
            "event": self.event.map_or("*", ChangeKind::as_str),
            "schema": "public",
            "table": self.table,
        });
        if let Some(ref f) = self.filter {
            cfg["filter"] = serde_json::Value::String(f.clone());
        }
        cfg
    }
}

/// A parsed row change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// New row image (empty object for deletes).
    #[serde(default)]
    pub record: serde_json::Value,
    /// Previous row image; only the primary key unless replica identity is full.
    #[serde(default)]
    pub old_record: serde_json::Value,
    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for realtime reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── RealtimeHandle ───────────────────────────────────────────────────

/// Scoped handle to a running realtime subscription.
///
/// The background task lives exactly as long as this handle: it is
/// cancelled on [`shutdown`](Self::shutdown) and on drop.
pub struct RealtimeHandle {
    event_rx: broadcast::Receiver<Arc<ChangeEvent>>,
    joins: watch::Receiver<u64>,
    cancel: CancellationToken,
}

impl RealtimeHandle {
    /// Spawn the connect/reconnect loop for the given filters.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. `cancel` is wrapped in a child token so callers may pass
    /// a session-wide token without this handle cancelling its siblings.
    pub fn connect(
        ws_url: Url,
        access_token: TokenSource,
        filters: Vec<ChangeFilter>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if filters.is_empty() {
            return Err(Error::RealtimeConnect(
                "at least one change filter is required".into(),
            ));
        }
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (joins_tx, joins) = watch::channel(0);

        let cancel = cancel.child_token();
        let task_cancel = cancel.clone();
        let link = Link {
            ws_url,
            filters,
            access_token,
            event_tx,
            joins_tx,
        };
        tokio::spawn(async move {
            realtime_loop(link, reconnect, task_cancel).await;
        });

        Ok(Self {
            event_rx,
            joins,
            cancel,
        })
    }

    /// Get a new broadcast receiver for the change stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeEvent>> {
        self.event_rx.resubscribe()
    }

    /// Count of acknowledged channel joins, bumped once per (re)connect.
    ///
    /// Changes committed while the socket was down are never replayed, so
    /// callers reload their state whenever this moves past 1.
    pub fn joins(&self) -> watch::Receiver<u64> {
        self.joins.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Everything one connection attempt needs. Owned by the background task,
/// so receivers observe `Closed` once it exits.
struct Link {
    ws_url: Url,
    filters: Vec<ChangeFilter>,
    access_token: TokenSource,
    event_tx: broadcast::Sender<Arc<ChangeEvent>>,
    joins_tx: watch::Sender<u64>,
}

/// Main loop: connect → join → read → on error, backoff → reconnect.
async fn realtime_loop(link: Link, reconnect: ReconnectConfig, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&link, &cancel) => {
                match result {
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("realtime disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "realtime error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "realtime reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    #[allow(unreachable_code)]
    { tracing::debug!("realtime loop exiting"); }
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn connect_and_read(link: &Link, cancel: &CancellationToken) -> Result<(), Error> {
    let url = &link.ws_url;
    let token = (link.access_token)()
        .await
        .ok_or_else(|| Error::RealtimeConnect("no access token available".into()))?;
    let join = build_join(&link.filters, &token);

    tracing::info!(host = url.host_str().unwrap_or(""), "connecting to realtime");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::RealtimeConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    write
        .send(tungstenite::Message::text(join))
        .await
        .map_err(|e| Error::RealtimeConnect(e.to_string()))?;
    tracing::info!("realtime connected, join sent");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut msg_ref: u64 = 1;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.close().await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                msg_ref += 1;
                write
                    .send(tungstenite::Message::text(heartbeat_message(msg_ref)))
                    .await
                    .map_err(|e| Error::RealtimeConnect(e.to_string()))?;
                tracing::trace!(msg_ref, "realtime heartbeat");
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match parse_frame(&text) {
                            Frame::Change(change) => {
                                let _ = link.event_tx.send(Arc::new(change));
                            }
                            Frame::Joined => {
                                link.joins_tx.send_modify(|n| *n += 1);
                                tracing::debug!("realtime channel joined");
                            }
                            Frame::JoinRejected(reason) => {
                                return Err(Error::RealtimeConnect(format!(
                                    "channel join rejected: {reason}"
                                )));
                            }
                            Frame::ChannelClosed => {
                                return Err(Error::RealtimeClosed {
                                    code: 1000,
                                    reason: "channel closed by server".into(),
                                });
                            }
                            Frame::Other => {}
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "realtime close frame received"
                            );
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::RealtimeConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("realtime stream ended");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }
}

// ── Phoenix framing ──────────────────────────────────────────────────

fn build_join(filters: &[ChangeFilter], access_token: &SecretString) -> String {
    let changes: Vec<_> = filters.iter().map(ChangeFilter::to_json).collect();
    serde_json::json!({
        "topic": CHANNEL_TOPIC,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": changes,
            },
            "access_token": access_token.expose_secret(),
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
    .to_string()
}

fn heartbeat_message(msg_ref: u64) -> String {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct PhxMessage {
    #[allow(dead_code)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    msg_ref: Option<String>,
}

#[derive(Debug)]
enum Frame {
    Change(ChangeEvent),
    Joined,
    JoinRejected(String),
    ChannelClosed,
    Other,
}

/// Classify one text frame from the socket.
fn parse_frame(text: &str) -> Frame {
    let msg: PhxMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse realtime frame");
            return Frame::Other;
        }
    };

    match msg.event.as_str() {
        "postgres_changes" => {
            match serde_json::from_value::<ChangeEvent>(msg.payload["data"].clone()) {
                Ok(change) => Frame::Change(change),
                Err(e) => {
                    tracing::debug!(error = %e, "unrecognized postgres_changes payload");
                    Frame::Other
                }
            }
        }
        "phx_reply" if msg.payload["status"] == "error" => {
            let reason = msg.payload["response"]["reason"]
                .as_str()
                .unwrap_or("unknown")
                .to_owned();
            Frame::JoinRejected(reason)
        }
        "phx_reply" if msg.msg_ref.as_deref() == Some(JOIN_REF) => Frame::Joined,
        "phx_error" | "phx_close" => Frame::ChannelClosed,
        _ => Frame::Other,
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`, jitter within +-25%.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };
        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_secs(13));
    }

    #[test]
    fn join_carries_filters_and_token() {
        let filters = vec![
            ChangeFilter::new("smart_home_devices", ChangeKind::Update)
                .with_filter("user_id=eq.u1"),
            ChangeFilter::new("device_activity_logs", ChangeKind::Insert),
        ];
        let raw = build_join(&filters, &SecretString::from("tok"));
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(v["event"], "phx_join");
        assert_eq!(v["payload"]["access_token"], "tok");
        let changes = v["payload"]["config"]["postgres_changes"].as_array().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["event"], "UPDATE");
        assert_eq!(changes[0]["filter"], "user_id=eq.u1");
        assert_eq!(changes[1]["table"], "device_activity_logs");
        assert!(changes[1].get("filter").is_none());
    }

    #[test]
    fn heartbeat_targets_phoenix_topic() {
        let v: serde_json::Value = serde_json::from_str(&heartbeat_message(7)).unwrap();
        assert_eq!(v["topic"], "phoenix");
        assert_eq!(v["event"], "heartbeat");
        assert_eq!(v["ref"], "7");
    }

    #[test]
    fn parses_update_change() {
        let raw = serde_json::json!({
            "topic": CHANNEL_TOPIC,
            "event": "postgres_changes",
            "payload": {
                "ids": [1],
                "data": {
                    "schema": "public",
                    "table": "smart_home_devices",
                    "type": "UPDATE",
                    "commit_timestamp": "2026-03-01T10:00:00Z",
                    "record": { "id": "d1", "status": { "state": "on" } },
                    "old_record": { "id": "d1" },
                    "columns": []
                }
            },
            "ref": null
        });

        match parse_frame(&raw.to_string()) {
            Frame::Change(c) => {
                assert_eq!(c.table, "smart_home_devices");
                assert_eq!(c.kind, ChangeKind::Update);
                assert_eq!(c.record["status"]["state"], "on");
                assert!(c.commit_timestamp.is_some());
            }
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[test]
    fn join_error_reply_is_rejection() {
        let raw = serde_json::json!({
            "topic": CHANNEL_TOPIC,
            "event": "phx_reply",
            "payload": { "status": "error", "response": { "reason": "invalid token" } },
            "ref": "1"
        });
        match parse_frame(&raw.to_string()) {
            Frame::JoinRejected(r) => assert_eq!(r, "invalid token"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn ok_reply_to_join_is_acknowledgement() {
        let ok = serde_json::json!({
            "topic": CHANNEL_TOPIC,
            "event": "phx_reply",
            "payload": { "status": "ok", "response": {} },
            "ref": "1"
        });
        assert!(matches!(parse_frame(&ok.to_string()), Frame::Joined));
    }

    #[test]
    fn heartbeat_reply_and_garbage_are_ignored() {
        let heartbeat = serde_json::json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "payload": { "status": "ok", "response": {} },
            "ref": "7"
        });
        assert!(matches!(parse_frame(&heartbeat.to_string()), Frame::Other));
        assert!(matches!(parse_frame("not json at all"), Frame::Other));
    }

    fn fixed_token(raw: &'static str) -> TokenSource {
        token_source(move || async move { Some(SecretString::from(raw)) })
    }

    #[tokio::test]
    async fn attempt_without_token_fails_before_dialing() {
        let (event_tx, _event_rx) = broadcast::channel(4);
        let (joins_tx, joins) = watch::channel(0);
        let link = Link {
            ws_url: Url::parse("ws://127.0.0.1:9/realtime/v1/websocket").unwrap(),
            filters: vec![ChangeFilter::new("smart_home_devices", ChangeKind::Update)],
            access_token: token_source(|| async { None }),
            event_tx,
            joins_tx,
        };
        let err = connect_and_read(&link, &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("no access token"));
        assert_eq!(*joins.borrow(), 0);
    }

    #[tokio::test]
    async fn drop_cancels_background_task() {
        let url = Url::parse("ws://127.0.0.1:9/realtime/v1/websocket").unwrap();
        let parent = CancellationToken::new();
        let handle = RealtimeHandle::connect(
            url,
            fixed_token("tok"),
            vec![ChangeFilter::new("smart_home_devices", ChangeKind::Update)],
            ReconnectConfig::default(),
            parent.clone(),
        )
        .unwrap();
        let child = handle.cancel.clone();
        drop(handle);
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn connect_requires_filters() {
        let url = Url::parse("ws://127.0.0.1:9/").unwrap();
        let result = RealtimeHandle::connect(
            url,
            fixed_token("tok"),
            Vec::new(),
            ReconnectConfig::default(),
            CancellationToken::new(),
        );
        assert!(result.is_err());
    }
}
