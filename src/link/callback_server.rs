//! One-shot loopback listener that receives the consent page's result.
//!
//! The listener binds `127.0.0.1` only. The first `POST /callback` claims the
//! single outcome slot; anything after that is answered `409 Conflict` and has
//! no effect.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};

use super::CallbackResult;

/// Upper bound on waiting for in-flight responses during shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const ALLOW_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-allow-private-network");

/// Lifecycle of a [`ListenerHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Listening,
    Fulfilled,
    TimedOut,
    Errored,
    Closed,
}

/// Why [`ListenerHandle::wait`] produced no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    TimedOut,
    /// The body was not a JSON object; the browser got a 400
    Malformed(String),
    /// The listener was already resolved or closed
    Closed,
}

enum CallbackMessage {
    Received(CallbackResult),
    Malformed(String),
}

type OutcomeSlot = Arc<Mutex<Option<oneshot::Sender<CallbackMessage>>>>;

#[derive(Clone)]
struct CallbackState {
    slot: OutcomeSlot,
    consent_page: Option<Arc<str>>,
}

/// A bound loopback listener serving the callback endpoint
#[derive(Debug)]
pub struct ListenerHandle {
    addr: SocketAddr,
    state: ListenerState,
    slot: OutcomeSlot,
    outcome: Option<oneshot::Receiver<CallbackMessage>>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CallbackMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received(_) => f.write_str("Received"),
            Self::Malformed(reason) => write!(f, "Malformed({reason})"),
        }
    }
}

impl ListenerHandle {
    /// Bind `127.0.0.1:port` (0 for an ephemeral port) and start serving.
    ///
    /// With `consent_page` set, `GET /` serves that page; otherwise the
    /// listener is a pure callback sink.
    ///
    /// # Errors
    /// Returns the bind error when the port is unavailable
    pub async fn bind(port: u16, consent_page: Option<String>) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let addr = listener.local_addr()?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let slot: OutcomeSlot = Arc::new(Mutex::new(Some(outcome_tx)));
        let state = CallbackState {
            slot: Arc::clone(&slot),
            consent_page: consent_page.map(Arc::from),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(state);
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!("callback listener stopped with error: {e}");
            }
        });

        debug!(%addr, "callback listener bound");
        Ok(Self {
            addr,
            state: ListenerState::Listening,
            slot,
            outcome: Some(outcome_rx),
            shutdown: Some(shutdown_tx),
            server: Some(server),
        })
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    #[must_use]
    pub const fn state(&self) -> ListenerState {
        self.state
    }

    /// Suspend until the first callback arrives or `timeout` elapses
    ///
    /// # Errors
    /// See [`WaitError`]
    pub async fn wait(&mut self, timeout: Duration) -> Result<CallbackResult, WaitError> {
        let Some(outcome) = self.outcome.take() else {
            return Err(WaitError::Closed);
        };

        match tokio::time::timeout(timeout, outcome).await {
            Err(_) => {
                self.state = ListenerState::TimedOut;
                Err(WaitError::TimedOut)
            }
            Ok(Err(_)) => {
                self.state = ListenerState::Errored;
                Err(WaitError::Closed)
            }
            Ok(Ok(CallbackMessage::Malformed(reason))) => {
                self.state = ListenerState::Errored;
                Err(WaitError::Malformed(reason))
            }
            Ok(Ok(CallbackMessage::Received(result))) => {
                self.state = ListenerState::Fulfilled;
                Ok(result)
            }
        }
    }

    /// Stop serving and release the port. Safe to call more than once.
    pub async fn close(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };

        // Late callbacks racing the shutdown see an empty slot and get a 409.
        if let Ok(mut slot) = self.slot.lock() {
            slot.take();
        }
        self.outcome = None;
        let _ = shutdown.send(());

        if let Some(server) = self.server.take() {
            let abort = server.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("callback listener task failed: {e}"),
                Err(_) => {
                    warn!("callback listener did not drain in time; aborting");
                    abort.abort();
                }
            }
        }

        self.state = ListenerState::Closed;
        debug!(addr = %self.addr, "callback listener closed");
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, ListenerState::Closed)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn router(state: CallbackState) -> Router {
    Router::new()
        .route("/", get(consent_page))
        .route("/callback", post(receive_callback).options(preflight))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

async fn consent_page(State(state): State<CallbackState>) -> Response {
    match state.consent_page {
        Some(page) => Html(page.to_string()).into_response(),
        None => not_found().await,
    }
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (ACCESS_CONTROL_MAX_AGE, "600"),
            (ALLOW_PRIVATE_NETWORK, "true"),
        ],
    )
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

async fn receive_callback(State(state): State<CallbackState>, body: Bytes) -> Response {
    let sender = state.slot.lock().ok().and_then(|mut slot| slot.take());
    let Some(sender) = sender else {
        debug!("ignoring callback after the outcome was already claimed");
        return (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "error": "callback already received" })),
        )
            .into_response();
    };

    match parse_callback_body(&body) {
        Ok(result) => {
            let _ = sender.send(CallbackMessage::Received(result));
            (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
        }
        Err(reason) => {
            warn!("malformed callback body: {reason}");
            let _ = sender.send(CallbackMessage::Malformed(reason.clone()));
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": reason })),
            )
                .into_response()
        }
    }
}

/// Classify a callback body.
///
/// An `error` field wins over everything else; a missing or empty
/// `public_token` also counts as a cancellation.
///
/// # Errors
/// Returns a description when the body is not a JSON object
pub(crate) fn parse_callback_body(body: &[u8]) -> Result<CallbackResult, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(fields) = value else {
        return Err("expected a JSON object".to_string());
    };

    if let Some(error) = fields.get("error").filter(|v| !v.is_null()) {
        let reason = match error {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::String(_) | Value::Bool(_) => "cancelled".to_string(),
            other => other.to_string(),
        };
        return Ok(CallbackResult::Cancelled { reason });
    }

    match fields
        .get("public_token")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
    {
        Some(public_token) => Ok(CallbackResult::Success {
            public_token: public_token.to_string(),
            metadata: fields.get("metadata").filter(|m| !m.is_null()).cloned(),
        }),
        None => Ok(CallbackResult::Cancelled {
            reason: "cancelled".to_string(),
        }),
    }
}
