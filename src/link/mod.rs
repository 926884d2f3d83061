//! Bank-link flow
//!
//! Authorizing a bank connection is a handshake between three parties: this
//! process, the user's browser and the checkclaw API. The CLI asks the API for
//! a short-lived link token, binds a one-shot HTTP listener on loopback, sends
//! the browser to the consent page, and waits for the page to POST its result
//! back. A public token in that result is exchanged for a permanent
//! connection.
//!
//! [`run_link_flow`] drives the whole exchange. Its collaborators (the API,
//! the browser and the console) are passed in as trait objects so the flow can
//! be exercised without a network or a desktop.

mod browser;
mod callback_server;
mod consent;
mod coordinator;

pub use browser::SystemBrowser;
pub use callback_server::{ListenerHandle, ListenerState, WaitError};
pub use consent::{consent_url, render_consent_page};
pub use coordinator::{run_link_flow, LinkFlow, LinkState};

use anyhow::Context;
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::api::ApiClient;
use crate::models::{Connection, ExchangeResponse, LinkTokenResponse};

/// A connection created by a successful exchange. Owned by the API.
pub type PersistedConnection = Connection;

/// Short-lived, single-use token scoping one linking attempt.
///
/// Not `Clone`: embedding it into a consent URL or page consumes
/// it, so one token can never back two listeners.
pub struct LinkToken(String);

impl LinkToken {
    /// Wrap a token issued by the API; blank tokens are rejected
    #[must_use]
    pub fn new(raw: String) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(Self(raw))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Give up the token; used when it is embedded somewhere
    #[must_use]
    pub fn into_secret(self) -> String {
        self.0
    }
}

impl fmt::Debug for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LinkToken(<redacted>)")
    }
}

/// What the API hands back when a link attempt starts
#[derive(Debug)]
pub struct LinkTokenGrant {
    pub token: LinkToken,
    /// Consent page chosen by the API, overriding the configured one
    pub consent_url: Option<String>,
}

/// The outcome posted by the consent page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Success {
        public_token: String,
        metadata: Option<serde_json::Value>,
    },
    Cancelled {
        reason: String,
    },
}

/// Terminal, non-error results of a link flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The bank is connected
    Exchanged(PersistedConnection),
    /// The user backed out or the consent page reported an error
    Cancelled { reason: String },
}

/// Failures of a link flow. None of these are retried inside one run; the
/// caller starts over from a fresh token.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("could not create a link token: {0}")]
    TokenRequestFailed(#[source] anyhow::Error),

    #[error("could not start the local callback listener: {0}")]
    ListenerStartFailed(#[source] std::io::Error),

    #[error("the consent page sent an unreadable result: {0}")]
    InvalidCallbackPayload(String),

    #[error("no response from the browser within {} seconds", .0.as_secs())]
    LinkTimedOut(Duration),

    #[error("could not exchange the public token: {0}")]
    ExchangeFailed(#[source] anyhow::Error),
}

/// Who serves the consent UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentHost {
    /// A hosted page POSTs back to the loopback listener, which only receives
    #[default]
    Remote,
    /// The loopback listener also serves the consent page at `/`
    Local,
}

/// Knobs for one link flow run
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Hosted consent page, used with [`ConsentHost::Remote`]
    pub consent_base_url: Url,
    pub consent_host: ConsentHost,
    /// How long to wait for the browser
    pub timeout: Duration,
    /// Loopback port to bind; 0 lets the OS choose
    pub callback_port: u16,
    /// When false, the consent URL is only printed
    pub open_browser: bool,
}

impl LinkOptions {
    /// Options with defaults for everything but the consent page
    ///
    /// # Errors
    /// Returns an error if `consent_base_url` is not an absolute http(s) URL
    pub fn new(consent_base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = Url::parse(consent_base_url)
            .with_context(|| format!("Invalid consent page URL: {consent_base_url}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Consent page URL must be http or https: {consent_base_url}");
        }
        Ok(Self {
            consent_base_url: url,
            consent_host: ConsentHost::Remote,
            timeout,
            callback_port: 0,
            open_browser: true,
        })
    }
}

/// The API calls the link flow needs
#[async_trait]
pub trait LinkApi: Send + Sync {
    /// `POST /link/token`
    async fn create_link_token(&self) -> anyhow::Result<LinkTokenGrant>;

    /// `POST /link/exchange`
    async fn exchange_public_token(&self, public_token: &str)
        -> anyhow::Result<PersistedConnection>;
}

/// Opens URLs in the user's browser
pub trait BrowserLauncher: Send + Sync {
    /// # Errors
    /// Returns an error if no browser could be launched
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Progress notifications for whoever is watching the flow
pub trait LinkEvents: Send + Sync {
    fn token_created(&self) {}

    fn listening(&self, _addr: SocketAddr) {}

    fn browser_opened(&self, _url: &str) {}

    /// The browser could not be opened; the user has to open `url` by hand
    fn browser_unavailable(&self, url: &str, reason: &str);

    fn waiting(&self, _timeout: Duration) {}

    fn callback_received(&self) {}

    fn exchanging(&self) {}
}

#[async_trait]
impl LinkApi for ApiClient {
    async fn create_link_token(&self) -> anyhow::Result<LinkTokenGrant> {
        self.require_auth()?;
        let response: LinkTokenResponse = self.post("/link/token", None::<&()>).await?;
        let token = response
            .link_token
            .and_then(LinkToken::new)
            .context("response did not include a link token")?;
        Ok(LinkTokenGrant {
            token,
            consent_url: response.link_url.filter(|u| !u.trim().is_empty()),
        })
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> anyhow::Result<PersistedConnection> {
        let body = serde_json::json!({ "public_token": public_token });
        let response: serde_json::Value = self.post("/link/exchange", Some(&body)).await?;
        connection_from_exchange(response)
    }
}

/// A 200 from `/link/exchange` can still reject the token in its body
fn connection_from_exchange(body: serde_json::Value) -> anyhow::Result<PersistedConnection> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let reason = error
            .as_str()
            .map_or_else(|| error.to_string(), str::to_string);
        anyhow::bail!("the API rejected the public token: {reason}");
    }
    if body.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        anyhow::bail!("the API rejected the public token");
    }
    let response: ExchangeResponse =
        serde_json::from_value(body).context("unexpected exchange response")?;
    let connection = response.into_connection();
    if connection.id.trim().is_empty() {
        anyhow::bail!("response did not include a connection id");
    }
    Ok(connection)
}
