//! Link flow state machine
//!
//! ```text
//! Idle -> TokenRequested -> ListenerBound -> AwaitingBrowser -> CallbackReceived
//!                                                                 |-> Cancelled
//!                                                                 '-> Exchanging -> Exchanged
//! any non-terminal state -> Failed
//! ```

use tracing::{debug, info, warn};
use url::Url;

use super::callback_server::{ListenerHandle, WaitError};
use super::consent::{consent_url, local_page_url, render_consent_page};
use super::{
    BrowserLauncher, CallbackResult, ConsentHost, LinkApi, LinkError, LinkEvents, LinkOptions,
    LinkOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    TokenRequested,
    ListenerBound,
    AwaitingBrowser,
    CallbackReceived,
    Exchanging,
    Exchanged,
    Cancelled,
    Failed,
}

impl LinkState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exchanged | Self::Cancelled | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::TokenRequested)
            | (Self::TokenRequested, Self::ListenerBound)
            | (Self::ListenerBound, Self::AwaitingBrowser)
            | (Self::AwaitingBrowser, Self::CallbackReceived)
            | (Self::CallbackReceived, Self::Exchanging | Self::Cancelled)
            | (Self::Exchanging, Self::Exchanged) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// One run of the link flow. Consumed by [`LinkFlow::run`].
pub struct LinkFlow<'a> {
    api: &'a dyn LinkApi,
    browser: &'a dyn BrowserLauncher,
    events: &'a dyn LinkEvents,
    options: &'a LinkOptions,
    state: LinkState,
}

impl<'a> LinkFlow<'a> {
    #[must_use]
    pub fn new(
        api: &'a dyn LinkApi,
        browser: &'a dyn BrowserLauncher,
        events: &'a dyn LinkEvents,
        options: &'a LinkOptions,
    ) -> Self {
        Self {
            api,
            browser,
            events,
            options,
            state: LinkState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Drive the flow to a terminal state
    ///
    /// # Errors
    /// Returns the [`LinkError`] of the step that failed
    pub async fn run(mut self) -> Result<LinkOutcome, LinkError> {
        let result = self.drive().await;
        if let Err(e) = &result {
            warn!("link flow failed in state {:?}: {e}", self.state);
            self.advance(LinkState::Failed);
        }
        result
    }

    fn advance(&mut self, next: LinkState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal link transition {:?} -> {next:?}",
            self.state
        );
        debug!(from = ?self.state, to = ?next, "link state");
        self.state = next;
    }

    async fn drive(&mut self) -> Result<LinkOutcome, LinkError> {
        self.advance(LinkState::TokenRequested);
        let grant = self
            .api
            .create_link_token()
            .await
            .map_err(LinkError::TokenRequestFailed)?;
        self.events.token_created();

        let (page, remote_token) = match self.options.consent_host {
            ConsentHost::Local => (Some(render_consent_page(grant.token)), None),
            ConsentHost::Remote => (None, Some(grant.token)),
        };

        let mut listener = ListenerHandle::bind(self.options.callback_port, page)
            .await
            .map_err(LinkError::ListenerStartFailed)?;
        self.advance(LinkState::ListenerBound);
        let addr = listener.addr();
        self.events.listening(addr);

        let url = match remote_token {
            Some(token) => {
                let base = grant
                    .consent_url
                    .as_deref()
                    .and_then(|raw| match Url::parse(raw) {
                        Ok(url) => Some(url),
                        Err(e) => {
                            warn!("ignoring unusable consent URL from the API ({raw}): {e}");
                            None
                        }
                    })
                    .unwrap_or_else(|| self.options.consent_base_url.clone());
                consent_url(&base, token, addr).to_string()
            }
            None => local_page_url(addr),
        };

        self.advance(LinkState::AwaitingBrowser);
        if self.options.open_browser {
            match self.browser.open(&url) {
                Ok(()) => self.events.browser_opened(&url),
                Err(e) => self.events.browser_unavailable(&url, &format!("{e:#}")),
            }
        } else {
            self.events
                .browser_unavailable(&url, "opening the browser was disabled");
        }

        self.events.waiting(self.options.timeout);
        let received = listener.wait(self.options.timeout).await;
        listener.close().await;

        let callback = received.map_err(|e| match e {
            WaitError::TimedOut => LinkError::LinkTimedOut(self.options.timeout),
            WaitError::Malformed(reason) => LinkError::InvalidCallbackPayload(reason),
            WaitError::Closed => LinkError::InvalidCallbackPayload(
                "listener closed before a callback arrived".to_string(),
            ),
        })?;
        self.advance(LinkState::CallbackReceived);
        self.events.callback_received();

        match callback {
            CallbackResult::Cancelled { reason } => {
                info!(%reason, "link cancelled from the consent page");
                self.advance(LinkState::Cancelled);
                Ok(LinkOutcome::Cancelled { reason })
            }
            CallbackResult::Success { public_token, .. } => {
                self.advance(LinkState::Exchanging);
                self.events.exchanging();
                let connection = self
                    .api
                    .exchange_public_token(&public_token)
                    .await
                    .map_err(LinkError::ExchangeFailed)?;
                self.advance(LinkState::Exchanged);
                info!(item = %connection.id, "bank connection created");
                Ok(LinkOutcome::Exchanged(connection))
            }
        }
    }
}

/// Run a complete link flow
///
/// # Errors
/// Returns the [`LinkError`] of the step that failed. A user cancellation is
/// not an error; it comes back as [`LinkOutcome::Cancelled`].
pub async fn run_link_flow(
    api: &dyn LinkApi,
    browser: &dyn BrowserLauncher,
    events: &dyn LinkEvents,
    options: &LinkOptions,
) -> Result<LinkOutcome, LinkError> {
    LinkFlow::new(api, browser, events, options).run().await
}
