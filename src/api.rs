//! HTTP client for the checkclaw REST API

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::Credentials;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned {status}: {message}")]
    Status {
        path: String,
        status: StatusCode,
        message: String,
    },

    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status when the server answered with an error
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Thin JSON client bound to one API base URL and one set of credentials
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    captured_session: Mutex<Option<String>>,
}

impl ApiClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or the HTTP client cannot be built
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("checkclaw/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport {
                path: String::new(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            captured_session: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Fail early for commands that need a logged-in user
    ///
    /// # Errors
    /// Returns [`ApiError::NotAuthenticated`] when no credentials are configured
    pub fn require_auth(&self) -> Result<(), ApiError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::NotAuthenticated)
        }
    }

    /// Session cookie the server set during this process, if any
    pub fn take_captured_session(&self) -> Option<String> {
        self.captured_session
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }

    /// `GET path?query`
    ///
    /// # Errors
    /// Returns transport, status or decode errors
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, query, None::<&()>).await?;
        decode(path, &body)
    }

    /// `POST path` with a JSON body
    ///
    /// # Errors
    /// Returns transport, status or decode errors
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let text = self.send(Method::POST, path, &[], body).await?;
        decode(path, &text)
    }

    /// `DELETE path`
    ///
    /// # Errors
    /// Returns transport or status errors
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, &[], None::<&()>).await?;
        Ok(())
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "api request");

        let query: Vec<(&str, &str)> = query
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let mut request = self
            .http
            .request(method, &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .query(&query);

        match &self.credentials {
            Some(Credentials::ApiKey(key)) => {
                request = request.header(AUTHORIZATION, format!("Bearer {key}"));
            }
            Some(Credentials::Session(cookie)) => request = request.header(COOKIE, cookie),
            None => {}
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        self.capture_session(response.headers());

        let text = response.text().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;
        debug!(%status, bytes = text.len(), "api response");

        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                message: error_message(&text, status),
            });
        }
        Ok(text)
    }

    fn capture_session(&self, headers: &HeaderMap) {
        if let Some(cookies) = session_cookie(headers) {
            match self.captured_session.lock() {
                Ok(mut slot) => *slot = Some(cookies),
                Err(_) => warn!("session cookie dropped: lock poisoned"),
            }
        }
    }
}

/// Join the `name=value` part of every `Set-Cookie` header
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Pull a readable message out of an error body
fn error_message(body: &str, status: StatusCode) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
        });

    from_json
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && trimmed.len() <= 200).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
