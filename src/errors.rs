//! Enhanced error handling with actionable recovery suggestions
//!
//! Commands return `anyhow` errors. The helpers here recognise the typed
//! errors underneath ([`ApiError`], [`LinkError`]) and rewrite them into
//! messages that tell the user what to do next.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use reqwest::StatusCode;

use crate::api::ApiError;
use crate::link::LinkError;
use crate::utils::dates::parse_date;

/// Error for commands that need a logged-in user
#[must_use]
pub fn not_authenticated_error() -> anyhow::Error {
    anyhow!(
        "Not logged in.\n\n\
         To fix this:\n  \
         • Create an account: checkclaw signup\n  \
         • Log in with email and password: checkclaw login\n  \
         • Or use an API key: checkclaw login --key <API_KEY>"
    )
}

/// Wrap API errors with recovery suggestions
///
/// Errors that are not [`ApiError`]s pass through unchanged.
#[must_use]
pub fn enhance_api_error(error: anyhow::Error, api_url: &str) -> anyhow::Error {
    let api_error = match error.downcast::<ApiError>() {
        Ok(api_error) => api_error,
        Err(other) => return other,
    };

    match &api_error {
        ApiError::NotAuthenticated => not_authenticated_error(),

        ApiError::InvalidUrl { url, reason } => anyhow!(
            "Invalid API URL '{url}': {reason}\n\n\
             To fix this:\n  \
             • Pass a full URL: --api-url https://api.checkclaw.com\n  \
             • Or update your profile: checkclaw config set api-url <URL>"
        ),

        ApiError::Transport { .. } => anyhow!(
            "{api_error}\n\n\
             Connection Troubleshooting:\n  \
             • Check that the API is reachable: {api_url}\n  \
             • Try a different endpoint with --api-url or CHECKCLAW_API_URL\n  \
             • Check your internet connection"
        ),

        ApiError::Decode { .. } => anyhow!(
            "{api_error}\n\n\
             The API answered with data this version of checkclaw does not understand.\n  \
             • Check that --api-url points at a checkclaw API: {api_url}\n  \
             • Upgrade checkclaw to the latest release"
        ),

        ApiError::Status {
            status, message, ..
        } => enhance_status_error(*status, message),
    }
}

fn enhance_status_error(status: StatusCode, message: &str) -> anyhow::Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
            "Authentication rejected: {message}\n\n\
             Your session may have expired or the API key was revoked.\n  \
             • Log in again: checkclaw login\n  \
             • Or use a fresh API key: checkclaw login --key <API_KEY>"
        ),
        StatusCode::PAYMENT_REQUIRED => anyhow!(
            "Plan limit reached: {message}\n\n\
             • Check your usage: checkclaw billing\n  \
             • Disconnect unused banks: checkclaw unlink"
        ),
        StatusCode::NOT_FOUND => anyhow!(
            "Not found: {message}\n\n\
             • List your connected banks: checkclaw link --list"
        ),
        StatusCode::TOO_MANY_REQUESTS => anyhow!(
            "Rate limited: {message}\n\n\
             Wait a minute and run the command again."
        ),
        s if s.is_server_error() => anyhow!(
            "The checkclaw API had a problem ({s}): {message}\n\n\
             This is usually temporary. Try again in a few moments."
        ),
        s => anyhow!("Request failed ({s}): {message}"),
    }
}

/// Wrap link flow failures with next steps
///
/// A token or exchange failure caused by an [`ApiError`] gets the same advice
/// as any other API call.
#[must_use]
pub fn enhance_link_error(error: LinkError, api_url: &str) -> anyhow::Error {
    match error {
        LinkError::TokenRequestFailed(source) if source.is::<ApiError>() => anyhow!(
            "Could not create a link token: {}",
            enhance_api_error(source, api_url)
        ),
        LinkError::ExchangeFailed(source) if source.is::<ApiError>() => anyhow!(
            "Could not save the bank connection: {}",
            enhance_api_error(source, api_url)
        ),
        other => link_next_steps(&other),
    }
}

fn link_next_steps(error: &LinkError) -> anyhow::Error {
    match error {
        LinkError::TokenRequestFailed(_) => anyhow!(
            "{error}\n\n\
             • Check that you are logged in: checkclaw whoami\n  \
             • Check your plan's bank connection limit: checkclaw billing"
        ),
        LinkError::ListenerStartFailed(_) => anyhow!(
            "{error}\n\n\
             checkclaw needs a free port on 127.0.0.1 to receive the result from your browser.\n  \
             • Let the OS pick a port by omitting --port\n  \
             • Or choose another one: checkclaw link --port <PORT>"
        ),
        LinkError::InvalidCallbackPayload(_) => anyhow!(
            "{error}\n\n\
             Run 'checkclaw link' again to start over with a fresh link token."
        ),
        LinkError::LinkTimedOut(_) => anyhow!(
            "{error}\n\n\
             The consent page was not completed in time.\n  \
             • Run 'checkclaw link' again\n  \
             • Allow more time: checkclaw link --timeout <SECONDS>\n  \
             • If no browser opened, use --no-browser and open the printed URL yourself"
        ),
        LinkError::ExchangeFailed(_) => anyhow!(
            "{error}\n\n\
             Your bank authorized the connection but it could not be saved.\n  \
             • Check 'checkclaw link --list' to see whether it was created\n  \
             • Otherwise run 'checkclaw link' again"
        ),
    }
}

/// Parse a date flag value with a message naming the flag
///
/// # Errors
/// Returns an error when `value` is not `YYYY-MM-DD`
pub fn parse_date_arg(flag: &str, value: &str) -> Result<NaiveDate> {
    parse_date(value).map_err(|e| {
        anyhow!(
            "{e}\n\n\
             {flag} expects a calendar date, for example: {flag} 2024-01-31"
        )
    })
}

/// Parse an optional date flag
///
/// # Errors
/// See [`parse_date_arg`]
pub fn parse_optional_date_arg(flag: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value.map(|v| parse_date_arg(flag, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const API: &str = "https://api.checkclaw.com";

    fn status_error(status: StatusCode, message: &str) -> anyhow::Error {
        anyhow::Error::new(ApiError::Status {
            path: "/x".to_string(),
            status,
            message: message.to_string(),
        })
    }

    #[test]
    fn test_not_authenticated_mentions_login() {
        let message = enhance_api_error(
            anyhow::Error::new(ApiError::NotAuthenticated),
            "https://api.checkclaw.com",
        )
        .to_string();
        assert!(message.contains("Not logged in"));
        assert!(message.contains("checkclaw login --key"));
    }

    #[test]
    fn test_unauthorized_suggests_login_again() {
        let message = enhance_api_error(
            status_error(StatusCode::UNAUTHORIZED, "invalid api key"),
            "https://api.checkclaw.com",
        )
        .to_string();
        assert!(message.contains("invalid api key"));
        assert!(message.contains("checkclaw login"));
    }

    #[test]
    fn test_payment_required_points_at_billing() {
        let message = enhance_api_error(
            status_error(StatusCode::PAYMENT_REQUIRED, "connection limit"),
            "https://api.checkclaw.com",
        )
        .to_string();
        assert!(message.contains("Plan limit"));
        assert!(message.contains("checkclaw billing"));
    }

    #[test]
    fn test_server_error_is_temporary() {
        let message = enhance_api_error(
            status_error(StatusCode::BAD_GATEWAY, "upstream"),
            "https://api.checkclaw.com",
        )
        .to_string();
        assert!(message.contains("502"));
        assert!(message.contains("Try again"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let message =
            enhance_api_error(anyhow!("disk full"), "https://api.checkclaw.com").to_string();
        assert_eq!(message, "disk full");
    }

    #[test]
    fn test_link_timeout_suggests_longer_timeout() {
        let message =
            enhance_link_error(LinkError::LinkTimedOut(Duration::from_secs(120)), API).to_string();
        assert!(message.contains("120 seconds"));
        assert!(message.contains("--timeout"));
    }

    #[test]
    fn test_listener_failure_suggests_port() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let message = enhance_link_error(LinkError::ListenerStartFailed(io), API).to_string();
        assert!(message.contains("127.0.0.1"));
        assert!(message.contains("--port"));
    }

    #[test]
    fn test_link_token_rejection_gets_api_advice() {
        let cause = status_error(StatusCode::UNAUTHORIZED, "session expired");
        let message = enhance_link_error(LinkError::TokenRequestFailed(cause), API).to_string();
        assert!(message.starts_with("Could not create a link token"));
        assert!(message.contains("session expired"));
        assert!(message.contains("checkclaw login"));

        let message =
            enhance_link_error(LinkError::ExchangeFailed(anyhow!("no connection id")), API)
                .to_string();
        assert!(message.contains("no connection id"));
        assert!(message.contains("checkclaw link --list"));
    }

    #[test]
    fn test_parse_date_arg_names_flag() {
        assert_eq!(
            parse_date_arg("--from", "2024-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        let message = parse_date_arg("--to", "yesterday").unwrap_err().to_string();
        assert!(message.contains("Invalid date: yesterday"));
        assert!(message.contains("--to 2024-01-31"));
        assert_eq!(parse_optional_date_arg("--from", None).unwrap(), None);
    }
}
