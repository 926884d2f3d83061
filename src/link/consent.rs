//! Consent page addressing and the optional locally served page

use std::net::SocketAddr;
use url::Url;

use super::LinkToken;

/// URL of a hosted consent page that knows where to POST its result
///
/// The hosted page reads `token` to start the bank consent UI and `port` to
/// find the loopback callback listener.
#[must_use]
pub fn consent_url(base: &Url, token: LinkToken, callback: SocketAddr) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("token", &token.into_secret())
        .append_pair("port", &callback.port().to_string());
    url
}

/// URL of the page served by the listener itself
#[must_use]
pub fn local_page_url(callback: SocketAddr) -> String {
    format!("http://{callback}/")
}

/// Consent page served from loopback when no hosted page is used.
///
/// The page loads Plaid Link, and posts either the public token or the exit
/// reason to `/callback` on the same origin.
#[must_use]
pub fn render_consent_page(token: LinkToken) -> String {
    // A JSON string is a valid JS string literal; `</` is split so the token
    // can never close the script element.
    let token_literal = serde_json::Value::String(token.into_secret())
        .to_string()
        .replace("</", "<\\/");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>checkclaw - Connect Bank</title>
  <style>
    body {{ font-family: -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f5f5f5; }}
    .container {{ text-align: center; }}
    h1 {{ color: #333; }}
    p {{ color: #666; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>Connecting your bank...</h1>
    <p>Plaid Link will open automatically.</p>
  </div>
  <script src="https://cdn.plaid.com/link/v2/stable/link-initialize.js"></script>
  <script>
    function report(body, html) {{
      fetch('/callback', {{
        method: 'POST',
        headers: {{ 'Content-Type': 'application/json' }},
        body: JSON.stringify(body)
      }}).then(function () {{
        document.querySelector('.container').innerHTML = html;
      }});
    }}
    var handler = Plaid.create({{
      token: {token_literal},
      onSuccess: function (public_token, metadata) {{
        report({{ public_token: public_token, metadata: metadata }},
          '<h1>&#10004; Bank connected!</h1><p>You can close this window.</p>');
      }},
      onExit: function (err) {{
        report({{ error: err ? err.error_message : 'cancelled' }},
          '<h1>Connection cancelled</h1><p>You can close this window.</p>');
      }}
    }});
    handler.open();
  </script>
</body>
</html>
"#
    )
}
