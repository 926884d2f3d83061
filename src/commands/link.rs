//! `checkclaw link` and `checkclaw link --list`

use anyhow::Result;
use indicatif::ProgressBar;
use std::fmt::{Display, Write};
use std::io::{self, Write as _};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::errors::enhance_link_error;
use crate::link::{
    run_link_flow, BrowserLauncher, ConsentHost, LinkEvents, LinkOptions, LinkOutcome,
    SystemBrowser,
};
use crate::models::{Connection, ConnectionsResponse};
use crate::utils::colors::Theme;
use crate::utils::formatting::{plural, Align, Cell, Table};
use crate::utils::progress::{
    create_spinner, finish_progress_error, finish_progress_success, spinner_for,
};

#[derive(Debug, Clone)]
pub struct LinkArgs {
    pub list: bool,
    /// Consent page URL from config; the API may override it per token
    pub consent_url: String,
    pub timeout: Duration,
    pub local_page: bool,
    pub no_browser: bool,
    pub port: u16,
}

/// Connect a bank, or list connections with `list`
///
/// # Errors
/// Returns an error if the flow fails; a cancelled flow is not an error
pub async fn execute(
    client: &ApiClient,
    args: &LinkArgs,
    output_format: OutputFormat,
) -> Result<String> {
    client.require_auth()?;
    if args.list {
        return list(client, output_format).await;
    }

    let options = link_options(args)?;
    let events = ConsoleEvents::new(!output_format.is_json(), io::stderr());
    connect(client, &SystemBrowser, &events, &options, output_format).await
}

fn link_options(args: &LinkArgs) -> Result<LinkOptions> {
    let mut options = LinkOptions::new(&args.consent_url, args.timeout)?;
    options.consent_host = if args.local_page {
        ConsentHost::Local
    } else {
        ConsentHost::Remote
    };
    options.open_browser = !args.no_browser;
    options.callback_port = args.port;
    Ok(options)
}

async fn connect<W: io::Write + Send>(
    client: &ApiClient,
    browser: &dyn BrowserLauncher,
    events: &ConsoleEvents<W>,
    options: &LinkOptions,
    output_format: OutputFormat,
) -> Result<String> {
    let outcome = run_link_flow(client, browser, events, options).await;
    events.finish(outcome.is_ok());

    let outcome = outcome.map_err(|e| enhance_link_error(e, client.base_url()))?;
    render_outcome(&outcome, output_format)
}

fn render_outcome(outcome: &LinkOutcome, output_format: OutputFormat) -> Result<String> {
    match outcome {
        LinkOutcome::Exchanged(connection) => {
            if output_format.is_json() {
                return to_json(&serde_json::json!({
                    "status": "connected",
                    "connection": connection,
                }));
            }
            let accounts = connection
                .accounts
                .map(|n| format!(" ({})", plural(n as usize, "account")))
                .unwrap_or_default();
            Ok(format!(
                "{} Connected {}{accounts}",
                Theme::success("✓"),
                Theme::highlight(connection.display_name())
            ))
        }
        LinkOutcome::Cancelled { reason } => {
            if output_format.is_json() {
                return to_json(&serde_json::json!({
                    "status": "cancelled",
                    "reason": reason,
                }));
            }
            Ok(format!(
                "{} {}",
                Theme::warning("Link cancelled:"),
                Theme::dim(reason)
            ))
        }
    }
}

async fn list(client: &ApiClient, output_format: OutputFormat) -> Result<String> {
    let spinner = spinner_for("Fetching bank connections...", !output_format.is_json());
    let response: ConnectionsResponse = match client.get("/link/items", &[]).await {
        Ok(response) => {
            spinner.finish_and_clear();
            response
        }
        Err(e) => {
            finish_progress_error(&spinner, "Failed to fetch bank connections");
            return Err(e.into());
        }
    };

    if output_format.is_json() {
        return to_json(&serde_json::json!({ "items": response.items }));
    }
    if response.items.is_empty() {
        return Ok(format!(
            "{}\n{}",
            Theme::dim("No bank accounts connected."),
            Theme::dim("Run `checkclaw link` to connect one.")
        ));
    }
    Ok(render_connections(&response.items))
}

fn render_connections(items: &[Connection]) -> String {
    let mut table = Table::new(&[
        ("Institution", Align::Left),
        ("Item ID", Align::Left),
        ("Accounts", Align::Right),
        ("Status", Align::Left),
        ("Connected", Align::Left),
    ]);
    for item in items {
        let status = item.status_or_default();
        let status_cell = if status == "active" {
            Cell::styled(status, Theme::success)
        } else {
            Cell::styled(status, Theme::warning)
        };
        table.add_row(vec![
            item.display_name().into(),
            item.id.as_str().into(),
            item.accounts
                .map_or_else(|| "-".to_string(), |n| n.to_string())
                .into(),
            status_cell,
            item.created_at.as_deref().unwrap_or("-").into(),
        ]);
    }

    let mut output = table.render();
    write!(
        &mut output,
        "{}",
        Theme::dim(&format!(" {} connected", plural(items.len(), "bank")))
    )
    .unwrap();
    output
}

/// Reports link progress on stderr so stdout only carries the result.
/// The consent URL is written even when not interactive.
struct ConsoleEvents<W> {
    interactive: bool,
    spinner: Mutex<Option<ProgressBar>>,
    out: Mutex<W>,
}

impl<W: io::Write + Send> ConsoleEvents<W> {
    const fn new(interactive: bool, out: W) -> Self {
        Self {
            interactive,
            spinner: Mutex::new(None),
            out: Mutex::new(out),
        }
    }

    fn say(&self, line: impl Display) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
        }
    }

    fn replace_spinner(&self, next: Option<ProgressBar>) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.take() {
                previous.finish_and_clear();
            }
            *slot = next;
        }
    }

    fn finish(&self, succeeded: bool) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                if succeeded {
                    finish_progress_success(&spinner, "Done");
                } else {
                    finish_progress_error(&spinner, "Link failed");
                }
            }
        }
    }
}

impl<W: io::Write + Send> LinkEvents for ConsoleEvents<W> {
    fn token_created(&self) {
        if self.interactive {
            self.say(format_args!("{} Link token created", Theme::success("✓")));
        }
    }

    fn listening(&self, addr: SocketAddr) {
        debug!(%addr, "waiting for consent callback");
    }

    fn browser_opened(&self, url: &str) {
        if self.interactive {
            self.say(Theme::dim("Browser opened. Complete the bank connection there."));
        }
        // The opener can start and still fail, so the URL is always shown
        self.say(format_args!(
            "{} {}",
            Theme::dim("If nothing happened, open:"),
            Theme::highlight(url)
        ));
    }

    fn browser_unavailable(&self, url: &str, reason: &str) {
        debug!(%reason, "browser not opened");
        self.say("Open this URL in your browser to connect a bank:");
        self.say("");
        self.say(format_args!("  {}", Theme::highlight(url)));
        self.say("");
    }

    fn waiting(&self, timeout: Duration) {
        if self.interactive {
            self.replace_spinner(Some(create_spinner(&format!(
                "Waiting for the browser (up to {}s)...",
                timeout.as_secs()
            ))));
        }
    }

    fn callback_received(&self) {
        self.replace_spinner(None);
    }

    fn exchanging(&self) {
        if self.interactive {
            self.replace_spinner(Some(create_spinner("Saving bank connection...")));
        }
    }
}
