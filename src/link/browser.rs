use anyhow::{Context, Result};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, warn};

use super::BrowserLauncher;

/// Opens URLs with the platform's default handler
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let command = opener_command(url);
        debug!(?command, "opening browser");
        launch(command).with_context(|| format!("Failed to launch a browser for {url}"))?;
        Ok(())
    }
}

/// Start `command` detached from the terminal and reap it on a background
/// thread; an opener that exits non-zero is logged
fn launch(mut command: Command) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(std::thread::spawn(move || match child.wait() {
        Ok(status) => {
            if !status.success() {
                warn!(%status, "browser opener failed; open the printed URL by hand");
            }
            Some(status)
        }
        Err(e) => {
            warn!(error = %e, "could not wait for the browser opener");
            None
        }
    }))
}

#[cfg(target_os = "macos")]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("rundll32");
    cmd.args(["url.dll,FileProtocolHandler", url]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}
