//! `checkclaw unlink`

use anyhow::{Context, Result};
use dialoguer::{Confirm, Select};
use std::fmt::Write;
use tracing::warn;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::models::{Connection, ConnectionsResponse};
use crate::utils::colors::Theme;
use crate::utils::formatting::plural;

#[derive(Debug, Clone, Default)]
pub struct UnlinkArgs {
    pub item_id: Option<String>,
    pub all: bool,
    pub yes: bool,
}

/// Result of disconnecting one or more items
#[derive(Debug, Default)]
pub struct DisconnectReport {
    pub disconnected: Vec<Connection>,
    pub failed: Vec<(Connection, String)>,
}

impl DisconnectReport {
    fn render(&self, output_format: OutputFormat) -> Result<String> {
        if output_format.is_json() {
            let failed: Vec<serde_json::Value> = self
                .failed
                .iter()
                .map(|(item, error)| serde_json::json!({ "id": item.id, "error": error }))
                .collect();
            return to_json(&serde_json::json!({
                "disconnected": self.disconnected.iter().map(|c| &c.id).collect::<Vec<_>>(),
                "failed": failed,
            }));
        }

        let mut output = String::new();
        for item in &self.disconnected {
            writeln!(
                &mut output,
                "{} Disconnected {}",
                Theme::success("✓"),
                Theme::highlight(item.display_name())
            )
            .unwrap();
        }
        for (item, error) in &self.failed {
            writeln!(
                &mut output,
                "{} Failed to disconnect {}: {error}",
                Theme::error("✗"),
                Theme::highlight(item.display_name())
            )
            .unwrap();
        }
        Ok(output.trim_end().to_string())
    }
}

/// `DELETE /link/{id}` for each item; one failure does not stop the rest
pub async fn disconnect(client: &ApiClient, items: Vec<Connection>) -> DisconnectReport {
    let mut report = DisconnectReport::default();
    for item in items {
        let path = format!("/link/{}", urlencoding::encode(&item.id));
        match client.delete(&path).await {
            Ok(()) => report.disconnected.push(item),
            Err(e) => {
                warn!(item = %item.id, error = %e, "disconnect failed");
                report.failed.push((item, e.to_string()));
            }
        }
    }
    report
}

fn item_label(item: &Connection) -> String {
    item.accounts.map_or_else(
        || item.display_name().to_string(),
        |n| format!("{} ({})", item.display_name(), plural(n as usize, "account")),
    )
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Pick what to disconnect: one named item, all items, or one chosen interactively
fn select_items(items: Vec<Connection>, args: &UnlinkArgs) -> Result<Option<Vec<Connection>>> {
    if args.all {
        let prompt = format!("Disconnect all {}?", plural(items.len(), "bank connection"));
        return Ok((args.yes || confirm(&prompt)?).then_some(items));
    }

    let item = if let Some(id) = &args.item_id {
        let known = items
            .iter()
            .map(|i| format!("{} ({})", i.id, i.display_name()))
            .collect::<Vec<_>>()
            .join("\n  ");
        items.into_iter().find(|i| &i.id == id).with_context(|| {
            format!("No bank connection with id '{id}'.\n\nConnected banks:\n  {known}")
        })?
    } else {
        let labels: Vec<String> = items.iter().map(item_label).collect();
        let index = Select::new()
            .with_prompt("Select a bank connection to disconnect")
            .items(&labels)
            .default(0)
            .interact()
            .context("Failed to read selection")?;
        items
            .into_iter()
            .nth(index)
            .context("Selected bank connection no longer exists")?
    };

    let prompt = format!("Disconnect {}?", item.display_name());
    Ok((args.yes || confirm(&prompt)?).then(|| vec![item]))
}

/// Disconnect bank connections
///
/// # Errors
/// Returns an error if listing fails, the item id is unknown, or every disconnect fails
pub async fn execute(
    client: &ApiClient,
    args: &UnlinkArgs,
    output_format: OutputFormat,
) -> Result<String> {
    client.require_auth()?;
    let response: ConnectionsResponse = client.get("/link/items", &[]).await?;

    if response.items.is_empty() {
        if output_format.is_json() {
            return to_json(&serde_json::json!({ "disconnected": [], "failed": [] }));
        }
        return Ok(Theme::dim("No bank connections to disconnect.").to_string());
    }

    let Some(chosen) = select_items(response.items, args)? else {
        return Ok(Theme::dim("Cancelled.").to_string());
    };

    let report = disconnect(client, chosen).await;
    if report.disconnected.is_empty() && !report.failed.is_empty() {
        anyhow::bail!("{}", report.render(OutputFormat::Human)?);
    }
    report.render(output_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{delete, get};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn router(deleted: Arc<Mutex<Vec<String>>>) -> Router {
        Router::new()
            .route(
                "/link/items",
                get(|| async {
                    Json(json!({ "items": [
                        {"id": "item_1", "institution": "Gingham Credit Union", "accounts": 2},
                        {"id": "item_2", "institution": "First Platypus Bank", "accounts": 1},
                        {"id": "item_locked", "institution": "Houndstooth Bank"}
                    ]}))
                }),
            )
            .route(
                "/link/:id",
                delete(move |Path(id): Path<String>| async move {
                    if id == "item_locked" {
                        return Err((StatusCode::CONFLICT, Json(json!({"error": "item is syncing"}))));
                    }
                    deleted.lock().unwrap().push(id);
                    Ok(StatusCode::NO_CONTENT)
                }),
            )
    }

    #[tokio::test]
    async fn test_all_with_yes_reports_partial_failure() {
        colored::control::set_override(false);
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let client = test_support::api(router(deleted.clone())).await;
        let args = UnlinkArgs {
            all: true,
            yes: true,
            ..UnlinkArgs::default()
        };

        let output = execute(&client, &args, OutputFormat::Human).await.unwrap();
        assert!(output.contains("✓ Disconnected Gingham Credit Union"));
        assert!(output.contains("✓ Disconnected First Platypus Bank"));
        assert!(output.contains("✗ Failed to disconnect Houndstooth Bank"));
        assert!(output.contains("item is syncing"));
        assert_eq!(*deleted.lock().unwrap(), vec!["item_1", "item_2"]);
    }

    #[tokio::test]
    async fn test_single_item_by_id() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let client = test_support::api(router(deleted.clone())).await;
        let args = UnlinkArgs {
            item_id: Some("item_2".to_string()),
            yes: true,
            ..UnlinkArgs::default()
        };

        let output = execute(&client, &args, OutputFormat::Json).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["disconnected"], json!(["item_2"]));
        assert_eq!(*deleted.lock().unwrap(), vec!["item_2"]);
    }

    #[tokio::test]
    async fn test_unknown_item_lists_known_ones() {
        let client = test_support::api(router(Arc::default())).await;
        let args = UnlinkArgs {
            item_id: Some("item_9".to_string()),
            yes: true,
            ..UnlinkArgs::default()
        };
        let message = execute(&client, &args, OutputFormat::Human)
            .await
            .unwrap_err()
            .to_string();
        assert!(message.contains("item_9"));
        assert!(message.contains("item_1 (Gingham Credit Union)"));
    }

    #[tokio::test]
    async fn test_every_failure_is_an_error() {
        let client = test_support::api(router(Arc::default())).await;
        let args = UnlinkArgs {
            item_id: Some("item_locked".to_string()),
            yes: true,
            ..UnlinkArgs::default()
        };
        let message = execute(&client, &args, OutputFormat::Json)
            .await
            .unwrap_err()
            .to_string();
        assert!(message.contains("Houndstooth Bank"));
    }

    #[tokio::test]
    async fn test_item_id_is_one_path_segment() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let recorded = deleted.clone();
        let router = Router::new().route(
            "/link/:id",
            delete(move |Path(id): Path<String>| async move {
                recorded.lock().unwrap().push(id);
                StatusCode::NO_CONTENT
            }),
        );
        let client = test_support::api(router).await;
        let item = Connection {
            id: "item 3/../billing".to_string(),
            ..Connection::default()
        };

        let report = disconnect(&client, vec![item]).await;
        assert_eq!(report.disconnected.len(), 1);
        assert!(report.failed.is_empty());
        assert_eq!(*deleted.lock().unwrap(), vec!["item 3/../billing"]);
    }

    #[test]
    fn test_item_label() {
        let item = Connection {
            id: "i".to_string(),
            institution: Some("Gingham".to_string()),
            accounts: Some(1),
            ..Connection::default()
        };
        assert_eq!(item_label(&item), "Gingham (1 account)");
    }
}
