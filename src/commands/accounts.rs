//! `checkclaw accounts`

use anyhow::Result;
use std::fmt::Write;
use tracing::debug;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::models::{Account, AccountsResponse};
use crate::utils::colors::Theme;
use crate::utils::formatting::{format_currency_plain, plural, Align, Cell, Table};

/// List connected accounts with balances, optionally filtered by type or subtype
///
/// # Errors
/// Returns an error if the API request fails
pub async fn execute(
    client: &ApiClient,
    account_type: Option<&str>,
    output_format: OutputFormat,
) -> Result<String> {
    client.require_auth()?;
    let response: AccountsResponse = client.get("/accounts/balance", &[]).await?;
    let total = response.accounts.len();

    let accounts: Vec<Account> = response
        .accounts
        .into_iter()
        .filter(|a| account_type.is_none_or(|t| a.matches_type(t)))
        .collect();
    debug!(total, shown = accounts.len(), "accounts fetched");

    if output_format.is_json() {
        return to_json(&serde_json::json!({ "accounts": accounts }));
    }

    if total == 0 {
        return Ok(format!(
            "{}\n{}",
            Theme::dim("No accounts found."),
            Theme::dim("Run `checkclaw link` to connect a bank first.")
        ));
    }
    if accounts.is_empty() {
        return Ok(Theme::dim(&format!(
            "No {} accounts found.",
            account_type.unwrap_or_default()
        ))
        .to_string());
    }

    Ok(render(&accounts))
}

fn balance_cell(value: Option<f64>) -> Cell {
    value.map_or_else(|| Cell::from("-"), |v| Cell::from(format_currency_plain(v)))
}

fn render(accounts: &[Account]) -> String {
    let mut table = Table::new(&[
        ("Account", Align::Left),
        ("Type", Align::Left),
        ("Available", Align::Right),
        ("Current", Align::Right),
    ]);
    for account in accounts {
        table.add_row(vec![
            account.name.as_str().into(),
            account.display_type().into(),
            balance_cell(account.balance.available),
            balance_cell(account.balance.current),
        ]);
    }

    let mut output = table.render();
    write!(
        &mut output,
        "{}",
        Theme::dim(&format!(" {}", plural(accounts.len(), "account")))
    )
    .unwrap();
    output
}
