//! `checkclaw tx`

use anyhow::Result;
use std::fmt::Write;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::errors::parse_optional_date_arg;
use crate::models::{RecurringResponse, Transaction, TransactionsResponse};
use crate::utils::colors::Theme;
use crate::utils::dates::resolve_range;
use crate::utils::formatting::{format_currency, plural, truncate, Align, Cell, Table};

/// Merchant names longer than this are cut in the table
const MERCHANT_WIDTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub days: u32,
    pub from: Option<String>,
    pub to: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub account: Option<String>,
    pub min: Option<f64>,
    pub limit: Option<u32>,
    pub recurring: bool,
}

impl TransactionQuery {
    /// Query string for `GET /transactions`; unset filters are left out
    ///
    /// # Errors
    /// Returns an error for invalid `--from`/`--to` dates
    pub fn to_query(&self) -> Result<Vec<(&'static str, String)>> {
        let range = resolve_range(
            self.days,
            parse_optional_date_arg("--from", self.from.as_deref())?,
            parse_optional_date_arg("--to", self.to.as_deref())?,
        )?;

        let mut query = range.query().to_vec();
        let optional = [
            ("category", self.category.clone()),
            ("search", self.search.clone()),
            ("account", self.account.clone()),
            ("min", self.min.map(|m| m.to_string())),
            ("limit", self.limit.map(|l| l.to_string())),
        ];
        query.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v))),
        );
        Ok(query)
    }
}

/// Money out and money in. Both are returned as positive numbers.
#[must_use]
pub fn totals(transactions: &[Transaction]) -> (f64, f64) {
    transactions
        .iter()
        .fold((0.0, 0.0), |(spent, income), tx| {
            if tx.amount < 0.0 {
                (spent - tx.amount, income)
            } else {
                (spent, income + tx.amount)
            }
        })
}

/// Query transaction history, or recurring transactions with `recurring`
///
/// # Errors
/// Returns an error for invalid dates or a failed API request
pub async fn execute(
    client: &ApiClient,
    query: &TransactionQuery,
    output_format: OutputFormat,
) -> Result<String> {
    client.require_auth()?;
    if query.recurring {
        return recurring(client, output_format).await;
    }

    let params = query.to_query()?;
    let response: TransactionsResponse = client.get("/transactions", &params).await?;
    let (spent, income) = totals(&response.transactions);

    if output_format.is_json() {
        return to_json(&serde_json::json!({
            "transactions": response.transactions,
            "count": response.transactions.len(),
            "total": response.total,
            "has_more": response.has_more,
            "total_spent": spent,
            "total_income": income,
        }));
    }

    if response.transactions.is_empty() {
        return Ok(Theme::dim("No transactions found.").to_string());
    }

    let mut table = Table::new(&[
        ("Date", Align::Left),
        ("Merchant", Align::Left),
        ("Amount", Align::Right),
        ("Category", Align::Left),
    ]);
    for tx in &response.transactions {
        table.add_row(vec![
            tx.date.as_str().into(),
            truncate(tx.payee().unwrap_or("-"), MERCHANT_WIDTH).into(),
            Cell::amount(tx.amount),
            tx.top_category().unwrap_or("-").into(),
        ]);
    }

    let mut output = table.render();
    write!(
        &mut output,
        " {} | Total spent: {} | Total income: {}",
        plural(response.transactions.len(), "transaction"),
        Theme::spending(&format_currency(-spent)),
        Theme::income(&format_currency(income)),
    )
    .unwrap();
    if response.has_more {
        write!(
            &mut output,
            "\n\n{}",
            Theme::dim("More results available. Use --limit to see more.")
        )
        .unwrap();
    }
    Ok(output)
}

async fn recurring(client: &ApiClient, output_format: OutputFormat) -> Result<String> {
    let response: RecurringResponse = client.get("/transactions/recurring", &[]).await?;

    if output_format.is_json() {
        let items: Vec<serde_json::Value> = response
            .recurring
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "merchant": r.merchant.as_deref().or(r.name.as_deref()),
                    "amount": r.amount,
                    "frequency": r.frequency,
                    "category": r.category,
                    "last_date": r.last_date,
                })
            })
            .collect();
        return to_json(&serde_json::json!({ "recurring": items }));
    }

    if response.recurring.is_empty() {
        return Ok(Theme::dim("No recurring transactions detected.").to_string());
    }

    let mut table = Table::new(&[
        ("Merchant", Align::Left),
        ("Amount", Align::Right),
        ("Frequency", Align::Left),
        ("Category", Align::Left),
        ("Last Date", Align::Left),
    ]);
    for r in &response.recurring {
        let merchant = r.merchant.as_deref().or(r.name.as_deref()).unwrap_or("-");
        let category = r
            .category
            .as_ref()
            .and_then(|c| c.first())
            .map_or("-", String::as_str);
        table.add_row(vec![
            truncate(merchant, MERCHANT_WIDTH).into(),
            Cell::amount(r.amount),
            r.frequency.as_deref().unwrap_or("-").into(),
            category.into(),
            r.last_date.as_deref().unwrap_or("-").into(),
        ]);
    }

    let mut output = table.render();
    write!(
        &mut output,
        "{}",
        Theme::dim(&format!(
            " {} detected",
            plural(response.recurring.len(), "recurring transaction")
        ))
    )
    .unwrap();
    Ok(output)
}
