//! `checkclaw export`

use anyhow::{Context, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use tracing::info;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::errors::parse_optional_date_arg;
use crate::models::{Transaction, TransactionsResponse};
use crate::utils::colors::Theme;
use crate::utils::dates::{format_date, resolve_range, DateRange};
use crate::utils::formatting::{bar_chart, format_currency_plain, plural, truncate};

/// Upper bound on transactions fetched for one export
pub const EXPORT_LIMIT: u32 = 1000;

const CATEGORY_WIDTH: usize = 20;
const BAR_WIDTH: usize = 20;
const RULE_WIDTH: usize = 50;
const UNCATEGORIZED: &str = "Other";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub format: ExportFormat,
    pub days: u32,
    pub from: Option<String>,
    pub to: Option<String>,
    pub output: Option<PathBuf>,
    pub summary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub amount: f64,
    /// Share of total spending, `0..=1`
    pub share: f64,
}

/// Spending grouped by top-level category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub from: String,
    pub to: String,
    /// Largest first; equal amounts ordered by name
    pub categories: Vec<CategorySpend>,
    pub total_spent: f64,
    pub total_income: f64,
    pub net: f64,
}

impl SpendingSummary {
    #[must_use]
    pub fn from_transactions(transactions: &[Transaction], range: DateRange) -> Self {
        let mut by_category: HashMap<&str, f64> = HashMap::new();
        let mut total_spent = 0.0;
        let mut total_income = 0.0;

        for tx in transactions {
            if tx.amount < 0.0 {
                let category = tx
                    .top_category()
                    .filter(|c| !c.is_empty())
                    .unwrap_or(UNCATEGORIZED);
                *by_category.entry(category).or_default() += tx.amount.abs();
                total_spent += tx.amount.abs();
            } else {
                total_income += tx.amount;
            }
        }

        let mut categories: Vec<CategorySpend> = by_category
            .into_iter()
            .map(|(category, amount)| CategorySpend {
                category: category.to_string(),
                amount,
                share: if total_spent > 0.0 {
                    amount / total_spent
                } else {
                    0.0
                },
            })
            .collect();
        categories.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });

        Self {
            from: format_date(range.from),
            to: format_date(range.to),
            categories,
            total_spent,
            total_income,
            net: total_income - total_spent,
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();
        let rule = "─".repeat(RULE_WIDTH);

        writeln!(
            &mut output,
            "{}",
            Theme::header(&format!("Spending Summary ({} -> {})", self.from, self.to))
        )
        .unwrap();
        writeln!(&mut output, "{rule}").unwrap();

        for spend in &self.categories {
            #[allow(clippy::cast_possible_truncation)]
            let percent = (spend.share * 100.0).round() as i64;
            writeln!(
                &mut output,
                " {:<width$} {:>10}  {} {percent}%",
                truncate(&spend.category, CATEGORY_WIDTH),
                format_currency_plain(spend.amount),
                Theme::bar(&bar_chart(spend.share, BAR_WIDTH)),
                width = CATEGORY_WIDTH,
            )
            .unwrap();
        }

        writeln!(&mut output, "{rule}").unwrap();
        writeln!(
            &mut output,
            " {:<width$} {}",
            "Total Spending",
            Theme::spending(&format!("{:>10}", format_currency_plain(self.total_spent))),
            width = CATEGORY_WIDTH,
        )
        .unwrap();
        writeln!(
            &mut output,
            " {:<width$} {}",
            "Total Income",
            Theme::income(&format!("{:>10}", format_currency_plain(self.total_income))),
            width = CATEGORY_WIDTH,
        )
        .unwrap();
        let sign = if self.net >= 0.0 { '+' } else { '-' };
        let net = format!("{sign}{}", format_currency_plain(self.net));
        let net = format!("{net:>10}");
        write!(
            &mut output,
            " {:<width$} {}",
            "Net",
            Theme::amount(&net, self.net),
            width = CATEGORY_WIDTH,
        )
        .unwrap();
        output
    }
}

#[derive(Serialize)]
struct CsvRecord<'a> {
    date: &'a str,
    merchant: &'a str,
    amount: f64,
    category: String,
    account_id: &'a str,
}

/// Transactions as CSV with a `date,merchant,amount,category,account_id` header
///
/// # Errors
/// Returns an error if a record cannot be written
pub fn to_csv(transactions: &[Transaction]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for tx in transactions {
        writer.serialize(CsvRecord {
            date: &tx.date,
            merchant: tx.payee().unwrap_or_default(),
            amount: tx.amount,
            category: tx
                .category
                .as_ref()
                .map(|c| c.join(" > "))
                .unwrap_or_default(),
            account_id: tx.account_id.as_deref().unwrap_or_default(),
        })?;
    }
    if transactions.is_empty() {
        writer.write_record(["date", "merchant", "amount", "category", "account_id"])?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// Export transactions as CSV or JSON, or summarize spending by category
///
/// # Errors
/// Returns an error for invalid dates, a failed request or an unwritable file
pub async fn execute(
    client: &ApiClient,
    args: &ExportArgs,
    output_format: OutputFormat,
) -> Result<String> {
    client.require_auth()?;
    let range = resolve_range(
        args.days,
        parse_optional_date_arg("--from", args.from.as_deref())?,
        parse_optional_date_arg("--to", args.to.as_deref())?,
    )?;

    let mut query = range.query().to_vec();
    query.push(("limit", EXPORT_LIMIT.to_string()));
    let response: TransactionsResponse = client.get("/transactions", &query).await?;
    let transactions = response.transactions;

    if args.summary {
        let summary = SpendingSummary::from_transactions(&transactions, range);
        return if output_format.is_json() {
            to_json(&summary)
        } else if transactions.is_empty() {
            Ok(Theme::dim("No transactions found.").to_string())
        } else {
            Ok(summary.render())
        };
    }

    if transactions.is_empty() && args.output.is_none() && !output_format.is_json() {
        return Ok(Theme::dim("No transactions found.").to_string());
    }

    let body = match args.format {
        ExportFormat::Csv => to_csv(&transactions)?,
        ExportFormat::Json => to_json(&transactions)?,
    };

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &body)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), count = transactions.len(), "export written");
            if output_format.is_json() {
                to_json(&serde_json::json!({
                    "path": path.display().to_string(),
                    "count": transactions.len(),
                }))
            } else {
                Ok(format!(
                    "{} Exported {} to {}",
                    Theme::success("✓"),
                    plural(transactions.len(), "transaction"),
                    Theme::value(&path.display().to_string())
                ))
            }
        }
        None => Ok(body.trim_end().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::utils::dates::parse_date;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn tx(amount: f64, category: Option<&[&str]>) -> Transaction {
        Transaction {
            id: format!("t{amount}"),
            date: "2024-03-01".to_string(),
            merchant: Some("Trader Joe's".to_string()),
            name: None,
            amount,
            category: category.map(|c| c.iter().map(|s| (*s).to_string()).collect()),
            account_id: Some("acc_1".to_string()),
        }
    }

    fn range() -> DateRange {
        DateRange {
            from: parse_date("2024-03-01").unwrap(),
            to: parse_date("2024-03-31").unwrap(),
        }
    }

    #[test]
    fn test_summary_groups_and_sorts() {
        let transactions = vec![
            tx(-60.0, Some(&["Food", "Groceries"])),
            tx(-40.0, Some(&["Food", "Restaurants"])),
            tx(-50.0, Some(&["Travel"])),
            tx(-50.0, None),
            tx(3000.0, Some(&["Transfer"])),
        ];
        let summary = SpendingSummary::from_transactions(&transactions, range());

        let order: Vec<&str> = summary
            .categories
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(order, vec!["Food", "Other", "Travel"]);
        assert!((summary.categories[0].amount - 100.0).abs() < f64::EPSILON);
        assert!((summary.categories[0].share - 0.5).abs() < f64::EPSILON);
        assert!((summary.total_spent - 200.0).abs() < f64::EPSILON);
        assert!((summary.total_income - 3000.0).abs() < f64::EPSILON);
        assert!((summary.net - 2800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_without_spending() {
        let summary = SpendingSummary::from_transactions(&[tx(10.0, None)], range());
        assert!(summary.categories.is_empty());
        assert!((summary.net - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_render() {
        colored::control::set_override(false);
        let transactions = vec![tx(-75.0, Some(&["Shopping"])), tx(-25.0, Some(&["Food"]))];
        let rendered = SpendingSummary::from_transactions(&transactions, range()).render();

        assert!(rendered.starts_with("Spending Summary (2024-03-01 -> 2024-03-31)"));
        assert!(rendered.contains(&format!(" {:<20}     $75.00  {} 75%", "Shopping", "█".repeat(15))));
        assert!(rendered.contains("Total Spending"));
        assert!(rendered.ends_with("   -$100.00"));
    }

    #[test]
    fn test_csv_columns_and_category_path() {
        let csv = to_csv(&[tx(-12.5, Some(&["Food", "Coffee"]))]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("date,merchant,amount,category,account_id"));
        assert_eq!(lines.next(), Some("2024-03-01,Trader Joe's,-12.5,Food > Coffee,acc_1"));
        assert_eq!(to_csv(&[]).unwrap().trim(), "date,merchant,amount,category,account_id");
    }

    fn router() -> Router {
        Router::new().route(
            "/transactions",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("limit").map(String::as_str), Some("1000"));
                Json(json!({
                    "transactions": [
                        {"id": "1", "date": "2024-03-02", "merchant": "Lyft",
                         "amount": -18.0, "category": ["Travel", "Taxi"], "account_id": "acc_9"}
                    ]
                }))
            }),
        )
    }

    #[tokio::test]
    async fn test_export_to_file() {
        colored::control::set_override(false);
        let client = test_support::api(router()).await;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("march.json");
        let args = ExportArgs {
            format: ExportFormat::Json,
            days: 30,
            from: None,
            to: None,
            output: Some(path.clone()),
            summary: false,
        };

        let output = execute(&client, &args, OutputFormat::Human).await.unwrap();
        assert!(output.contains("Exported 1 transaction to"));

        let written: Vec<Transaction> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].merchant.as_deref(), Some("Lyft"));
    }

    #[tokio::test]
    async fn test_export_csv_to_stdout() {
        let client = test_support::api(router()).await;
        let args = ExportArgs {
            format: ExportFormat::Csv,
            days: 7,
            from: None,
            to: None,
            output: None,
            summary: false,
        };
        let output = execute(&client, &args, OutputFormat::Human).await.unwrap();
        assert_eq!(
            output,
            "date,merchant,amount,category,account_id\n2024-03-02,Lyft,-18.0,Travel > Taxi,acc_9"
        );
    }
}
