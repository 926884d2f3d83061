//! `checkclaw billing` and `checkclaw billing invoices`

use anyhow::Result;
use std::fmt::Write;

use crate::api::ApiClient;
use crate::commands::{to_json, OutputFormat};
use crate::models::{BillingPlan, InvoicesResponse};
use crate::utils::colors::Theme;
use crate::utils::formatting::{capitalize, format_currency_plain, Align, Cell, Table};

/// `-1` from the API means the plan has no cap
#[must_use]
pub fn format_limit(limit: i64) -> String {
    if limit < 0 {
        "unlimited".to_string()
    } else {
        limit.to_string()
    }
}

fn cycle_suffix(cycle: &str) -> &str {
    match cycle {
        "monthly" => "mo",
        "yearly" | "annual" => "yr",
        other => other,
    }
}

/// Show the subscription plan and usage against its limits
///
/// # Errors
/// Returns an error if the API request fails
pub async fn plan(client: &ApiClient, output_format: OutputFormat) -> Result<String> {
    client.require_auth()?;
    let plan: BillingPlan = client.get("/billing/plan", &[]).await?;

    if output_format.is_json() {
        return to_json(&serde_json::json!({
            "plan": plan.plan,
            "price": plan.price,
            "currency": plan.currency,
            "billing_cycle": plan.billing_cycle,
            "current_period_end": plan.current_period_end,
            "limits": {
                "bank_connections": plan.limits.bank_connections,
                "monthly_queries": plan.limits.monthly_queries,
            },
            "usage": {
                "bank_connections": plan.usage.bank_connections,
                "monthly_queries": plan.usage.monthly_queries,
            },
        }));
    }

    let price = format_currency_plain(plan.price);
    let mut output = String::new();
    writeln!(
        &mut output,
        "{} {} ({price}/{})",
        Theme::header("Plan:"),
        Theme::highlight(&capitalize(&plan.plan)),
        cycle_suffix(&plan.billing_cycle)
    )
    .unwrap();
    writeln!(
        &mut output,
        "{} {}",
        Theme::header("Period ends:"),
        plan.current_period_end
    )
    .unwrap();
    writeln!(&mut output).unwrap();
    writeln!(&mut output, "{}", Theme::header("Usage:")).unwrap();
    writeln!(
        &mut output,
        "  Bank connections   {} / {}",
        plan.usage.bank_connections,
        format_limit(plan.limits.bank_connections)
    )
    .unwrap();
    writeln!(
        &mut output,
        "  API queries        {} / {}",
        plan.usage.monthly_queries,
        format_limit(plan.limits.monthly_queries)
    )
    .unwrap();
    writeln!(&mut output).unwrap();
    write!(
        &mut output,
        "{}",
        Theme::dim(&format!(
            "Next invoice: {price} on {}",
            plan.current_period_end
        ))
    )
    .unwrap();
    Ok(output)
}

/// Show invoice history
///
/// # Errors
/// Returns an error if the API request fails
pub async fn invoices(client: &ApiClient, output_format: OutputFormat) -> Result<String> {
    client.require_auth()?;
    let response: InvoicesResponse = client.get("/billing/invoices", &[]).await?;

    if output_format.is_json() {
        let invoices: Vec<serde_json::Value> = response
            .invoices
            .iter()
            .map(|inv| {
                serde_json::json!({
                    "id": inv.id,
                    "date": inv.date,
                    "amount": inv.amount,
                    "status": inv.status,
                    "description": inv.description,
                })
            })
            .collect();
        return to_json(&serde_json::json!({ "invoices": invoices }));
    }

    if response.invoices.is_empty() {
        return Ok(Theme::dim("No invoices yet.").to_string());
    }

    let mut table = Table::new(&[
        ("Date", Align::Left),
        ("Amount", Align::Right),
        ("Status", Align::Left),
        ("Description", Align::Left),
    ]);
    for invoice in &response.invoices {
        let status = if invoice.status == "paid" {
            Cell::styled(invoice.status.as_str(), Theme::success)
        } else {
            Cell::styled(invoice.status.as_str(), Theme::warning)
        };
        table.add_row(vec![
            invoice.date.as_str().into(),
            format_currency_plain(invoice.amount).into(),
            status,
            invoice.description.as_deref().unwrap_or("-").into(),
        ]);
    }
    Ok(table.render().trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_format_limit() {
        assert_eq!(format_limit(-1), "unlimited");
        assert_eq!(format_limit(5), "5");
        assert_eq!(cycle_suffix("monthly"), "mo");
        assert_eq!(cycle_suffix("weekly"), "weekly");
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/billing/plan",
                get(|| async {
                    Json(json!({
                        "plan": "pro",
                        "price": 12.0,
                        "currency": "USD",
                        "billing_cycle": "monthly",
                        "current_period_end": "2024-04-01",
                        "limits": {"bank_connections": 10, "monthly_queries": -1},
                        "usage": {"bank_connections": 3, "monthly_queries": 412}
                    }))
                }),
            )
            .route(
                "/billing/invoices",
                get(|| async {
                    Json(json!({
                        "invoices": [
                            {"id": "in_1", "date": "2024-03-01", "amount": 12.0,
                             "status": "paid", "description": "Pro plan"},
                            {"id": "in_2", "date": "2024-04-01", "amount": 12.0,
                             "status": "open"}
                        ]
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_plan_summary() {
        colored::control::set_override(false);
        let client = test_support::api(router()).await;
        let output = plan(&client, OutputFormat::Human).await.unwrap();

        assert!(output.starts_with("Plan: Pro ($12.00/mo)"));
        assert!(output.contains("Bank connections   3 / 10"));
        assert!(output.contains("API queries        412 / unlimited"));
        assert!(output.ends_with("Next invoice: $12.00 on 2024-04-01"));
    }

    #[tokio::test]
    async fn test_invoice_table() {
        colored::control::set_override(false);
        let client = test_support::api(router()).await;
        let output = invoices(&client, OutputFormat::Human).await.unwrap();
        assert!(output.contains("Pro plan"));
        assert!(output.contains("open"));
        assert_eq!(output.lines().count(), 4);
    }
}
