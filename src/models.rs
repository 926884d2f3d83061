//! Wire types returned by the checkclaw API
//!
//! The API is not entirely consistent about field casing across endpoints, so
//! a few fields accept both `snake_case` and `camelCase` spellings.

use serde::{Deserialize, Serialize};

/// Current user, from `GET /auth/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub plan: Option<String>,
}

/// Response of `POST /auth/login` and `POST /auth/signup`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub api_key: String,
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub available: Option<f64>,
    pub current: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: String,
    pub balance: Balance,
}

impl Account {
    /// Case-insensitive match on either type or subtype
    #[must_use]
    pub fn matches_type(&self, wanted: &str) -> bool {
        self.kind.eq_ignore_ascii_case(wanted) || self.subtype.eq_ignore_ascii_case(wanted)
    }

    /// Subtype when present, otherwise type
    #[must_use]
    pub fn display_type(&self) -> &str {
        if self.subtype.is_empty() {
            &self.kind
        } else {
            &self.subtype
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// A single posted transaction. Negative amounts are outflows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl Transaction {
    /// Merchant name, falling back to the raw transaction name
    #[must_use]
    pub fn payee(&self) -> Option<&str> {
        self.merchant.as_deref().or(self.name.as_deref())
    }

    /// First (top-level) category
    #[must_use]
    pub fn top_category(&self) -> Option<&str> {
        self.category
            .as_ref()
            .and_then(|c| c.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionsResponse {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurringTransaction {
    pub id: String,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default, alias = "lastDate")]
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecurringResponse {
    #[serde(default)]
    pub recurring: Vec<RecurringTransaction>,
}

/// Plan quota; `-1` means unlimited
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlanLimits {
    pub bank_connections: i64,
    pub monthly_queries: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlanUsage {
    pub bank_connections: i64,
    pub monthly_queries: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingPlan {
    pub plan: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub billing_cycle: String,
    pub current_period_end: String,
    pub limits: PlanLimits,
    pub usage: PlanUsage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicesResponse {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

/// A bank connection owned by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    #[serde(default, alias = "itemId", alias = "item_id")]
    pub id: String,
    #[serde(
        default,
        alias = "institutionName",
        alias = "institution_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub institution: Option<String>,
    #[serde(default, alias = "institutionId", skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Connection {
    /// Best available human name for the institution
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.institution
            .as_deref()
            .or(self.institution_id.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                if self.id.is_empty() {
                    "Unknown"
                } else {
                    self.id.as_str()
                }
            })
    }

    #[must_use]
    pub fn status_or_default(&self) -> &str {
        self.status.as_deref().unwrap_or("active")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionsResponse {
    #[serde(default)]
    pub items: Vec<Connection>,
}

/// `POST /link/exchange` answers either with the bare connection or wrapped
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExchangeResponse {
    Wrapped { item: Connection },
    Flat(Connection),
}

impl ExchangeResponse {
    #[must_use]
    pub fn into_connection(self) -> Connection {
        match self {
            Self::Wrapped { item } | Self::Flat(item) => item,
        }
    }
}

/// `POST /link/token`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkTokenResponse {
    #[serde(default, alias = "linkToken")]
    pub link_token: Option<String>,
    #[serde(default, alias = "linkUrl")]
    pub link_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_accepts_camel_case() {
        let item: Connection = serde_json::from_str(
            r#"{"itemId":"it_1","institutionName":"Chase","createdAt":"2024-01-02"}"#,
        )
        .expect("parse");
        assert_eq!(item.id, "it_1");
        assert_eq!(item.display_name(), "Chase");
        assert_eq!(item.created_at.as_deref(), Some("2024-01-02"));
        assert_eq!(item.status_or_default(), "active");
    }

    #[test]
    fn test_connection_display_name_fallbacks() {
        let by_id = Connection {
            id: "it_9".to_string(),
            institution_id: Some("ins_3".to_string()),
            ..Connection::default()
        };
        assert_eq!(by_id.display_name(), "ins_3");

        let bare = Connection {
            id: "it_9".to_string(),
            ..Connection::default()
        };
        assert_eq!(bare.display_name(), "it_9");
        assert_eq!(Connection::default().display_name(), "Unknown");
    }

    #[test]
    fn test_exchange_response_shapes() {
        let wrapped: ExchangeResponse =
            serde_json::from_str(r#"{"item":{"id":"it_1","institution":"Ally","accounts":2}}"#)
                .expect("parse");
        let flat: ExchangeResponse =
            serde_json::from_str(r#"{"id":"it_1","institution":"Ally","accounts":2}"#)
                .expect("parse");
        assert_eq!(wrapped.into_connection(), flat.into_connection());
    }

    #[test]
    fn test_link_token_response_aliases() {
        let snake: LinkTokenResponse =
            serde_json::from_str(r#"{"link_token":"link-abc"}"#).expect("parse");
        let camel: LinkTokenResponse =
            serde_json::from_str(r#"{"linkToken":"link-abc","linkUrl":"https://x/link"}"#)
                .expect("parse");
        assert_eq!(snake.link_token.as_deref(), Some("link-abc"));
        assert_eq!(camel.link_token.as_deref(), Some("link-abc"));
        assert_eq!(camel.link_url.as_deref(), Some("https://x/link"));
    }

    #[test]
    fn test_account_type_matching() {
        let account: Account = serde_json::from_str(
            r#"{"id":"a","name":"Everyday","type":"depository","subtype":"checking",
                "balance":{"available":10.5,"current":null}}"#,
        )
        .expect("parse");
        assert!(account.matches_type("CHECKING"));
        assert!(account.matches_type("depository"));
        assert!(!account.matches_type("credit"));
        assert_eq!(account.display_type(), "checking");
        assert_eq!(account.balance.currency, "USD");
    }

    #[test]
    fn test_transaction_payee_and_category() {
        let tx = Transaction {
            id: "t".to_string(),
            date: "2024-03-01".to_string(),
            merchant: None,
            name: Some("POS 1234".to_string()),
            amount: -4.5,
            category: Some(vec!["Food".to_string(), "Coffee".to_string()]),
            account_id: None,
        };
        assert_eq!(tx.payee(), Some("POS 1234"));
        assert_eq!(tx.top_category(), Some("Food"));
    }
}
