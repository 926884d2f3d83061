//! Command implementations for the checkclaw CLI
//!
//! Each command returns its rendered output as a `String`; `main` prints it and
//! wraps it for `--output json`.

pub mod accounts;
pub mod auth;
pub mod billing;
pub mod completions;
pub mod config_file_ops;
pub mod export;
pub mod link;
pub mod transactions;
pub mod unlink;

pub use accounts::execute as execute_accounts;
pub use export::execute as execute_export;
pub use link::execute as execute_link;
pub use transactions::execute as execute_transactions;
pub use unlink::execute as execute_unlink;

/// How command output is rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!("Invalid output format: {s}")),
        }
    }
}

/// Pretty JSON for `--output json`
///
/// # Errors
/// Returns an error if serialization fails
pub fn to_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
