//! checkclaw - Command-line interface for the checkclaw personal finance API
//!
//! Connect bank accounts through a browser consent flow, then query balances,
//! transactions and spending from the terminal.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use checkclaw_cli::api::ApiClient;
use checkclaw_cli::commands::{
    self, auth, billing, completions, config_file_ops,
    export::{ExportArgs, ExportFormat},
    link::LinkArgs,
    transactions::TransactionQuery,
    unlink::UnlinkArgs,
    OutputFormat,
};
use checkclaw_cli::config::Settings;
use checkclaw_cli::config_file::ConfigFile;
use checkclaw_cli::credentials::{CredentialStore, Credentials};
use checkclaw_cli::errors::enhance_api_error;
use checkclaw_cli::utils::colors::init_colors;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "checkclaw",
    version,
    about = "Command-line interface for the checkclaw personal finance API"
)]
struct Cli {
    /// API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Output format
    #[arg(long, value_enum, global = true)]
    output: Option<OutputFormat>,

    /// Config profile to use instead of the active one
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account
    Signup,

    /// Log in with email and password, or an API key
    Login {
        /// API key to store instead of prompting for email and password
        #[arg(long)]
        key: Option<String>,
    },

    /// Forget stored credentials
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Connect a bank account through the browser
    Link {
        /// List connected banks instead of connecting one
        #[arg(long)]
        list: bool,

        /// Serve the consent page from the local listener
        #[arg(long)]
        local_page: bool,

        /// Seconds to wait for the browser
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the consent URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Local callback port (default: any free port)
        #[arg(long, default_value_t = 0)]
        port: u16,
    },

    /// Disconnect bank accounts
    Unlink {
        /// Item to disconnect (default: choose interactively)
        item_id: Option<String>,

        /// Disconnect every bank
        #[arg(long, conflicts_with = "item_id")]
        all: bool,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show account balances
    Accounts {
        /// Only show accounts of this type (checking, savings, credit...)
        #[arg(long = "type")]
        account_type: Option<String>,
    },

    /// Query transactions
    #[command(alias = "transactions")]
    Tx {
        /// Look back this many days
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Start date (YYYY-MM-DD), overrides --days
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD), default today
        #[arg(long)]
        to: Option<String>,

        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Search merchant names
        #[arg(long)]
        search: Option<String>,

        /// Filter by account id
        #[arg(long)]
        account: Option<String>,

        /// Minimum absolute amount
        #[arg(long)]
        min: Option<f64>,

        /// Maximum number of transactions
        #[arg(long)]
        limit: Option<u32>,

        /// Show recurring transactions instead
        #[arg(long)]
        recurring: bool,
    },

    /// Export transactions as CSV or JSON, or a spending summary
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        #[arg(long, default_value_t = 30)]
        days: u32,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "output-file")]
        output_file: Option<PathBuf>,

        /// Spending by category instead of raw transactions
        #[arg(long)]
        summary: bool,
    },

    /// Show plan and usage
    Billing {
        #[command(subcommand)]
        command: Option<BillingCommands>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum BillingCommands {
    /// Show invoice history
    Invoices,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Initialize a new config file with default profiles
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// List configuration values (of --profile or the active profile)
    List,

    /// Get a configuration value
    Get {
        /// api-url, link-url, link-timeout-secs or output-format
        key: String,
    },

    /// Set a configuration value
    Set {
        /// api-url, link-url, link-timeout-secs or output-format
        key: String,
        value: String,
    },

    /// Show config file path
    Path,

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommands {
    /// List all profiles
    List,

    /// Show the active profile
    Active,

    /// Switch the active profile
    Use { name: String },

    /// Create a profile
    Create {
        name: String,

        /// API base URL for the profile
        url: String,

        #[arg(long)]
        link_url: Option<String>,

        #[arg(long)]
        link_timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    init_colors(cli.no_color);

    let config_path = ConfigFile::config_file_path()?;
    let config_file = ConfigFile::load_from(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable config file");
        ConfigFile::new()
    });

    let output_format = match cli.output {
        Some(format) => format,
        None => Settings::resolve(cli.api_url.as_deref(), None, &config_file, None)
            .output_format
            .map(|f| f.parse())
            .transpose()?
            .unwrap_or_default(),
    };

    let result = execute_command(&cli, &config_file, &config_path, output_format).await;

    match result {
        Ok(output) => match output_format {
            OutputFormat::Human => println!("{output}"),
            OutputFormat::Json => {
                // Commands already render JSON in this mode; embed it as a value
                let data = serde_json::from_str::<serde_json::Value>(&output)
                    .unwrap_or(serde_json::Value::String(output));
                let json_output = serde_json::json!({
                    "success": true,
                    "data": data
                });
                println!("{}", serde_json::to_string_pretty(&json_output)?);
            }
        },
        Err(e) => {
            match output_format {
                OutputFormat::Human => eprintln!("Error: {e}"),
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "success": false,
                        "error": e.to_string()
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn execute_command(
    cli: &Cli,
    config_file: &ConfigFile,
    config_path: &Path,
    output_format: OutputFormat,
) -> Result<String> {
    match &cli.command {
        Commands::Config { command } => {
            return execute_config_command(command, config_path, cli.profile.as_deref());
        }
        Commands::Completions { shell } => {
            if std::io::stdout().is_terminal() {
                eprintln!("# Install with: {}", completions::install_hint(*shell));
            }
            return completions::execute(*shell, Cli::command());
        }
        _ => {}
    }

    let profile = match cli.profile.as_deref() {
        Some(name) => Some(
            config_file
                .get_profile(name)
                .with_context(|| format!("Profile '{name}' not found. See 'checkclaw config profile list'"))?,
        ),
        None => config_file.active_profile(),
    };
    let link_timeout = match &cli.command {
        Commands::Link { timeout, .. } => *timeout,
        _ => None,
    };
    let settings = Settings::resolve(cli.api_url.as_deref(), link_timeout, config_file, profile);
    debug!(api_url = %settings.api_url, "resolved settings");

    let store = CredentialStore::open_default()?;
    if matches!(cli.command, Commands::Logout) {
        return auth::logout(&store, output_format);
    }

    let credentials = store.load()?;
    let client = ApiClient::new(&settings.api_url, credentials)
        .map_err(|e| enhance_api_error(e.into(), &settings.api_url))?;

    let result = execute_api_command(cli, &client, &store, &settings, output_format).await;
    persist_session(&client, &store);
    result.map_err(|e| enhance_api_error(e, &settings.api_url))
}

async fn execute_api_command(
    cli: &Cli,
    client: &ApiClient,
    store: &CredentialStore,
    settings: &Settings,
    output_format: OutputFormat,
) -> Result<String> {
    match &cli.command {
        Commands::Signup => auth::signup(client, store, output_format).await,
        Commands::Login { key } => auth::login(client, store, key.as_deref(), output_format).await,
        Commands::Whoami => auth::whoami(client, output_format).await,
        Commands::Link {
            list,
            local_page,
            no_browser,
            port,
            ..
        } => {
            let args = LinkArgs {
                list: *list,
                consent_url: settings.link_url.clone(),
                timeout: settings.link_timeout,
                local_page: *local_page,
                no_browser: *no_browser,
                port: *port,
            };
            commands::execute_link(client, &args, output_format).await
        }
        Commands::Unlink { item_id, all, yes } => {
            let args = UnlinkArgs {
                item_id: item_id.clone(),
                all: *all,
                yes: *yes,
            };
            commands::execute_unlink(client, &args, output_format).await
        }
        Commands::Accounts { account_type } => {
            commands::execute_accounts(client, account_type.as_deref(), output_format).await
        }
        Commands::Tx {
            days,
            from,
            to,
            category,
            search,
            account,
            min,
            limit,
            recurring,
        } => {
            let query = TransactionQuery {
                days: *days,
                from: from.clone(),
                to: to.clone(),
                category: category.clone(),
                search: search.clone(),
                account: account.clone(),
                min: *min,
                limit: *limit,
                recurring: *recurring,
            };
            commands::execute_transactions(client, &query, output_format).await
        }
        Commands::Export {
            format,
            days,
            from,
            to,
            output_file,
            summary,
        } => {
            let args = ExportArgs {
                format: *format,
                days: *days,
                from: from.clone(),
                to: to.clone(),
                output: output_file.clone(),
                summary: *summary,
            };
            commands::execute_export(client, &args, output_format).await
        }
        Commands::Billing { command } => match command {
            None => billing::plan(client, output_format).await,
            Some(BillingCommands::Invoices) => billing::invoices(client, output_format).await,
        },
        Commands::Logout | Commands::Config { .. } | Commands::Completions { .. } => {
            anyhow::bail!("command does not use the API")
        }
    }
}

/// Save a session cookie the API handed out, unless an API key is stored
fn persist_session(client: &ApiClient, store: &CredentialStore) {
    let Some(cookie) = client.take_captured_session() else {
        return;
    };
    match store.load() {
        Ok(Some(Credentials::ApiKey(_))) => {
            debug!("keeping stored api key over session cookie");
        }
        Ok(_) => {
            if let Err(e) = store.save(&Credentials::Session(cookie)) {
                warn!(error = %e, "could not save session");
            }
        }
        Err(e) => warn!(error = %e, "could not read stored credentials"),
    }
}

fn execute_config_command(
    command: &ConfigCommands,
    config_path: &Path,
    profile: Option<&str>,
) -> Result<String> {
    match command {
        ConfigCommands::Init { force } => config_file_ops::init(config_path, *force),
        ConfigCommands::List => config_file_ops::list(config_path, profile),
        ConfigCommands::Get { key } => config_file_ops::get(config_path, key, profile),
        ConfigCommands::Set { key, value } => config_file_ops::set(config_path, key, value, profile),
        ConfigCommands::Path => Ok(config_file_ops::path(config_path)),
        ConfigCommands::Profile { command } => match command {
            ProfileCommands::List => config_file_ops::list_profiles(config_path),
            ProfileCommands::Active => config_file_ops::show_active_profile(config_path),
            ProfileCommands::Use { name } => config_file_ops::use_profile(config_path, name),
            ProfileCommands::Create {
                name,
                url,
                link_url,
                link_timeout_secs,
            } => config_file_ops::create_profile(
                config_path,
                name,
                url,
                link_url.as_deref(),
                *link_timeout_secs,
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "checkclaw", "tx", "--days", "7", "--output", "json", "--profile", "staging",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.profile.as_deref(), Some("staging"));
        assert!(matches!(cli.command, Commands::Tx { days: 7, .. }));
    }

    #[test]
    fn test_unlink_all_conflicts_with_item() {
        assert!(Cli::try_parse_from(["checkclaw", "unlink", "item_1", "--all"]).is_err());
        assert!(Cli::try_parse_from(["checkclaw", "unlink", "--all", "-y"]).is_ok());
    }

    #[test]
    fn test_profile_create_takes_url_positionally() {
        let cli = Cli::try_parse_from([
            "checkclaw", "config", "profile", "create", "dev", "http://localhost:3000",
            "--link-timeout-secs", "60",
        ])
        .unwrap();
        let Commands::Config {
            command: ConfigCommands::Profile {
                command: ProfileCommands::Create { url, link_timeout_secs, .. },
            },
        } = cli.command
        else {
            panic!("expected config profile create");
        };
        assert_eq!(url, "http://localhost:3000");
        assert_eq!(link_timeout_secs, Some(60));
    }
}
