use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Password;
use std::path::PathBuf;

use crate::auth::TransportMode;
use crate::models::Period;

/// Expense Session - command-line client for the expense tracker API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Expense API origin
    #[arg(short = 'u', long, env = "EXPENSE_API_URL", default_value = "http://localhost:8787")]
    pub api_url: String,

    /// How credentials are sent (bearer, cookie, both)
    #[arg(short = 't', long, env = "AUTH_TRANSPORT", default_value = "bearer")]
    pub transport: String,

    /// Credential file (defaults to the platform data directory)
    #[arg(short = 'c', long, env = "CREDENTIAL_FILE")]
    pub credential_file: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in with the household passcode
    Login {
        /// Passcode (prompted for when omitted)
        #[arg(short, long)]
        passcode: Option<String>,
    },

    /// End the session and forget stored credentials
    Logout,

    /// Check whether the stored session is still accepted
    Status,

    /// List expenses
    Expenses(ExpenseFilter),

    /// Record a new expense
    Add(AddExpense),

    /// List categories (all subcategories by default)
    Categories {
        /// Only main categories
        #[arg(long, conflicts_with = "sub")]
        main: bool,

        /// Subcategories of this main category
        #[arg(long)]
        sub: Option<i64>,
    },

    /// List payment methods
    PaymentMethods,

    /// Spending summary for a date range
    Summary {
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
    },

    /// Dashboard overview for a month or year
    Overview {
        #[arg(long, default_value = "monthly")]
        period: Period,

        /// YYYY-MM for monthly, YYYY for yearly (defaults to the current period)
        #[arg(long)]
        date: Option<String>,

        /// Step one period back from --date
        #[arg(long, conflicts_with = "next")]
        prev: bool,

        /// Step one period forward from --date
        #[arg(long)]
        next: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ExpenseFilter {
    #[arg(long, default_value = "50")]
    pub limit: u32,
    #[arg(long, default_value = "0")]
    pub offset: u32,
    #[arg(long)]
    pub spent_by: Option<String>,
    #[arg(long)]
    pub category_id: Option<i64>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct AddExpense {
    /// SJ, YS or Shared
    #[arg(long)]
    pub spent_by: String,
    #[arg(long)]
    pub category_id: i64,
    #[arg(long)]
    pub payment_method_id: i64,
    #[arg(long)]
    pub amount: f64,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub api_url: String,
    pub transport: TransportMode,

    // Credentials
    pub credential_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let credential_file = match args.credential_file {
            Some(path) => expand_tilde(&path),
            None => default_credential_file()
                .context("No data directory found (set CREDENTIAL_FILE or use -c)")?,
        };

        Ok(Config {
            api_url: args.api_url.trim_end_matches('/').to_string(),
            transport: parse_transport_mode(&args.transport),

            credential_file,

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!(
                "EXPENSE_API_URL must start with http:// or https://: {}",
                self.api_url
            );
        }

        if self.http_request_timeout == 0 || self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }

        Ok(())
    }
}

fn default_credential_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("expense-session").join("credentials.json"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse transport mode from string
fn parse_transport_mode(s: &str) -> TransportMode {
    match s.trim().to_lowercase().as_str() {
        "cookie" => TransportMode::Cookie,
        "both" => TransportMode::Both,
        _ => TransportMode::Bearer, // default
    }
}

// === Interactive ===

/// Ask for the passcode without echoing it
pub fn prompt_passcode() -> Result<String> {
    let passcode: String = Password::new()
        .with_prompt("Passcode")
        .interact()
        .context("Failed to read passcode")?;

    if passcode.trim().is_empty() {
        anyhow::bail!("Passcode cannot be empty");
    }

    Ok(passcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    fn config_with(api_url: &str, timeout: u64) -> Config {
        Config {
            api_url: api_url.to_string(),
            transport: TransportMode::Bearer,
            credential_file: PathBuf::from("/tmp/credentials.json"),
            http_connect_timeout: 10,
            http_request_timeout: timeout,
            log_level: "warn".to_string(),
        }
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with('~'));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_relative_path() {
        assert_eq!(expand_tilde("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn test_parse_transport_mode() {
        assert_eq!(parse_transport_mode("bearer"), TransportMode::Bearer);
        assert_eq!(parse_transport_mode("cookie"), TransportMode::Cookie);
        assert_eq!(parse_transport_mode("BOTH"), TransportMode::Both);
        assert_eq!(parse_transport_mode("session"), TransportMode::Bearer);
        assert_eq!(parse_transport_mode(""), TransportMode::Bearer);
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        let args = parse(&[
            "expense-session",
            "--api-url",
            "https://expenses.example.com/",
            "--transport",
            "cookie",
            "-c",
            "/tmp/creds.json",
            "--http-timeout",
            "5",
            "status",
        ]);
        assert_eq!(args.command, Command::Status);

        let config = Config::from_args(args).unwrap();
        assert_eq!(config.api_url, "https://expenses.example.com");
        assert_eq!(config.transport, TransportMode::Cookie);
        assert_eq!(config.credential_file, PathBuf::from("/tmp/creds.json"));
        assert_eq!(config.http_request_timeout, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_subcommands() {
        let args = parse(&["expense-session", "login", "--passcode", "1234"]);
        assert_eq!(
            args.command,
            Command::Login {
                passcode: Some("1234".to_string())
            }
        );

        let args = parse(&["expense-session", "categories", "--sub", "3"]);
        assert_eq!(
            args.command,
            Command::Categories {
                main: false,
                sub: Some(3)
            }
        );

        let args = parse(&["expense-session", "overview", "--period", "yearly", "--prev"]);
        match args.command {
            Command::Overview { period, prev, next, date } => {
                assert_eq!(period, Period::Yearly);
                assert!(prev);
                assert!(!next);
                assert!(date.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        assert!(CliArgs::try_parse_from(["expense-session", "categories", "--main", "--sub", "1"]).is_err());
        assert!(CliArgs::try_parse_from(["expense-session", "overview", "--prev", "--next"]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url_and_zero_timeout() {
        assert!(config_with("ftp://example.com", 30).validate().is_err());
        assert!(config_with("localhost:8787", 30).validate().is_err());
        assert!(config_with("http://localhost:8787", 0).validate().is_err());
        assert!(config_with("http://localhost:8787", 30).validate().is_ok());
    }
}
