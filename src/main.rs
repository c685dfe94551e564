use anyhow::Result;
use std::sync::Arc;

use expense_session::api::ExpenseApi;
use expense_session::auth::{CredentialStore, FileStorage, SessionManager, SessionState, SessionStatus};
use expense_session::config::{self, Command, Config};
use expense_session::http_client::SessionHttpClient;
use expense_session::models::{ExpenseQuery, NewExpense, Period};
use expense_session::utils::{self, format_currency, Direction};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(
        api_url = %config.api_url,
        transport = ?config.transport,
        credential_file = %config.credential_file.display(),
        "Configuration loaded"
    );

    let storage = Arc::new(FileStorage::new(config.credential_file.clone()));
    let store = CredentialStore::new(storage);
    let http = Arc::new(SessionHttpClient::new(
        &config.api_url,
        config.transport,
        store,
        Arc::new(SessionStatus::new()),
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let session = SessionManager::new(http.clone());
    let api = ExpenseApi::new(http);

    match command {
        Command::Login { passcode } => {
            let passcode = match passcode {
                Some(passcode) => passcode,
                None => config::prompt_passcode()?,
            };
            session.login(&passcode).await?;
            println!("Logged in");
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out");
        }
        Command::Status => {
            let state = session.check_auth().await;
            match state {
                SessionState::Authenticated => {
                    println!("Authenticated");
                    if let Some(expires_at) = session.http().store().expires_at() {
                        if let Some(at) = chrono::DateTime::from_timestamp_millis(expires_at) {
                            println!("  Token expires: {}", at.with_timezone(&chrono::Local));
                        }
                    }
                }
                _ => println!("Not logged in"),
            }
        }
        Command::Expenses(filter) => {
            let query = ExpenseQuery {
                limit: filter.limit,
                offset: filter.offset,
                spent_by: filter.spent_by,
                category_id: filter.category_id,
                start_date: filter.start_date,
                end_date: filter.end_date,
            };
            let page = api.list_expenses(&query).await?;
            for expense in &page.expenses {
                println!(
                    "{:>6}  {:<11}  {:<6}  {:>12}  {} / {}  {}{}",
                    expense.id,
                    utils::format_expense_date(&expense.expense_date),
                    expense.spent_by,
                    format_currency(expense.amount),
                    expense.parent_category_name,
                    expense.category_name,
                    expense.payment_method,
                    expense
                        .description
                        .as_deref()
                        .map(|d| format!("  {}", d))
                        .unwrap_or_default(),
                );
            }
            let pagination = page.pagination;
            println!(
                "Showing {}-{} of {}{}",
                if page.expenses.is_empty() { 0 } else { pagination.offset + 1 },
                pagination.offset as usize + page.expenses.len(),
                pagination.total,
                if pagination.has_more { " (more available)" } else { "" }
            );
        }
        Command::Add(add) => {
            let created = api
                .create_expense(&NewExpense {
                    spent_by: add.spent_by,
                    category_id: add.category_id,
                    payment_method_id: add.payment_method_id,
                    amount: add.amount,
                    expense_date: add.date,
                    description: add.description.filter(|d| !d.trim().is_empty()),
                })
                .await?;
            println!(
                "Created expense #{} ({} on {})",
                created.id,
                format_currency(created.amount),
                utils::format_expense_date(&created.expense_date)
            );
        }
        Command::Categories { main, sub } => {
            if main {
                for category in api.main_categories().await? {
                    println!("{:>4}  {}", category.id, category.name);
                }
            } else {
                let categories = match sub {
                    Some(parent_id) => api.subcategories(parent_id).await?,
                    None => api.all_categories().await?,
                };
                for category in categories {
                    match category.parent_name {
                        Some(parent) => println!("{:>4}  {} / {}", category.id, parent, category.name),
                        None => println!("{:>4}  {}", category.id, category.name),
                    }
                }
            }
        }
        Command::PaymentMethods => {
            for method in api.payment_methods().await? {
                println!("{:>4}  {}", method.id, method.name);
            }
        }
        Command::Summary {
            start_date,
            end_date,
        } => {
            let summary = api.dashboard_summary(&start_date, &end_date).await?;
            println!(
                "{} to {}: {}",
                summary.start_date,
                summary.end_date,
                format_currency(summary.total_spent)
            );
            for row in &summary.category_breakdown {
                println!(
                    "  {:<24} {:>12}  {:>4} items  {}%",
                    row.main_category_name,
                    format_currency(row.total),
                    row.count,
                    row.percentage
                );
            }
        }
        Command::Overview {
            period,
            date,
            prev,
            next,
        } => {
            let mut date = date.unwrap_or_else(|| match period {
                Period::Monthly => utils::current_month(),
                Period::Yearly => utils::current_year(),
            });
            if prev {
                date = utils::navigate_period(period, &date, Direction::Prev)?;
            } else if next {
                date = utils::navigate_period(period, &date, Direction::Next)?;
            }

            let overview = api.dashboard_overview(period, &date).await?;
            let total = &overview.cards.total_expenses;
            println!(
                "{} ({} to {})",
                utils::format_period_display(overview.period, &overview.date),
                utils::format_expense_date(&overview.date_range.start),
                utils::format_expense_date(&overview.date_range.end)
            );
            println!(
                "  Total:        {} ({:+.1}% vs previous {})",
                format_currency(total.current),
                total.change_percentage,
                format_currency(total.previous)
            );
            if let Some(top) = &overview.cards.top_category {
                println!("  Top category: {} {}", top.category_name, format_currency(top.total));
            }
            if let Some(top) = &overview.cards.top_spender {
                println!("  Top spender:  {} {}", top.spent_by, format_currency(top.total));
            }
            for rank in &overview.category_ranking {
                println!(
                    "  {:>2}. {:<24} {:>12}  {:.1}%",
                    rank.rank,
                    rank.main_category_name,
                    format_currency(rank.total),
                    rank.percentage
                );
            }
        }
    }

    Ok(())
}
