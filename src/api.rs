// Typed expense API
// Thin wrappers over the session client that unwrap the `{success, data}` envelope

use anyhow::Context;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::ApiEnvelope;
use crate::error::{Result, SessionError};
use crate::http_client::SessionHttpClient;
use crate::models::{
    Category, DashboardOverview, DashboardSummary, Expense, ExpenseQuery, ExpensesPage,
    MainCategory, NewExpense, PaymentMethod, Period,
};

pub const EXPENSES_PATH: &str = "/api/expenses";
pub const PAYMENT_METHODS_PATH: &str = "/api/payment-methods";

/// Expense tracker endpoints used by the dashboard, tables and forms
#[derive(Clone)]
pub struct ExpenseApi {
    http: Arc<SessionHttpClient>,
}

impl ExpenseApi {
    pub fn new(http: Arc<SessionHttpClient>) -> Self {
        Self { http }
    }

    pub async fn list_expenses(&self, query: &ExpenseQuery) -> Result<ExpensesPage> {
        let path = with_query(EXPENSES_PATH, &query.to_pairs())?;
        self.get(&path).await
    }

    pub async fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let envelope: ApiEnvelope<Expense> = self.http.post_json(EXPENSES_PATH, expense).await?;
        let created = unwrap_envelope(EXPENSES_PATH, envelope)?;
        tracing::info!(id = created.id, amount = created.amount, "Expense created");
        Ok(created)
    }

    pub async fn main_categories(&self) -> Result<Vec<MainCategory>> {
        self.get("/api/categories/main").await
    }

    pub async fn subcategories(&self, parent_id: i64) -> Result<Vec<Category>> {
        self.get(&format!("/api/categories/sub/{}", parent_id)).await
    }

    pub async fn all_categories(&self) -> Result<Vec<Category>> {
        self.get("/api/categories/all").await
    }

    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        self.get(PAYMENT_METHODS_PATH).await
    }

    pub async fn dashboard_summary(&self, start_date: &str, end_date: &str) -> Result<DashboardSummary> {
        let path = with_query(
            "/api/dashboard/summary",
            &[
                ("start_date", start_date.to_string()),
                ("end_date", end_date.to_string()),
            ],
        )?;
        self.get(&path).await
    }

    pub async fn dashboard_overview(&self, period: Period, date: &str) -> Result<DashboardOverview> {
        let path = with_query(
            "/api/dashboard/overview",
            &[("period", period.to_string()), ("date", date.to_string())],
        )?;
        self.get(&path).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: ApiEnvelope<T> = self.http.get_json(path).await?;
        unwrap_envelope(path, envelope)
    }
}

fn unwrap_envelope<T>(path: &str, envelope: ApiEnvelope<T>) -> Result<T> {
    if !envelope.success {
        let message = envelope
            .error
            .or(envelope.message)
            .unwrap_or_else(|| "request was not successful".to_string());
        tracing::warn!(path = path, message = %message, "API reported failure");
        return Err(SessionError::Api {
            status: 200,
            message,
        });
    }
    envelope
        .data
        .ok_or_else(|| anyhow::anyhow!("Response from {} has no data", path).into())
}

/// Append URL-encoded query pairs to an API path
fn with_query(path: &str, pairs: &[(&str, String)]) -> Result<String> {
    // Only the path and query of this URL are used
    let url = Url::parse_with_params(&format!("http://localhost{}", path), pairs)
        .with_context(|| format!("Invalid API path: {}", path))?;
    Ok(match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_string(),
    })
}
