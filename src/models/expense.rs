use serde::{Deserialize, Serialize};

// ==================================================================================================
// Response Models
// ==================================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    /// "SJ", "YS" or "Shared"
    pub spent_by: String,
    pub category_id: i64,
    pub category_name: String,
    pub parent_category_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_cat_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_cat_color: Option<String>,
    pub payment_method_id: i64,
    pub payment_method: String,
    pub amount: f64,
    pub currency: String,
    pub expense_date: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpensesPage {
    pub expenses: Vec<Expense>,
    pub pagination: Pagination,
}

// ==================================================================================================
// Request Models
// ==================================================================================================

/// Body of `POST /api/expenses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub spent_by: String,
    pub category_id: i64,
    pub payment_method_id: i64,
    pub amount: f64,
    /// `YYYY-MM-DD`
    pub expense_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Filters for `GET /api/expenses`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseQuery {
    pub limit: u32,
    pub offset: u32,
    pub spent_by: Option<String>,
    pub category_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl Default for ExpenseQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            spent_by: None,
            category_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

impl ExpenseQuery {
    /// Query-string pairs in the order the server documents them.
    /// Empty filters are left out.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(spent_by) = self.spent_by.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("spent_by", spent_by.to_string()));
        }
        if let Some(category_id) = self.category_id.filter(|id| *id != 0) {
            pairs.push(("category_id", category_id.to_string()));
        }
        if let Some(start) = self.start_date.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("start_date", start.to_string()));
        }
        if let Some(end) = self.end_date.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("end_date", end.to_string()));
        }
        pairs
    }
}
