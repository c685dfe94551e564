use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reporting period for the dashboard overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
    Yearly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" | "month" => Ok(Period::Monthly),
            "yearly" | "year" => Ok(Period::Yearly),
            other => Err(format!("unknown period '{}', expected monthly or yearly", other)),
        }
    }
}

// ==================================================================================================
// Summary
// ==================================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub main_category_id: i64,
    pub main_category_name: String,
    pub icon: String,
    pub color: String,
    pub total: f64,
    pub count: u64,
    /// Pre-formatted by the server, e.g. "42.5"
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub start_date: String,
    pub end_date: String,
    pub total_spent: f64,
    #[serde(default)]
    pub category_breakdown: Vec<CategoryBreakdown>,
}

// ==================================================================================================
// Overview
// ==================================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseCard {
    pub current: f64,
    pub previous: f64,
    pub change_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCard {
    pub category_id: i64,
    pub category_name: String,
    pub icon: String,
    pub color: String,
    pub total: f64,
    pub previous_total: f64,
    pub change_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpenderCard {
    pub spent_by: String,
    pub total: f64,
    pub previous_total: f64,
    pub change_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartCategory {
    pub category_id: i64,
    pub category_name: String,
    pub color: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPeriod {
    pub period: String,
    pub total: f64,
    #[serde(default)]
    pub categories: Vec<ChartCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRanking {
    pub rank: u32,
    pub main_category_id: i64,
    pub main_category_name: String,
    pub icon: String,
    pub color: String,
    pub total: f64,
    pub transaction_count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cards {
    pub total_expenses: ExpenseCard,
    #[serde(default)]
    pub top_category: Option<CategoryCard>,
    #[serde(default)]
    pub top_spender: Option<SpenderCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub period: Period,
    pub date: String,
    pub date_range: DateRange,
    pub cards: Cards,
    #[serde(default)]
    pub spending_chart: Vec<ChartPeriod>,
    #[serde(default)]
    pub category_ranking: Vec<CategoryRanking>,
}
