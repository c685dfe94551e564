use serde::{Deserialize, Serialize};

/// Subcategory row (also returned by `/api/categories/all`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_category_id: Option<i64>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainCategory {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub color: String,
    /// Count of subcategories, sent as a number
    pub has_subcategories: i64,
}

impl MainCategory {
    pub fn has_subcategories(&self) -> bool {
        self.has_subcategories > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub name: String,
}
