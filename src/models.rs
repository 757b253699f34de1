use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub category: String,
}

impl Expense {
    pub fn to_draft(&self) -> ExpenseDraft {
        ExpenseDraft {
            description: self.description.clone(),
            amount: self.amount,
            date: self.date,
            category: self.category.clone(),
        }
    }
}

/// Body of a create or update call; the server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Optional error body returned by the API on failure.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySpend {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub last_7_days: Vec<DailySpend>,
    pub by_category: Vec<CategorySpend>,
    pub total: f64,
}
