//! Shareholder register models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a shareholder record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Shareholder {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub shares: i64,

    /// Capital contributed, in cents
    pub contribution_cents: i64,
    pub joined_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/shareholders`.
#[derive(Debug, Deserialize)]
pub struct CreateShareholderRequest {
    pub full_name: String,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub shares: i64,
    #[serde(default)]
    pub contribution_cents: i64,
    pub joined_at: Option<DateTime<Utc>>,
}

impl CreateShareholderRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("full_name is required".to_string());
        }
        if self.shares < 0 {
            return Err("shares cannot be negative".to_string());
        }
        if self.contribution_cents < 0 {
            return Err("contribution_cents cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Response body for `GET /api/v1/reports/portfolio`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PortfolioSummary {
    pub pending_loans: i64,
    pub approved_loans: i64,
    pub rejected_loans: i64,
    pub disbursed_loans: i64,

    /// Principal paid out on disbursed loans
    pub disbursed_principal_cents: i64,

    /// Interest expected on disbursed loans
    pub expected_interest_cents: i64,
    pub repaid_cents: i64,
    pub outstanding_cents: i64,
    pub shareholder_capital_cents: i64,
}
