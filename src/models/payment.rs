//! Loan repayment models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a repayment reached the lender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Mpesa,
    Cash,
    Bank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mpesa => "mpesa",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Bank => "bank",
        }
    }
}

/// Represents a payment record from the database.
///
/// Payments sum toward the referenced loan's outstanding balance.
/// `reference` (M-Pesa receipt, bank slip number) is unique when present.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,

    /// Staff member who captured it; `None` for M-Pesa callbacks
    pub recorded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/payments`.
///
/// ```json
/// {
///   "loan_id": "550e8400-...",
///   "amount_cents": 250000,
///   "method": "cash",
///   "reference": "RCPT-0042"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub loan_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,

    /// Defaults to the time of capture
    pub paid_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub loan_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub recorded_by: Option<String>,
}
