//! Loan data models, lifecycle rules, and API request/response types.
//!
//! This module defines:
//! - `Loan`: Database entity representing a loan
//! - `LoanStatus` / `LoanAction`: the lifecycle and the moves between states
//! - `LoanTerms`: principal, rate and term, with the flat interest rule
//! - Request and response bodies for the loan endpoints
//!
//! # Lifecycle
//!
//! ```text
//! pending ──approve──▶ approved ──disburse──▶ disbursed
//!    │
//!    └────reject────▶ rejected
//! ```

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest accepted interest rate (100%).
pub const MAX_INTEREST_RATE_BPS: i32 = 10_000;

/// Longest accepted repayment term (30 years).
pub const MAX_TERM_MONTHS: i32 = 360;

/// Status of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Submitted, awaiting a decision.
    Pending,
    /// Approved, not yet paid out.
    Approved,
    /// Declined. Terminal.
    Rejected,
    /// Paid out to the client; repayments accrue against it.
    Disbursed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Disbursed => "disbursed",
        }
    }

    /// Terms may only be amended before a decision is made.
    pub fn is_editable(&self) -> bool {
        matches!(self, LoanStatus::Pending)
    }

    /// Loans that never reached the client can be deleted.
    pub fn is_deletable(&self) -> bool {
        matches!(self, LoanStatus::Pending | LoanStatus::Rejected)
    }

    /// Apply a lifecycle action, returning the resulting status.
    pub fn apply(self, action: LoanAction) -> Result<LoanStatus, String> {
        match (self, action) {
            (LoanStatus::Pending, LoanAction::Approve) => Ok(LoanStatus::Approved),
            (LoanStatus::Pending, LoanAction::Reject) => Ok(LoanStatus::Rejected),
            (LoanStatus::Approved, LoanAction::Disburse) => Ok(LoanStatus::Disbursed),
            (from, action) => Err(format!(
                "Cannot {} a loan that is {}",
                action.as_str(),
                from
            )),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(LoanStatus::Pending),
            "approved" => Ok(LoanStatus::Approved),
            "rejected" => Ok(LoanStatus::Rejected),
            "disbursed" => Ok(LoanStatus::Disbursed),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// Decision applied to a loan through the actions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanAction {
    Approve,
    Reject,
    Disburse,
}

impl LoanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanAction::Approve => "approve",
            LoanAction::Reject => "reject",
            LoanAction::Disburse => "disburse",
        }
    }

    /// Notification kind written after the action succeeds.
    pub fn notification_kind(&self) -> &'static str {
        match self {
            LoanAction::Approve => "loan_approved",
            LoanAction::Reject => "loan_rejected",
            LoanAction::Disburse => "loan_disbursed",
        }
    }
}

/// Principal, rate and term of a loan.
///
/// Interest is flat: a single percentage of the principal, independent
/// of the term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub principal_cents: i64,
    pub interest_rate_bps: i32,
    pub term_months: i32,
}

impl LoanTerms {
    pub fn validate(&self) -> Result<(), String> {
        if self.principal_cents <= 0 {
            return Err("Principal must be positive".to_string());
        }
        if !(0..=MAX_INTEREST_RATE_BPS).contains(&self.interest_rate_bps) {
            return Err(format!(
                "Interest rate must be between 0 and {} basis points",
                MAX_INTEREST_RATE_BPS
            ));
        }
        if !(1..=MAX_TERM_MONTHS).contains(&self.term_months) {
            return Err(format!(
                "Term must be between 1 and {} months",
                MAX_TERM_MONTHS
            ));
        }
        if self.checked_total_payable_cents().is_none() {
            return Err("Principal is too large".to_string());
        }
        Ok(())
    }

    /// `principal × rate`, rounded half up to the nearest cent.
    pub fn interest_cents(&self) -> i64 {
        let scaled = self.principal_cents as i128 * self.interest_rate_bps as i128;
        ((scaled + 5_000) / 10_000) as i64
    }

    /// Principal plus interest, `None` if it does not fit in an `i64`.
    pub fn checked_total_payable_cents(&self) -> Option<i64> {
        self.principal_cents.checked_add(self.interest_cents())
    }

    /// Principal plus interest. Saturates for terms that fail `validate`.
    pub fn total_payable_cents(&self) -> i64 {
        self.principal_cents.saturating_add(self.interest_cents())
    }

    /// Repayment due date for a loan disbursed at `disbursed_at`.
    pub fn due_date(&self, disbursed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        disbursed_at.checked_add_months(Months::new(self.term_months as u32))
    }
}

/// Represents a loan record from the database.
///
/// # Database Table
///
/// Maps to `tables::LOANS`. `status` holds the text form of
/// [`LoanStatus`]; a CHECK constraint keeps it to the four values.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Loan {
    pub id: Uuid,
    pub client_id: Uuid,
    pub principal_cents: i64,
    pub interest_rate_bps: i32,
    pub interest_cents: i64,
    pub total_payable_cents: i64,
    pub term_months: i32,
    pub purpose: Option<String>,
    pub status: String,
    pub decision_notes: Option<String>,

    /// Staff member who captured the application
    pub created_by: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Parsed lifecycle status.
    pub fn lifecycle(&self) -> Result<LoanStatus, String> {
        self.status.parse()
    }

    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal_cents: self.principal_cents,
            interest_rate_bps: self.interest_rate_bps,
            term_months: self.term_months,
        }
    }
}

/// Loan row joined with the sum of its payments.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanWithBalance {
    #[sqlx(flatten)]
    pub loan: Loan,
    pub amount_paid_cents: i64,
}

/// Request body for `POST /api/v1/loans`.
///
/// ```json
/// {
///   "client_id": "550e8400-...",
///   "principal_cents": 5000000,
///   "interest_rate_bps": 1500,
///   "term_months": 6,
///   "purpose": "Stock for shop"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateLoanRequest {
    pub client_id: Uuid,
    pub principal_cents: i64,
    pub interest_rate_bps: i32,
    pub term_months: i32,
    pub purpose: Option<String>,
}

impl CreateLoanRequest {
    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal_cents: self.principal_cents,
            interest_rate_bps: self.interest_rate_bps,
            term_months: self.term_months,
        }
    }
}

/// Request body for `PUT /api/v1/loans/{id}`. Absent fields are kept.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLoanRequest {
    pub principal_cents: Option<i64>,
    pub interest_rate_bps: Option<i32>,
    pub term_months: Option<i32>,
    pub purpose: Option<String>,
}

impl UpdateLoanRequest {
    /// Overlay the provided fields on the current terms.
    pub fn merge_terms(&self, current: LoanTerms) -> LoanTerms {
        LoanTerms {
            principal_cents: self.principal_cents.unwrap_or(current.principal_cents),
            interest_rate_bps: self.interest_rate_bps.unwrap_or(current.interest_rate_bps),
            term_months: self.term_months.unwrap_or(current.term_months),
        }
    }
}

/// Request body for `POST /api/v1/loans/{id}/actions`.
#[derive(Debug, Deserialize)]
pub struct LoanActionRequest {
    pub action: LoanAction,
    pub notes: Option<String>,
}

/// Query string for `GET /api/v1/loans`.
#[derive(Debug, Default, Deserialize)]
pub struct LoanListQuery {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
}

/// Response body for loan endpoints.
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub principal_cents: i64,
    pub interest_rate_bps: i32,
    pub interest_cents: i64,
    pub total_payable_cents: i64,
    pub amount_paid_cents: i64,
    pub outstanding_cents: i64,
    pub term_months: i32,
    pub purpose: Option<String>,
    pub status: String,
    pub decision_notes: Option<String>,
    pub created_by: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outstanding balance, never negative.
pub fn outstanding_cents(total_payable_cents: i64, amount_paid_cents: i64) -> i64 {
    (total_payable_cents - amount_paid_cents).max(0)
}

impl From<LoanWithBalance> for LoanResponse {
    fn from(row: LoanWithBalance) -> Self {
        let loan = row.loan;
        Self {
            id: loan.id,
            client_id: loan.client_id,
            principal_cents: loan.principal_cents,
            interest_rate_bps: loan.interest_rate_bps,
            interest_cents: loan.interest_cents,
            total_payable_cents: loan.total_payable_cents,
            amount_paid_cents: row.amount_paid_cents,
            outstanding_cents: outstanding_cents(loan.total_payable_cents, row.amount_paid_cents),
            term_months: loan.term_months,
            purpose: loan.purpose,
            status: loan.status,
            decision_notes: loan.decision_notes,
            created_by: loan.created_by,
            approved_at: loan.approved_at,
            rejected_at: loan.rejected_at,
            disbursed_at: loan.disbursed_at,
            due_date: loan.due_date,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

/// A freshly created or updated loan has no payments yet.
impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        LoanWithBalance {
            loan,
            amount_paid_cents: 0,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn terms(principal_cents: i64, interest_rate_bps: i32, term_months: i32) -> LoanTerms {
        LoanTerms {
            principal_cents,
            interest_rate_bps,
            term_months,
        }
    }

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(
            LoanStatus::Pending.apply(LoanAction::Approve),
            Ok(LoanStatus::Approved)
        );
        assert_eq!(
            LoanStatus::Pending.apply(LoanAction::Reject),
            Ok(LoanStatus::Rejected)
        );
        assert_eq!(
            LoanStatus::Approved.apply(LoanAction::Disburse),
            Ok(LoanStatus::Disbursed)
        );
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(LoanStatus::Pending.apply(LoanAction::Disburse).is_err());
        assert!(LoanStatus::Approved.apply(LoanAction::Approve).is_err());
        assert!(LoanStatus::Approved.apply(LoanAction::Reject).is_err());
        assert!(LoanStatus::Rejected.apply(LoanAction::Approve).is_err());
        assert!(LoanStatus::Rejected.apply(LoanAction::Disburse).is_err());
        assert!(LoanStatus::Disbursed.apply(LoanAction::Reject).is_err());

        let err = LoanStatus::Rejected.apply(LoanAction::Disburse).unwrap_err();
        assert_eq!(err, "Cannot disburse a loan that is rejected");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("pending".parse::<LoanStatus>().unwrap(), LoanStatus::Pending);
        assert_eq!(
            "DISBURSED".parse::<LoanStatus>().unwrap(),
            LoanStatus::Disbursed
        );
        assert!("paid".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn test_editable_and_deletable() {
        assert!(LoanStatus::Pending.is_editable());
        assert!(!LoanStatus::Approved.is_editable());
        assert!(LoanStatus::Rejected.is_deletable());
        assert!(!LoanStatus::Disbursed.is_deletable());
    }

    #[test]
    fn test_action_deserializes_from_snake_case() {
        let req: LoanActionRequest =
            serde_json::from_str(r#"{"action": "disburse"}"#).unwrap();
        assert_eq!(req.action, LoanAction::Disburse);
        assert!(req.notes.is_none());

        assert!(serde_json::from_str::<LoanActionRequest>(r#"{"action": "cancel"}"#).is_err());
    }

    #[test]
    fn test_flat_interest() {
        // 15% of KES 10,000.00
        let t = terms(1_000_000, 1500, 6);
        assert_eq!(t.interest_cents(), 150_000);
        assert_eq!(t.total_payable_cents(), 1_150_000);
    }

    #[test]
    fn test_interest_rounds_half_up() {
        // 12.5% of 1.01 = 0.12625 -> 13 cents
        assert_eq!(terms(101, 1250, 1).interest_cents(), 13);
        // 10% of 0.05 = 0.005 -> 1 cent
        assert_eq!(terms(5, 1000, 1).interest_cents(), 1);
        // 10% of 0.04 = 0.004 -> 0 cents
        assert_eq!(terms(4, 1000, 1).interest_cents(), 0);
    }

    #[test]
    fn test_zero_rate_has_no_interest() {
        let t = terms(250_000, 0, 12);
        assert_eq!(t.interest_cents(), 0);
        assert_eq!(t.total_payable_cents(), 250_000);
    }

    #[test]
    fn test_terms_validation() {
        assert!(terms(100, 1000, 12).validate().is_ok());
        assert!(terms(0, 1000, 12).validate().is_err());
        assert!(terms(-5, 1000, 12).validate().is_err());
        assert!(terms(100, -1, 12).validate().is_err());
        assert!(terms(100, 10_001, 12).validate().is_err());
        assert!(terms(100, 1000, 0).validate().is_err());
        assert!(terms(100, 1000, 361).validate().is_err());
    }

    #[test]
    fn test_oversized_principal_is_rejected() {
        let huge = terms(i64::MAX / 2 + 1, 10_000, 12);
        assert!(huge.checked_total_payable_cents().is_none());
        assert_eq!(huge.validate().unwrap_err(), "Principal is too large");
        assert_eq!(huge.total_payable_cents(), i64::MAX);

        let largest = terms(i64::MAX / 2, 10_000, 12);
        assert!(largest.validate().is_ok());
        assert_eq!(largest.total_payable_cents(), i64::MAX - 1);
    }

    #[test]
    fn test_due_date_adds_term() {
        let disbursed = Utc.with_ymd_and_hms(2025, 1, 31, 9, 0, 0).unwrap();
        let due = terms(100, 0, 1).due_date(disbursed).unwrap();
        // Clamped to the last day of February
        assert_eq!(due, Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap());

        let due = terms(100, 0, 12).due_date(disbursed).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_merge_terms_keeps_absent_fields() {
        let current = terms(1_000, 500, 3);
        let update = UpdateLoanRequest {
            interest_rate_bps: Some(800),
            ..Default::default()
        };
        assert_eq!(update.merge_terms(current), terms(1_000, 800, 3));
    }

    #[test]
    fn test_outstanding_never_negative() {
        assert_eq!(outstanding_cents(1_000, 400), 600);
        assert_eq!(outstanding_cents(1_000, 1_000), 0);
        assert_eq!(outstanding_cents(1_000, 1_500), 0);
    }

    fn disbursed_loan() -> Loan {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Loan {
            id: Uuid::nil(),
            client_id: Uuid::nil(),
            principal_cents: 100_000,
            interest_rate_bps: 1000,
            interest_cents: 10_000,
            total_payable_cents: 110_000,
            term_months: 3,
            purpose: None,
            status: "disbursed".to_string(),
            decision_notes: None,
            created_by: "officer".to_string(),
            approved_at: Some(at),
            rejected_at: None,
            disbursed_at: Some(at),
            due_date: terms(100_000, 1000, 3).due_date(at),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_response_carries_balance_of_the_row() {
        let response = LoanResponse::from(LoanWithBalance {
            loan: disbursed_loan(),
            amount_paid_cents: 40_000,
        });
        assert_eq!(response.amount_paid_cents, 40_000);
        assert_eq!(response.outstanding_cents, 70_000);
        assert_eq!(response.status, "disbursed");
    }
}
