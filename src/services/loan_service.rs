//! Loan service - origination and lifecycle of loans.
//!
//! This service handles:
//! - Creating pending loans with flat interest
//! - Amending and deleting loans before they reach the client
//! - Approve / reject / disburse transitions
//! - Loan balances (total payable minus payments)
//!
//! Lifecycle writes lock the loan row (`FOR UPDATE`) so two concurrent
//! decisions cannot both succeed.

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        loan::{
            CreateLoanRequest, Loan, LoanAction, LoanListQuery, LoanStatus, LoanTerms,
            LoanWithBalance, UpdateLoanRequest,
        },
        notification::NewNotification,
        payment::Payment,
    },
    services::{notification_service, payment_service},
    tables,
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

/// Field values written by a lifecycle action.
///
/// Timestamps left as `None` keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: LoanStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Map an action on a loan in `current` state to its field update.
    ///
    /// # Errors
    ///
    /// `Conflict` if the lifecycle does not allow `action` from `current`.
    pub fn for_action(
        current: LoanStatus,
        action: LoanAction,
        terms: LoanTerms,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let status = current.apply(action).map_err(AppError::Conflict)?;

        let mut update = StatusUpdate {
            status,
            approved_at: None,
            rejected_at: None,
            disbursed_at: None,
            due_date: None,
        };

        match action {
            LoanAction::Approve => update.approved_at = Some(now),
            LoanAction::Reject => update.rejected_at = Some(now),
            LoanAction::Disburse => {
                update.disbursed_at = Some(now);
                update.due_date = terms.due_date(now);
            }
        }

        Ok(update)
    }
}

/// `SELECT` of loans joined with their paid total. Alias `l` is the loan.
fn loan_with_balance_select() -> String {
    format!(
        r#"
        SELECT l.*,
               COALESCE(
                   (SELECT SUM(p.amount_cents) FROM {payments} p WHERE p.loan_id = l.id),
                   0
               )::BIGINT AS amount_paid_cents
        FROM {loans} l
        "#,
        payments = tables::PAYMENTS,
        loans = tables::LOANS,
    )
}

/// Fetch and lock a loan row inside a transaction.
pub(crate) async fn lock_loan(conn: &mut PgConnection, loan_id: Uuid) -> Result<Loan, AppError> {
    let sql = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", tables::LOANS);

    sqlx::query_as::<_, Loan>(&sql)
        .bind(loan_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Loan"))
}

/// Check a loan can be deleted: never decided in its favour, and no
/// money recorded against it.
pub fn check_delete_allowed(status: LoanStatus, amount_paid_cents: i64) -> Result<(), AppError> {
    if !status.is_deletable() {
        return Err(AppError::Conflict(format!(
            "Only pending or rejected loans can be deleted; this loan is {}",
            status
        )));
    }

    if amount_paid_cents > 0 {
        return Err(AppError::Conflict(format!(
            "This loan has {} cents of payments recorded and cannot be deleted",
            amount_paid_cents
        )));
    }

    Ok(())
}

fn parse_status(loan: &Loan) -> Result<LoanStatus, AppError> {
    loan.lifecycle().map_err(|e| {
        tracing::error!(loan_id = %loan.id, error = %e, "Loan row has an unknown status");
        AppError::Conflict(e)
    })
}

/// Create a pending loan for an existing client.
///
/// # Errors
///
/// - `InvalidRequest`: principal, rate or term out of range
/// - `NotFound`: client does not exist
pub async fn create_loan(
    pool: &DbPool,
    created_by: &str,
    request: CreateLoanRequest,
) -> Result<Loan, AppError> {
    let terms = request.terms();
    terms.validate().map_err(AppError::InvalidRequest)?;

    let client_exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        tables::CLIENTS
    ))
    .bind(request.client_id)
    .fetch_one(pool)
    .await?;

    if !client_exists {
        return Err(AppError::NotFound("Client"));
    }

    let sql = format!(
        r#"
        INSERT INTO {} (
            client_id,
            principal_cents,
            interest_rate_bps,
            interest_cents,
            total_payable_cents,
            term_months,
            purpose,
            status,
            created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
        RETURNING *
        "#,
        tables::LOANS
    );

    let loan = sqlx::query_as::<_, Loan>(&sql)
        .bind(request.client_id)
        .bind(terms.principal_cents)
        .bind(terms.interest_rate_bps)
        .bind(terms.interest_cents())
        .bind(terms.total_payable_cents())
        .bind(terms.term_months)
        .bind(request.purpose)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

    tracing::info!(
        loan_id = %loan.id,
        client_id = %loan.client_id,
        principal_cents = loan.principal_cents,
        "Loan created"
    );

    Ok(loan)
}

/// List loans newest first, optionally filtered by status and client.
pub async fn list_loans(
    pool: &DbPool,
    query: LoanListQuery,
) -> Result<Vec<LoanWithBalance>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<LoanStatus>)
        .transpose()
        .map_err(AppError::InvalidRequest)?;

    let sql = format!(
        r#"
        {}
        WHERE ($1::TEXT IS NULL OR l.status = $1)
          AND ($2::UUID IS NULL OR l.client_id = $2)
        ORDER BY l.created_at DESC
        "#,
        loan_with_balance_select()
    );

    let loans = sqlx::query_as::<_, LoanWithBalance>(&sql)
        .bind(status.map(|s| s.as_str()))
        .bind(query.client_id)
        .fetch_all(pool)
        .await?;

    Ok(loans)
}

/// Get a loan with its repayment balance.
pub async fn get_loan(pool: &DbPool, loan_id: Uuid) -> Result<LoanWithBalance, AppError> {
    let sql = format!("{} WHERE l.id = $1", loan_with_balance_select());

    sqlx::query_as::<_, LoanWithBalance>(&sql)
        .bind(loan_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Loan"))
}

/// Amend the terms of a pending loan. Interest is recomputed.
///
/// The returned balance is read in the same transaction as the write.
///
/// # Errors
///
/// - `NotFound`: loan does not exist
/// - `Conflict`: loan is no longer pending
/// - `InvalidRequest`: merged terms out of range
pub async fn update_loan(
    pool: &DbPool,
    loan_id: Uuid,
    request: UpdateLoanRequest,
) -> Result<LoanWithBalance, AppError> {
    let mut tx = pool.begin().await?;

    let loan = lock_loan(&mut tx, loan_id).await?;
    let status = parse_status(&loan)?;

    if !status.is_editable() {
        tx.rollback().await?;
        return Err(AppError::Conflict(format!(
            "Only pending loans can be amended; this loan is {}",
            status
        )));
    }

    let terms = request.merge_terms(loan.terms());
    terms.validate().map_err(AppError::InvalidRequest)?;

    let sql = format!(
        r#"
        UPDATE {}
        SET principal_cents = $2,
            interest_rate_bps = $3,
            interest_cents = $4,
            total_payable_cents = $5,
            term_months = $6,
            purpose = COALESCE($7, purpose),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
        tables::LOANS
    );

    let updated = sqlx::query_as::<_, Loan>(&sql)
        .bind(loan_id)
        .bind(terms.principal_cents)
        .bind(terms.interest_rate_bps)
        .bind(terms.interest_cents())
        .bind(terms.total_payable_cents())
        .bind(terms.term_months)
        .bind(request.purpose)
        .fetch_one(&mut *tx)
        .await?;
    let amount_paid_cents = payment_service::paid_total(&mut tx, loan_id).await?;

    tx.commit().await?;

    Ok(LoanWithBalance {
        loan: updated,
        amount_paid_cents,
    })
}

/// Delete a pending or rejected loan with no payments recorded against it.
pub async fn delete_loan(pool: &DbPool, loan_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let loan = lock_loan(&mut tx, loan_id).await?;
    let status = parse_status(&loan)?;
    let paid = payment_service::paid_total(&mut tx, loan.id).await?;

    if let Err(e) = check_delete_allowed(status, paid) {
        tx.rollback().await?;
        return Err(e);
    }

    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", tables::LOANS))
        .bind(loan_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(loan_id = %loan_id, "Loan deleted");

    Ok(())
}

/// Apply approve / reject / disburse to a loan.
///
/// # Process
///
/// 1. Lock the loan and check the transition is allowed
/// 2. Write the status and timestamp fields, commit
/// 3. Insert a notification (separate write)
///
/// A failed notification insert is logged; the loan update stands.
pub async fn apply_action(
    pool: &DbPool,
    loan_id: Uuid,
    action: LoanAction,
    notes: Option<String>,
    staff_name: &str,
) -> Result<LoanWithBalance, AppError> {
    let mut tx = pool.begin().await?;

    let loan = lock_loan(&mut tx, loan_id).await?;
    let current = parse_status(&loan)?;

    let update = match StatusUpdate::for_action(current, action, loan.terms(), Utc::now()) {
        Ok(update) => update,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    let sql = format!(
        r#"
        UPDATE {}
        SET status = $2,
            decision_notes = COALESCE($3, decision_notes),
            approved_at = COALESCE($4, approved_at),
            rejected_at = COALESCE($5, rejected_at),
            disbursed_at = COALESCE($6, disbursed_at),
            due_date = COALESCE($7, due_date),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
        tables::LOANS
    );

    let updated = sqlx::query_as::<_, Loan>(&sql)
        .bind(loan_id)
        .bind(update.status.as_str())
        .bind(notes)
        .bind(update.approved_at)
        .bind(update.rejected_at)
        .bind(update.disbursed_at)
        .bind(update.due_date)
        .fetch_one(&mut *tx)
        .await?;
    let amount_paid_cents = payment_service::paid_total(&mut tx, loan_id).await?;

    tx.commit().await?;

    tracing::info!(
        loan_id = %loan_id,
        action = action.as_str(),
        from = %current,
        to = %update.status,
        staff = staff_name,
        "Loan status changed"
    );

    notification_service::notify_best_effort(
        pool,
        NewNotification {
            loan_id: Some(updated.id),
            client_id: Some(updated.client_id),
            kind: action.notification_kind(),
            message: format!("Loan {} {} by {}", updated.id, update.status, staff_name),
        },
    )
    .await;

    Ok(LoanWithBalance {
        loan: updated,
        amount_paid_cents,
    })
}

/// Payments recorded against a loan, newest first.
pub async fn list_loan_payments(pool: &DbPool, loan_id: Uuid) -> Result<Vec<Payment>, AppError> {
    let loan_exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        tables::LOANS
    ))
    .bind(loan_id)
    .fetch_one(pool)
    .await?;

    if !loan_exists {
        return Err(AppError::NotFound("Loan"));
    }

    let sql = format!(
        "SELECT * FROM {} WHERE loan_id = $1 ORDER BY paid_at DESC",
        tables::PAYMENTS
    );

    let payments = sqlx::query_as::<_, Payment>(&sql)
        .bind(loan_id)
        .fetch_all(pool)
        .await?;

    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn terms() -> LoanTerms {
        LoanTerms {
            principal_cents: 1_000_000,
            interest_rate_bps: 1000,
            term_months: 3,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_approve_sets_approved_at() {
        let update =
            StatusUpdate::for_action(LoanStatus::Pending, LoanAction::Approve, terms(), now())
                .unwrap();
        assert_eq!(update.status, LoanStatus::Approved);
        assert_eq!(update.approved_at, Some(now()));
        assert!(update.rejected_at.is_none());
        assert!(update.disbursed_at.is_none());
        assert!(update.due_date.is_none());
    }

    #[test]
    fn test_reject_sets_rejected_at() {
        let update =
            StatusUpdate::for_action(LoanStatus::Pending, LoanAction::Reject, terms(), now())
                .unwrap();
        assert_eq!(update.status, LoanStatus::Rejected);
        assert_eq!(update.rejected_at, Some(now()));
        assert!(update.approved_at.is_none());
    }

    #[test]
    fn test_disburse_sets_due_date() {
        let update =
            StatusUpdate::for_action(LoanStatus::Approved, LoanAction::Disburse, terms(), now())
                .unwrap();
        assert_eq!(update.status, LoanStatus::Disbursed);
        assert_eq!(update.disbursed_at, Some(now()));
        assert_eq!(
            update.due_date,
            Some(Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_disbursing_pending_loan_conflicts() {
        let err =
            StatusUpdate::for_action(LoanStatus::Pending, LoanAction::Disburse, terms(), now())
                .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_unpaid_pending_or_rejected_loan_is_deletable() {
        assert!(check_delete_allowed(LoanStatus::Pending, 0).is_ok());
        assert!(check_delete_allowed(LoanStatus::Rejected, 0).is_ok());
    }

    #[test]
    fn test_loan_with_payments_is_not_deletable() {
        assert!(matches!(
            check_delete_allowed(LoanStatus::Rejected, 150_000),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_decided_loan_is_not_deletable() {
        for status in [LoanStatus::Approved, LoanStatus::Disbursed] {
            assert!(matches!(
                check_delete_allowed(status, 0),
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[test]
    fn test_decisions_are_final() {
        for action in [LoanAction::Approve, LoanAction::Reject, LoanAction::Disburse] {
            assert!(
                StatusUpdate::for_action(LoanStatus::Rejected, action, terms(), now()).is_err()
            );
            assert!(
                StatusUpdate::for_action(LoanStatus::Disbursed, action, terms(), now()).is_err()
            );
        }
    }
}
