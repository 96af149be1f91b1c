//! Payment service - repayments recorded against loans.
//!
//! Manual payments are checked against the outstanding balance while the
//! loan row is locked, so concurrent captures cannot overshoot it.

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::{
        loan::{LoanStatus, outstanding_cents},
        notification::NewNotification,
        payment::{NewPayment, Payment, RecordPaymentRequest},
    },
    services::{loan_service, notification_service},
    tables,
};
use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

/// Sum of payments recorded against a loan.
pub(crate) async fn paid_total(conn: &mut PgConnection, loan_id: Uuid) -> Result<i64, AppError> {
    let sql = format!(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM {} WHERE loan_id = $1",
        tables::PAYMENTS
    );

    let total: i64 = sqlx::query_scalar(&sql)
        .bind(loan_id)
        .fetch_one(conn)
        .await?;

    Ok(total)
}

/// Insert a payment row. A duplicate reference is a `Conflict`.
pub(crate) async fn insert_payment(
    conn: &mut PgConnection,
    payment: &NewPayment,
) -> Result<Payment, AppError> {
    let sql = format!(
        r#"
        INSERT INTO {} (loan_id, amount_cents, method, reference, paid_at, recorded_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
        tables::PAYMENTS
    );

    sqlx::query_as::<_, Payment>(&sql)
        .bind(payment.loan_id)
        .bind(payment.amount_cents)
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(payment.paid_at)
        .bind(&payment.recorded_by)
        .fetch_one(conn)
        .await
        .map_err(duplicate_reference)
}

fn duplicate_reference(e: sqlx::Error) -> AppError {
    db::conflict_on_unique(e, "A payment with this reference already exists")
}

/// Insert a payment unless its reference is already recorded.
///
/// Returns `None` for a duplicate reference.
pub(crate) async fn insert_payment_if_new(
    conn: &mut PgConnection,
    payment: &NewPayment,
) -> Result<Option<Payment>, AppError> {
    let sql = format!(
        r#"
        INSERT INTO {} (loan_id, amount_cents, method, reference, paid_at, recorded_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (reference) DO NOTHING
        RETURNING *
        "#,
        tables::PAYMENTS
    );

    let row = sqlx::query_as::<_, Payment>(&sql)
        .bind(payment.loan_id)
        .bind(payment.amount_cents)
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(payment.paid_at)
        .bind(&payment.recorded_by)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Check a manual payment against the loan's state and balance.
pub fn check_payment_allowed(
    status: LoanStatus,
    amount_cents: i64,
    outstanding: i64,
) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    if status != LoanStatus::Disbursed {
        return Err(AppError::Conflict(format!(
            "Payments can only be recorded against disbursed loans; this loan is {}",
            status
        )));
    }

    if amount_cents > outstanding {
        return Err(AppError::Unprocessable(format!(
            "Payment of {} cents exceeds the outstanding balance of {} cents",
            amount_cents, outstanding
        )));
    }

    Ok(())
}

/// Record a payment captured by a staff member.
///
/// # Process
///
/// 1. Lock the loan row
/// 2. Check it is disbursed and the amount fits the outstanding balance
/// 3. Insert the payment, commit
/// 4. Insert a `payment_received` notification (separate write)
///
/// # Errors
///
/// - `NotFound`: loan does not exist
/// - `Conflict`: loan not disbursed, or duplicate reference
/// - `Unprocessable`: amount exceeds the outstanding balance
pub async fn record_payment(
    pool: &DbPool,
    recorded_by: &str,
    request: RecordPaymentRequest,
) -> Result<Payment, AppError> {
    let mut tx = pool.begin().await?;

    let loan = loan_service::lock_loan(&mut tx, request.loan_id).await?;
    let status = loan.lifecycle().map_err(AppError::Conflict)?;
    let paid = paid_total(&mut tx, loan.id).await?;
    let outstanding = outstanding_cents(loan.total_payable_cents, paid);

    if let Err(e) = check_payment_allowed(status, request.amount_cents, outstanding) {
        tx.rollback().await?;
        return Err(e);
    }

    let new_payment = NewPayment {
        loan_id: loan.id,
        amount_cents: request.amount_cents,
        method: request.method,
        reference: request.reference.filter(|r| !r.trim().is_empty()),
        paid_at: request.paid_at.unwrap_or_else(Utc::now),
        recorded_by: Some(recorded_by.to_string()),
    };

    let payment = insert_payment(&mut tx, &new_payment).await?;

    tx.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        loan_id = %loan.id,
        amount_cents = payment.amount_cents,
        method = %payment.method,
        "Payment recorded"
    );

    notification_service::notify_best_effort(
        pool,
        NewNotification {
            loan_id: Some(loan.id),
            client_id: Some(loan.client_id),
            kind: "payment_received",
            message: format!(
                "Payment of {} cents received for loan {}",
                payment.amount_cents, loan.id
            ),
        },
    )
    .await;

    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_within_balance_allowed() {
        assert!(check_payment_allowed(LoanStatus::Disbursed, 500, 1_000).is_ok());
        assert!(check_payment_allowed(LoanStatus::Disbursed, 1_000, 1_000).is_ok());
    }

    #[test]
    fn test_overpayment_is_unprocessable() {
        assert!(matches!(
            check_payment_allowed(LoanStatus::Disbursed, 1_001, 1_000),
            Err(AppError::Unprocessable(_))
        ));
    }

    #[test]
    fn test_payment_on_undisbursed_loan_conflicts() {
        for status in [LoanStatus::Pending, LoanStatus::Approved, LoanStatus::Rejected] {
            assert!(matches!(
                check_payment_allowed(status, 100, 1_000),
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[test]
    fn test_duplicate_reference_is_conflict() {
        let err = duplicate_reference(db::tests::unique_violation());
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.status_and_code().0, axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn test_non_positive_amount_is_invalid() {
        assert!(matches!(
            check_payment_allowed(LoanStatus::Disbursed, 0, 1_000),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
