//! M-Pesa reconciliation service.
//!
//! An STK push is recorded as a `pending` transaction when the SPA starts
//! it. The provider's callback then settles the transaction and, when it
//! succeeded and references a loan, derives a payment row. Both writes
//! happen in one database transaction.

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::{
        mpesa::{CallbackOutcome, CreateMpesaTransactionRequest, MpesaTransaction, StkCallback},
        notification::NewNotification,
        payment::{NewPayment, Payment, PaymentMethod},
    },
    services::{notification_service, payment_service},
    tables,
};
use chrono::Utc;

/// What a callback did to the stored transaction.
#[derive(Debug)]
pub enum ReconcileResult {
    /// Transaction completed; `payment` is the derived row, if any.
    Completed {
        transaction: MpesaTransaction,
        payment: Option<Payment>,
    },
    Failed(MpesaTransaction),
    /// Transaction was already settled by an earlier delivery.
    AlreadyProcessed(MpesaTransaction),
}

/// Record a pending STK push transaction.
///
/// # Errors
///
/// - `InvalidRequest`: amount, phone or checkout id missing
/// - `NotFound`: referenced loan does not exist
/// - `Conflict`: checkout request id already recorded
pub async fn create_transaction(
    pool: &DbPool,
    request: CreateMpesaTransactionRequest,
) -> Result<MpesaTransaction, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    if let Some(loan_id) = request.loan_id {
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
    }

    let sql = format!(
        r#"
        INSERT INTO {} (
            loan_id,
            phone_number,
            amount_cents,
            merchant_request_id,
            checkout_request_id,
            status
        )
        VALUES ($1, $2, $3, $4, $5, 'pending')
        RETURNING *
        "#,
        tables::MPESA_TRANSACTIONS
    );

    let transaction = sqlx::query_as::<_, MpesaTransaction>(&sql)
        .bind(request.loan_id)
        .bind(request.phone_number.trim())
        .bind(request.amount_cents)
        .bind(request.merchant_request_id)
        .bind(request.checkout_request_id.trim())
        .fetch_one(pool)
        .await
        .map_err(|e| db::conflict_on_unique(e, "This checkout request is already recorded"))?;

    tracing::info!(
        transaction_id = %transaction.id,
        checkout_request_id = %transaction.checkout_request_id,
        "M-Pesa transaction recorded"
    );

    Ok(transaction)
}

/// Settle a transaction from an STK callback.
///
/// # Process
///
/// 1. Interpret the callback (completed or failed; a success report
///    missing its amount or receipt is stored as failed)
/// 2. Lock the transaction by `CheckoutRequestID`
/// 3. Skip it if an earlier delivery already settled it
/// 4. Write the outcome; on completion with a loan, insert a payment
///    keyed by the receipt number
/// 5. Commit, then notify about a derived payment
///
/// # Errors
///
/// - `NotFound`: no transaction with this checkout request id
pub async fn process_callback(
    pool: &DbPool,
    callback: &StkCallback,
) -> Result<ReconcileResult, AppError> {
    let outcome = callback.settlement();

    let mut tx = pool.begin().await?;

    let select = format!(
        "SELECT * FROM {} WHERE checkout_request_id = $1 FOR UPDATE",
        tables::MPESA_TRANSACTIONS
    );

    let existing = sqlx::query_as::<_, MpesaTransaction>(&select)
        .bind(&callback.checkout_request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("M-Pesa transaction"))?;

    if existing.status != "pending" {
        tx.rollback().await?;
        return Ok(ReconcileResult::AlreadyProcessed(existing));
    }

    let result = match outcome {
        CallbackOutcome::Completed(completed) => {
            let sql = format!(
                r#"
                UPDATE {}
                SET status = 'completed',
                    result_code = 0,
                    result_desc = $2,
                    mpesa_receipt_number = $3,
                    phone_number = COALESCE($4, phone_number),
                    amount_cents = $5,
                    transaction_date = $6,
                    merchant_request_id = COALESCE(merchant_request_id, $7),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
                tables::MPESA_TRANSACTIONS
            );

            let transaction = sqlx::query_as::<_, MpesaTransaction>(&sql)
                .bind(existing.id)
                .bind(&callback.result_desc)
                .bind(&completed.receipt_number)
                .bind(&completed.phone_number)
                .bind(completed.amount_cents)
                .bind(completed.transaction_date)
                .bind(&callback.merchant_request_id)
                .fetch_one(&mut *tx)
                .await?;

            let payment = match transaction.loan_id {
                Some(loan_id) => {
                    let new_payment = NewPayment {
                        loan_id,
                        amount_cents: completed.amount_cents,
                        method: PaymentMethod::Mpesa,
                        reference: Some(completed.receipt_number.clone()),
                        paid_at: completed.transaction_date.unwrap_or_else(Utc::now),
                        recorded_by: None,
                    };

                    let inserted =
                        payment_service::insert_payment_if_new(&mut tx, &new_payment).await?;
                    if inserted.is_none() {
                        tracing::warn!(
                            receipt = %completed.receipt_number,
                            "M-Pesa receipt already recorded as a payment"
                        );
                    }
                    inserted
                }
                None => None,
            };

            ReconcileResult::Completed {
                transaction,
                payment,
            }
        }
        CallbackOutcome::Failed {
            result_code,
            result_desc,
        } => {
            let sql = format!(
                r#"
                UPDATE {}
                SET status = 'failed',
                    result_code = $2,
                    result_desc = $3,
                    merchant_request_id = COALESCE(merchant_request_id, $4),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
                tables::MPESA_TRANSACTIONS
            );

            let transaction = sqlx::query_as::<_, MpesaTransaction>(&sql)
                .bind(existing.id)
                .bind(clamp_result_code(result_code))
                .bind(result_desc)
                .bind(&callback.merchant_request_id)
                .fetch_one(&mut *tx)
                .await?;

            ReconcileResult::Failed(transaction)
        }
    };

    tx.commit().await?;

    if let ReconcileResult::Completed {
        transaction,
        payment: Some(payment),
    } = &result
    {
        notification_service::notify_best_effort(
            pool,
            NewNotification {
                loan_id: Some(payment.loan_id),
                client_id: None,
                kind: "payment_received",
                message: format!(
                    "M-Pesa payment of {} cents received from {} (receipt {})",
                    payment.amount_cents,
                    transaction.phone_number,
                    transaction.mpesa_receipt_number.as_deref().unwrap_or("-")
                ),
            },
        )
        .await;
    }

    Ok(result)
}

/// Fit a provider result code into the `INTEGER` column.
fn clamp_result_code(code: i64) -> i32 {
    code.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_result_code() {
        assert_eq!(clamp_result_code(1032), 1032);
        assert_eq!(clamp_result_code(i64::MAX), i32::MAX);
        assert_eq!(clamp_result_code(i64::MIN), i32::MIN);
    }
}
