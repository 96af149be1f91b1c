//! M-Pesa HTTP handlers.
//!
//! - POST /api/v1/mpesa/transactions - Record a pending STK push (authenticated)
//! - POST /api/v1/mpesa/callback - STK callback from the provider (public)

use crate::{
    db::DbPool,
    error::AppError,
    extract::ApiJson,
    models::mpesa::{CreateMpesaTransactionRequest, MpesaAck, StkCallbackEnvelope},
    services::mpesa_service::{self, ReconcileResult},
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

/// Record an STK push the SPA has just initiated.
///
/// # Request Body
///
/// ```json
/// {
///   "loan_id": "550e8400-...",
///   "phone_number": "254712345678",
///   "amount_cents": 150000,
///   "merchant_request_id": "29115-34620561-1",
///   "checkout_request_id": "ws_CO_191220191020363925"
/// }
/// ```
pub async fn create_transaction(
    State(pool): State<DbPool>,
    ApiJson(request): ApiJson<CreateMpesaTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = mpesa_service::create_transaction(&pool, request).await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// STK push callback.
///
/// Always answers `200 {"ResultCode": 0, "ResultDesc": "Accepted"}`.
/// Malformed payloads and processing failures are logged, never returned,
/// so the provider does not keep retrying the delivery.
pub async fn stk_callback(State(pool): State<DbPool>, body: Bytes) -> Json<MpesaAck> {
    let envelope = match serde_json::from_slice::<StkCallbackEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed M-Pesa callback");
            return Json(MpesaAck::accepted());
        }
    };

    let callback = envelope.body.stk_callback;

    match mpesa_service::process_callback(&pool, &callback).await {
        Ok(ReconcileResult::Completed {
            transaction,
            payment,
        }) => {
            tracing::info!(
                checkout_request_id = %callback.checkout_request_id,
                transaction_id = %transaction.id,
                payment_id = ?payment.as_ref().map(|p| p.id),
                "M-Pesa payment completed"
            );
        }
        Ok(ReconcileResult::Failed(transaction)) => {
            tracing::info!(
                checkout_request_id = %callback.checkout_request_id,
                transaction_id = %transaction.id,
                result_code = callback.result_code,
                "M-Pesa payment failed"
            );
        }
        Ok(ReconcileResult::AlreadyProcessed(transaction)) => {
            tracing::info!(
                checkout_request_id = %callback.checkout_request_id,
                status = %transaction.status,
                "Duplicate M-Pesa callback ignored"
            );
        }
        Err(e) => {
            tracing::error!(
                checkout_request_id = %callback.checkout_request_id,
                error = ?e,
                "Failed to process M-Pesa callback"
            );
        }
    }

    Json(MpesaAck::accepted())
}
