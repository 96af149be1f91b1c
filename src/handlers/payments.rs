//! Payment HTTP handlers.

use crate::{
    db::DbPool,
    error::AppError,
    extract::ApiJson,
    middleware::auth::AuthContext,
    models::payment::RecordPaymentRequest,
    services::payment_service,
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

/// Record a manual repayment.
///
/// # Endpoint
///
/// `POST /api/v1/payments`
///
/// # Validation
///
/// - Loan must exist (404) and be disbursed (409)
/// - Amount must be positive (400) and not exceed the outstanding balance (422)
/// - `reference`, when given, must be unused (409)
pub async fn record_payment(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<RecordPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payment = payment_service::record_payment(&pool, &auth.staff_name, request).await?;

    Ok((StatusCode::CREATED, Json(payment)))
}
