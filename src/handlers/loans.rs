//! Loan HTTP handlers.
//!
//! This module implements loan-related API endpoints:
//! - POST /api/v1/loans - Create a pending loan
//! - GET /api/v1/loans - List loans (`?status=`, `?client_id=`)
//! - GET /api/v1/loans/{id} - Get loan with balance
//! - PUT /api/v1/loans/{id} - Amend a pending loan
//! - DELETE /api/v1/loans/{id} - Delete a pending or rejected loan
//! - POST /api/v1/loans/{id}/actions - Approve, reject or disburse
//! - GET /api/v1/loans/{id}/payments - Payments against the loan

use crate::{
    db::DbPool,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::auth::AuthContext,
    models::{
        loan::{CreateLoanRequest, LoanActionRequest, LoanListQuery, LoanResponse, UpdateLoanRequest},
        payment::Payment,
    },
    services::loan_service,
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Create a loan application.
///
/// # Request Body
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
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "770e8400-...",
///   "client_id": "550e8400-...",
///   "principal_cents": 5000000,
///   "interest_cents": 750000,
///   "total_payable_cents": 5750000,
///   "amount_paid_cents": 0,
///   "outstanding_cents": 5750000,
///   "status": "pending",
///   ...
/// }
/// ```
pub async fn create_loan(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<CreateLoanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let loan = loan_service::create_loan(&pool, &auth.staff_name, request).await?;

    Ok((StatusCode::CREATED, Json(LoanResponse::from(loan))))
}

/// List loans, newest first.
///
/// An unknown `status` filter is a 400.
pub async fn list_loans(
    State(pool): State<DbPool>,
    ApiQuery(query): ApiQuery<LoanListQuery>,
) -> Result<Json<Vec<LoanResponse>>, AppError> {
    let loans = loan_service::list_loans(&pool, query).await?;

    Ok(Json(loans.into_iter().map(Into::into).collect()))
}

/// Get a loan by ID, including amount paid and outstanding balance.
pub async fn get_loan(
    State(pool): State<DbPool>,
    ApiPath(loan_id): ApiPath<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    let loan = loan_service::get_loan(&pool, loan_id).await?;

    Ok(Json(loan.into()))
}

/// Amend principal, rate, term or purpose of a pending loan.
///
/// Returns 409 once the loan has been decided.
pub async fn update_loan(
    State(pool): State<DbPool>,
    ApiPath(loan_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateLoanRequest>,
) -> Result<Json<LoanResponse>, AppError> {
    let loan = loan_service::update_loan(&pool, loan_id, request).await?;

    Ok(Json(loan.into()))
}

/// Delete a pending or rejected loan.
///
/// # Response
///
/// Returns 204 No Content on success, 409 for approved or disbursed loans
/// and for loans with payments recorded.
pub async fn delete_loan(
    State(pool): State<DbPool>,
    ApiPath(loan_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    loan_service::delete_loan(&pool, loan_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Apply a lifecycle action to a loan.
///
/// # Request Body
///
/// ```json
/// { "action": "approve", "notes": "Guarantor verified" }
/// ```
///
/// # Rules
///
/// - Requires the `admin` role (403 otherwise)
/// - pending → approved | rejected, approved → disbursed; anything else is 409
/// - A notification is recorded after the status change
pub async fn apply_loan_action(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(loan_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<LoanActionRequest>,
) -> Result<Json<LoanResponse>, AppError> {
    auth.require_loan_decider()?;

    let loan = loan_service::apply_action(
        &pool,
        loan_id,
        request.action,
        request.notes,
        &auth.staff_name,
    )
    .await?;

    Ok(Json(loan.into()))
}

/// List payments recorded against a loan, newest first.
pub async fn list_loan_payments(
    State(pool): State<DbPool>,
    ApiPath(loan_id): ApiPath<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = loan_service::list_loan_payments(&pool, loan_id).await?;

    Ok(Json(payments))
}
