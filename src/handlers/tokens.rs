//! Staff token issuance.

use crate::{
    db::DbPool,
    error::AppError,
    extract::ApiJson,
    middleware::auth::{AuthContext, generate_token, hash_token},
    models::staff_token::{IssueTokenRequest, IssuedTokenResponse, StaffToken},
    tables,
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

/// Issue a bearer token for a staff member.
///
/// # Endpoint
///
/// `POST /api/v1/tokens` (admin only)
///
/// # Response (201)
///
/// The plaintext `token` appears only in this response; the database keeps
/// its SHA-256 hash.
pub async fn issue_token(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<IssueTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_token_issuer()?;

    let staff_name = request.staff_name.trim();
    if staff_name.is_empty() {
        return Err(AppError::InvalidRequest("staff_name is required".to_string()));
    }

    let token = generate_token();

    let sql = format!(
        r#"
        INSERT INTO {} (token_hash, staff_name, role)
        VALUES ($1, $2, $3)
        RETURNING id, staff_name, role, created_at
        "#,
        tables::STAFF_TOKENS
    );

    let record = sqlx::query_as::<_, StaffToken>(&sql)
        .bind(hash_token(&token))
        .bind(staff_name)
        .bind(request.role.as_str())
        .fetch_one(&pool)
        .await?;

    tracing::info!(
        token_id = %record.id,
        staff = %record.staff_name,
        role = request.role.as_str(),
        issued_by = %auth.staff_name,
        "Staff token issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(IssuedTokenResponse {
            id: record.id,
            staff_name: record.staff_name,
            role: request.role,
            token,
            created_at: record.created_at,
        }),
    ))
}
