//! Shareholder register and accounting report handlers.

use crate::{
    db::DbPool,
    error::AppError,
    extract::ApiJson,
    models::shareholder::{CreateShareholderRequest, PortfolioSummary, Shareholder},
    services::report_service,
    tables,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

/// Record a shareholder.
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Otieno Odhiambo",
///   "phone_number": "254722000111",
///   "shares": 100,
///   "contribution_cents": 10000000
/// }
/// ```
pub async fn create_shareholder(
    State(pool): State<DbPool>,
    ApiJson(request): ApiJson<CreateShareholderRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let sql = format!(
        r#"
        INSERT INTO {} (full_name, phone_number, shares, contribution_cents, joined_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
        tables::SHAREHOLDERS
    );

    let shareholder = sqlx::query_as::<_, Shareholder>(&sql)
        .bind(request.full_name.trim())
        .bind(request.phone_number)
        .bind(request.shares)
        .bind(request.contribution_cents)
        .bind(request.joined_at.unwrap_or_else(Utc::now))
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(shareholder)))
}

/// List shareholders in order of joining.
pub async fn list_shareholders(
    State(pool): State<DbPool>,
) -> Result<Json<Vec<Shareholder>>, AppError> {
    let sql = format!(
        "SELECT * FROM {} ORDER BY joined_at ASC",
        tables::SHAREHOLDERS
    );

    let shareholders = sqlx::query_as::<_, Shareholder>(&sql)
        .fetch_all(&pool)
        .await?;

    Ok(Json(shareholders))
}

/// `GET /api/v1/reports/portfolio`
pub async fn portfolio_report(
    State(pool): State<DbPool>,
) -> Result<Json<PortfolioSummary>, AppError> {
    let summary = report_service::portfolio_summary(&pool).await?;

    Ok(Json(summary))
}
