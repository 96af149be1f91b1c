//! Health check endpoint for service monitoring.

use crate::{db::DbPool, error::AppError, tables};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
///
/// Returns service status, database connectivity and any mapped tables
/// missing from the schema.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when tables are missing
    pub status: String,

    /// Database connection status
    pub database: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_tables: Vec<String>,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Checks
///
/// - Database connectivity (executes simple query)
/// - Every table in the static mapping exists
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// If the database is unreachable, returns the standard error response.
pub async fn health_check(State(pool): State<DbPool>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&pool).await?;

    let mut missing_tables = Vec::new();
    for (_, table) in tables::TABLES {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(*table)
            .fetch_one(&pool)
            .await?;

        if !exists {
            missing_tables.push(table.to_string());
        }
    }

    let status = if missing_tables.is_empty() {
        "healthy"
    } else {
        tracing::warn!(?missing_tables, "Schema is missing tables");
        "degraded"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        database: "connected".to_string(),
        missing_tables,
        timestamp: Utc::now(),
    }))
}
