//! Client management HTTP handlers.
//!
//! This module implements the client-related API endpoints:
//! - POST /api/v1/clients - Register a client
//! - GET /api/v1/clients - List clients, optionally filtered by `search`
//! - GET /api/v1/clients/{id} - Get client by ID
//! - PUT /api/v1/clients/{id} - Update client details

use crate::{
    db::{self, DbPool},
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::client::{Client, ClientListQuery, CreateClientRequest, UpdateClientRequest},
    tables,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Register a new client.
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Wanjiru Kamau",
///   "phone_number": "254712345678",
///   "national_id": "12345678",
///   "email": "wanjiru@example.com",
///   "address": "Kisumu"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created client
/// - **Error (400)**: Required field missing or blank
/// - **Error (409)**: A client with this national ID already exists
pub async fn create_client(
    State(pool): State<DbPool>,
    ApiJson(request): ApiJson<CreateClientRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let sql = format!(
        r#"
        INSERT INTO {} (full_name, phone_number, national_id, email, address)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
        tables::CLIENTS
    );

    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(request.full_name.trim())
        .bind(request.phone_number.trim())
        .bind(request.national_id.trim())
        .bind(request.email)
        .bind(request.address)
        .fetch_one(&pool)
        .await
        .map_err(duplicate_national_id)?;

    tracing::info!(client_id = %client.id, "Client registered");

    Ok((StatusCode::CREATED, Json(client)))
}

/// List clients, newest first.
///
/// `?search=` matches name, phone number or national ID, case-insensitively.
pub async fn list_clients(
    State(pool): State<DbPool>,
    ApiQuery(query): ApiQuery<ClientListQuery>,
) -> Result<Json<Vec<Client>>, AppError> {
    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let sql = format!(
        r#"
        SELECT * FROM {}
        WHERE ($1::TEXT IS NULL
               OR full_name ILIKE $1
               OR phone_number ILIKE $1
               OR national_id ILIKE $1)
        ORDER BY created_at DESC
        "#,
        tables::CLIENTS
    );

    let clients = sqlx::query_as::<_, Client>(&sql)
        .bind(pattern)
        .fetch_all(&pool)
        .await?;

    Ok(Json(clients))
}

/// Get a specific client by ID.
pub async fn get_client(
    State(pool): State<DbPool>,
    ApiPath(client_id): ApiPath<Uuid>,
) -> Result<Json<Client>, AppError> {
    let sql = format!("SELECT * FROM {} WHERE id = $1", tables::CLIENTS);

    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(client_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Client"))?;

    Ok(Json(client))
}

/// Update client details.
///
/// Only the fields present in the body change.
pub async fn update_client(
    State(pool): State<DbPool>,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;

    let sql = format!(
        r#"
        UPDATE {}
        SET full_name = COALESCE($2, full_name),
            phone_number = COALESCE($3, phone_number),
            national_id = COALESCE($4, national_id),
            email = COALESCE($5, email),
            address = COALESCE($6, address),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
        tables::CLIENTS
    );

    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(client_id)
        .bind(request.full_name.as_deref().map(str::trim))
        .bind(request.phone_number.as_deref().map(str::trim))
        .bind(request.national_id.as_deref().map(str::trim))
        .bind(request.email)
        .bind(request.address)
        .fetch_optional(&pool)
        .await
        .map_err(duplicate_national_id)?
        .ok_or(AppError::NotFound("Client"))?;

    Ok(Json(client))
}

fn duplicate_national_id(e: sqlx::Error) -> AppError {
    db::conflict_on_unique(e, "A client with this national ID already exists")
}

/// Wrap `term` in `%` for ILIKE, escaping the pattern metacharacters.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_national_id_is_conflict() {
        let response = duplicate_national_id(db::tests::unique_violation()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("kamau"), "%kamau%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
