//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Hash it and verify an active staff token exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{
    db::DbPool,
    error::AppError,
    models::staff_token::{StaffRole, StaffToken},
    tables,
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Route handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated staff token
    pub token_id: Uuid,

    /// Staff member the token was issued to
    pub staff_name: String,

    pub role: StaffRole,
}

impl AuthContext {
    /// Fail with 403 unless this staff member may decide on loans.
    pub fn require_loan_decider(&self) -> Result<(), AppError> {
        if self.role.can_decide_loans() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin"))
        }
    }

    pub fn require_token_issuer(&self) -> Result<(), AppError> {
        if self.role.can_issue_tokens() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin"))
        }
    }
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the `<token>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// Missing or malformed headers are rejected before the database is
/// touched.
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let token_hash = hash_token(token);

    let sql = format!(
        "SELECT id, staff_name, role, created_at
         FROM {}
         WHERE token_hash = $1 AND is_active = true",
        tables::STAFF_TOKENS
    );

    let record = sqlx::query_as::<_, StaffToken>(&sql)
        .bind(&token_hash)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let role = record.role.parse::<StaffRole>().map_err(|e| {
        tracing::error!(token_id = %record.id, error = %e, "Staff token has an unknown role");
        AppError::Unauthorized
    })?;

    let auth_context = AuthContext {
        token_id: record.id,
        staff_name: record.staff_name,
        role,
    };

    tracing::debug!(
        token_id = %auth_context.token_id,
        staff = %auth_context.staff_name,
        "Request authenticated"
    );

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// SHA-256 hex digest of a bearer token, as stored in the database.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new random bearer token (64 hex characters).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("abc123")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_officer_cannot_decide_loans() {
        let ctx = AuthContext {
            token_id: Uuid::new_v4(),
            staff_name: "Achieng".to_string(),
            role: StaffRole::Officer,
        };
        assert!(matches!(
            ctx.require_loan_decider(),
            Err(AppError::Forbidden("admin"))
        ));
        assert!(ctx.require_token_issuer().is_err());
    }
}
