//! Staff token model for authentication.
//!
//! Staff members authenticate with an opaque bearer token. Only the
//! SHA-256 hash of each token is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to a staff token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Full access, including loan decisions and token issuance
    Admin,
    /// Captures clients, loans and payments
    Officer,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Officer => "officer",
        }
    }

    /// Approve, reject and disburse are reserved for admins.
    pub fn can_decide_loans(&self) -> bool {
        matches!(self, StaffRole::Admin)
    }

    pub fn can_issue_tokens(&self) -> bool {
        matches!(self, StaffRole::Admin)
    }
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(StaffRole::Admin),
            "officer" => Ok(StaffRole::Officer),
            _ => Err(format!("Invalid staff role: {}", s)),
        }
    }
}

/// Represents a staff token record from the database.
///
/// # Database Table
///
/// Maps to `tables::STAFF_TOKENS`. The table also holds `token_hash`
/// (SHA-256 of the bearer token, 64 hex characters) and `is_active`;
/// inactive tokens are rejected, which revokes access without deleting
/// the record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffToken {
    pub id: Uuid,
    pub staff_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/tokens`.
#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub staff_name: String,
    pub role: StaffRole,
}

/// Response for token issuance. The plaintext `token` is shown only here.
#[derive(Debug, Serialize)]
pub struct IssuedTokenResponse {
    pub id: Uuid,
    pub staff_name: String,
    pub role: StaffRole,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(StaffRole::Admin.can_decide_loans());
        assert!(StaffRole::Admin.can_issue_tokens());
        assert!(!StaffRole::Officer.can_decide_loans());
        assert!(!StaffRole::Officer.can_issue_tokens());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("ADMIN".parse::<StaffRole>().unwrap(), StaffRole::Admin);
        assert_eq!("officer".parse::<StaffRole>().unwrap(), StaffRole::Officer);
        assert!("teller".parse::<StaffRole>().is_err());
    }
}
