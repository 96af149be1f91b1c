//! Client (borrower) data models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a client record from the database.
///
/// `national_id` is unique across clients.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub national_id: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/clients`.
///
/// ```json
/// {
///   "full_name": "Wanjiru Kamau",
///   "phone_number": "254712345678",
///   "national_id": "12345678",
///   "email": "wanjiru@example.com"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub full_name: String,
    pub phone_number: String,
    pub national_id: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl CreateClientRequest {
    /// Required fields must be present and non-blank.
    pub fn validate(&self) -> Result<(), String> {
        require_non_blank("full_name", &self.full_name)?;
        require_non_blank("phone_number", &self.phone_number)?;
        require_non_blank("national_id", &self.national_id)?;
        Ok(())
    }
}

/// Request body for `PUT /api/v1/clients/{id}`. Absent fields are kept.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl UpdateClientRequest {
    /// Provided required fields may not be blanked out.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref v) = self.full_name {
            require_non_blank("full_name", v)?;
        }
        if let Some(ref v) = self.phone_number {
            require_non_blank("phone_number", v)?;
        }
        if let Some(ref v) = self.national_id {
            require_non_blank("national_id", v)?;
        }
        Ok(())
    }
}

/// Query string for `GET /api/v1/clients`.
#[derive(Debug, Default, Deserialize)]
pub struct ClientListQuery {
    /// Case-insensitive match on name, phone number or national id
    pub search: Option<String>,
}

fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateClientRequest {
        CreateClientRequest {
            full_name: "Wanjiru Kamau".to_string(),
            phone_number: "254712345678".to_string(),
            national_id: "12345678".to_string(),
            email: None,
            address: None,
        }
    }

    #[test]
    fn test_valid_client() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut req = request();
        req.national_id = "   ".to_string();
        assert_eq!(req.validate().unwrap_err(), "national_id is required");
    }

    #[test]
    fn test_update_cannot_blank_name() {
        let update = UpdateClientRequest {
            full_name: Some(String::new()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(UpdateClientRequest::default().validate().is_ok());
    }
}
