//! In-app notification models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a notification record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub loan_id: Option<Uuid>,
    pub client_id: Option<Uuid>,

    /// Event kind, e.g. `loan_approved` or `payment_received`
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub loan_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub kind: &'static str,
    pub message: String,
}

/// Query string for `GET /api/v1/notifications`.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
}
