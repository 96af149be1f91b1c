//! Notification service.
//!
//! Notifications are written after the state change they describe has
//! been committed, as a separate insert. A failed insert never undoes
//! the change; callers use [`notify_best_effort`] and the failure is
//! logged.

use crate::{
    db::DbPool,
    error::AppError,
    models::notification::{NewNotification, Notification},
    tables,
};
use uuid::Uuid;

/// Most notifications returned by a single list call.
const LIST_LIMIT: i64 = 100;

/// Insert a notification row.
pub async fn create_notification(
    pool: &DbPool,
    notification: &NewNotification,
) -> Result<Notification, AppError> {
    let sql = format!(
        r#"
        INSERT INTO {} (loan_id, client_id, kind, message)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
        tables::NOTIFICATIONS
    );

    let row = sqlx::query_as::<_, Notification>(&sql)
        .bind(notification.loan_id)
        .bind(notification.client_id)
        .bind(notification.kind)
        .bind(&notification.message)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Insert a notification, logging instead of failing.
pub async fn notify_best_effort(pool: &DbPool, notification: NewNotification) {
    if let Err(e) = create_notification(pool, &notification).await {
        tracing::error!(
            kind = notification.kind,
            loan_id = ?notification.loan_id,
            error = ?e,
            "Failed to record notification"
        );
    }
}

/// List notifications, newest first.
pub async fn list_notifications(
    pool: &DbPool,
    unread_only: bool,
) -> Result<Vec<Notification>, AppError> {
    let sql = format!(
        r#"
        SELECT * FROM {}
        WHERE ($1 = false OR is_read = false)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
        tables::NOTIFICATIONS
    );

    let rows = sqlx::query_as::<_, Notification>(&sql)
        .bind(unread_only)
        .bind(LIST_LIMIT)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Mark a notification as read.
pub async fn mark_read(pool: &DbPool, notification_id: Uuid) -> Result<Notification, AppError> {
    let sql = format!(
        "UPDATE {} SET is_read = true WHERE id = $1 RETURNING *",
        tables::NOTIFICATIONS
    );

    sqlx::query_as::<_, Notification>(&sql)
        .bind(notification_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Notification"))
}
