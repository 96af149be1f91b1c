//! Notification HTTP handlers.

use crate::{
    db::DbPool,
    error::AppError,
    extract::{ApiPath, ApiQuery},
    models::notification::{Notification, NotificationListQuery},
    services::notification_service,
};
use axum::{
    Json,
    extract::State,
};
use uuid::Uuid;

/// `GET /api/v1/notifications` - newest first, `?unread_only=true` to filter.
pub async fn list_notifications(
    State(pool): State<DbPool>,
    ApiQuery(query): ApiQuery<NotificationListQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = notification_service::list_notifications(&pool, query.unread_only).await?;

    Ok(Json(notifications))
}

/// `POST /api/v1/notifications/{id}/read`
pub async fn mark_notification_read(
    State(pool): State<DbPool>,
    ApiPath(notification_id): ApiPath<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = notification_service::mark_read(&pool, notification_id).await?;

    Ok(Json(notification))
}
