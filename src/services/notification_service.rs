use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::account::NotificationList,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Notification,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

/// Best-effort insert; a lost notification should never fail the request
/// that produced it.
pub async fn notify(
    pool: &DbPool,
    user_id: Uuid,
    kind: &str,
    title: &str,
    message: &str,
    link: Option<&str>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, message, link)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(kind)
    .bind(title)
    .bind(message)
    .bind(link)
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(error = %err, "notification insert failed");
    }
}

pub async fn list_notifications(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<NotificationList>> {
    let (page, limit, offset) = pagination.normalize();
    let items: Vec<Notification> = sqlx::query_as(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Notifications",
        NotificationList { items },
        Some(meta),
    ))
}

pub async fn mark_read(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let notification: Option<Notification> = sqlx::query_as(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    let notification = notification.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Marked read", notification, Some(Meta::empty())))
}

pub async fn mark_all_read(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1")
        .bind(user.user_id)
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "All marked read",
        serde_json::json!({ "updated": result.rows_affected() }),
        Some(Meta::empty()),
    ))
}
