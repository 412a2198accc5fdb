use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::notifications::{CreateNotificationRequest, NotificationList, UnreadCount},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_any_role},
    models::{Notification, is_valid_notification_kind},
    realtime::{self, ServerEvent},
    response::{ApiResponse, Meta},
    routes::params::NotificationQuery,
    state::AppState,
};

/// Rows visible to the caller: their own plus global broadcasts.
pub async fn list_notifications(
    pool: &DbPool,
    user: &AuthUser,
    query: NotificationQuery,
) -> AppResult<ApiResponse<NotificationList>> {
    let (page, limit, offset) = query.pagination.normalize();

    if let Some(kind) = query.kind.as_ref().filter(|k| !k.is_empty()) {
        if !is_valid_notification_kind(kind) {
            return Err(AppError::BadRequest(format!(
                "Unknown notification kind: {kind}"
            )));
        }
    }

    let items = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE (user_id = $1 OR is_global)
          AND ($2::boolean IS NOT TRUE OR is_read = FALSE)
          AND ($3::text IS NULL OR kind = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user.user_id)
    .bind(query.unread_only)
    .bind(query.kind.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE (user_id = $1 OR is_global)
          AND ($2::boolean IS NOT TRUE OR is_read = FALSE)
          AND ($3::text IS NULL OR kind = $3)
        "#,
    )
    .bind(user.user_id)
    .bind(query.unread_only)
    .bind(query.kind.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Notifications",
        NotificationList { items },
        Some(meta),
    ))
}

pub async fn unread_count_for(pool: &DbPool, user_id: Uuid) -> AppResult<i64> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE (user_id = $1 OR is_global) AND is_read = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

pub async fn unread_count(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<UnreadCount>> {
    let count = unread_count_for(pool, user.user_id).await?;
    Ok(ApiResponse::success("Unread", UnreadCount { count }, None))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let updated: Option<Notification> = sqlx::query_as(
        r#"
        UPDATE notifications
        SET is_read = TRUE
        WHERE id = $1 AND (user_id = $2 OR is_global)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let notification = match updated {
        Some(n) => n,
        None => return Err(AppError::NotFound),
    };

    push_count(state, user.user_id).await?;
    Ok(ApiResponse::success("Marked read", notification, None))
}

pub async fn mark_all_read(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE (user_id = $1 OR is_global) AND is_read = FALSE",
    )
    .bind(user.user_id)
    .execute(&state.pool)
    .await?;

    push_count(state, user.user_id).await?;
    Ok(ApiResponse::success(
        "All read",
        serde_json::json!({ "updated": result.rows_affected() }),
        Some(Meta::empty()),
    ))
}

/// Admin/support-created notification: one user, or a global broadcast when
/// no user is named.
pub async fn create_notification(
    state: &AppState,
    actor: &AuthUser,
    payload: CreateNotificationRequest,
) -> AppResult<ApiResponse<Notification>> {
    ensure_any_role(actor, &["admin", "support"])?;

    let title = payload.title.trim().to_string();
    let message = payload.message.trim().to_string();
    if title.is_empty() || message.is_empty() {
        return Err(AppError::BadRequest("Title and message are required".into()));
    }

    let kind = payload.kind.unwrap_or_else(|| "system".to_string());
    if !is_valid_notification_kind(&kind) {
        return Err(AppError::BadRequest(format!(
            "Unknown notification kind: {kind}"
        )));
    }

    if let Some(user_id) = payload.user_id {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::BadRequest("Target user does not exist".into()));
        }
    }

    let notification = insert_and_push(state, payload.user_id, &title, &message, &kind).await?;

    audit::record(
        &state.pool,
        Some(actor.user_id),
        "notification_create",
        Some("notifications"),
        Some(serde_json::json!({
            "notification_id": notification.id,
            "global": notification.is_global,
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Notification created",
        notification,
        Some(Meta::empty()),
    ))
}

pub async fn notify_order_placed(
    state: &AppState,
    user_id: Uuid,
    order_code: &str,
) -> AppResult<()> {
    insert_and_push(
        state,
        Some(user_id),
        "Order placed",
        &format!("Order {order_code} has been received"),
        "order",
    )
    .await?;
    Ok(())
}

pub async fn notify_order_status(
    state: &AppState,
    user_id: Uuid,
    order_code: &str,
    status: &str,
) -> AppResult<()> {
    insert_and_push(
        state,
        Some(user_id),
        "Order update",
        &format!("Order {order_code} is now {status}"),
        "order",
    )
    .await?;
    Ok(())
}

/// Persist a notification row, then push it to the matching room along
/// with a fresh unread count. The push can land on zero sockets; the row
/// is still there over REST.
async fn insert_and_push(
    state: &AppState,
    user_id: Option<Uuid>,
    title: &str,
    message: &str,
    kind: &str,
) -> AppResult<Notification> {
    let notification: Notification = sqlx::query_as(
        r#"
        INSERT INTO notifications (id, user_id, is_global, title, message, kind)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(user_id.is_none())
    .bind(title)
    .bind(message)
    .bind(kind)
    .fetch_one(&state.pool)
    .await?;

    let payload = serde_json::to_value(&notification)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    match user_id {
        Some(uid) => {
            let room = realtime::user_room(uid);
            state
                .hub
                .publish(&room, ServerEvent::new_notification(payload))
                .await;
            push_count(state, uid).await?;
        }
        None => {
            state
                .hub
                .publish_global(ServerEvent::new_notification(payload))
                .await;
        }
    }

    Ok(notification)
}

async fn push_count(state: &AppState, user_id: Uuid) -> AppResult<()> {
    let count = unread_count_for(&state.pool, user_id).await?;
    state
        .hub
        .publish(
            &realtime::user_room(user_id),
            ServerEvent::unread_count(count),
        )
        .await;
    Ok(())
}
