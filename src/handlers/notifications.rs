use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Extension;
use futures::stream::Stream;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config;
use crate::database::models::Notification;
use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult, Paginated};
use crate::notify::registry;
use crate::services::notification_service::NotificationService;

use super::PageQuery;

/// GET /api/notifications
pub async fn list(
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<PageQuery>,
) -> Result<Paginated<Notification>, ApiError> {
    let (page, limit) = query.resolve();
    let service = NotificationService::new().await?;
    let (items, total) = service.list_for_user(principal.id, page, limit).await?;
    Ok(Paginated {
        items,
        page,
        limit,
        total,
    })
}

/// GET /api/notifications/unread-count
pub async fn unread_count(Extension(principal): Extension<AuthPrincipal>) -> ApiResult<Value> {
    let service = NotificationService::new().await?;
    let count = service.unread_count(principal.id).await?;
    Ok(ApiResponse::success(json!({ "unread": count })))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let service = NotificationService::new().await?;
    service.mark_read(principal.id, id).await?;
    Ok(ApiResponse::success(json!({})))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(Extension(principal): Extension<AuthPrincipal>) -> ApiResult<Value> {
    let service = NotificationService::new().await?;
    let marked = service.mark_all_read(principal.id).await?;
    Ok(ApiResponse::success(json!({ "marked": marked })))
}

/// GET /api/notifications/stream - Long-lived per-user event stream.
///
/// Registering evicts any previous connection for the user, and the
/// keep-alive comment keeps idle-timeout proxies from dropping the
/// connection. The stream ends when the registry evicts this connection or
/// the client goes away.
pub async fn stream(
    Extension(principal): Extension<AuthPrincipal>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = registry().register(principal.id);

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse_event = Event::default()
            .event("notification")
            .data(serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string()));
        Some((Ok::<_, Infallible>(sse_event), rx))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(config::config().notify.keepalive_secs))
            .text("keep-alive"),
    )
}
