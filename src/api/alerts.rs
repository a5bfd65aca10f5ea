use actix::Addr;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::actors::{NotificationHub, RecentNotifications, DEFAULT_CAPACITY};
use crate::domain::order::{OrderError, OrderService};
use crate::models::AlertStatus;
use super::response::ApiResponse;

// ============================================================================
// Alert & Notification Handlers
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    status: Option<String>,
}

pub async fn list_alerts(
    service: web::Data<OrderService>,
    query: web::Query<AlertQuery>,
) -> Result<HttpResponse, OrderError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            AlertStatus::parse(raw)
                .ok_or_else(|| OrderError::validation(format!("invalid alert status: {}", raw)))?,
        ),
        None => None,
    };

    let alerts = service.list_alerts(status).await?;
    Ok(ApiResponse::ok(alerts).respond(StatusCode::OK))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    limit: Option<usize>,
}

pub async fn recent_notifications(
    hub: web::Data<Addr<NotificationHub>>,
    query: web::Query<NotificationQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(20).clamp(1, DEFAULT_CAPACITY);

    match hub.send(RecentNotifications { limit }).await {
        Ok(recent) => ApiResponse::ok(recent).respond(StatusCode::OK),
        Err(e) => {
            tracing::error!(error = %e, "NotificationHub unavailable");
            ApiResponse::error("Notifications are unavailable", vec![])
                .respond(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
