//! Routes and handlers.

use std::{sync::Arc, time::Instant};

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use herald_scheduler::{Scheduler, SchedulerError};
use tracing::info;
use uuid::Uuid;

use crate::{
    ApiError,
    dto::{
        CreateNotificationRequest, MessageResponse, NotificationResponse, StatusResponse,
    },
};

/// Build the facade router over a scheduler.
pub fn router(scheduler: Arc<Scheduler>) -> Router {
    Router::new()
        .route("/api/v1/notify", post(create_notification))
        .route(
            "/api/v1/notify/{id}",
            get(notification_status).delete(cancel_notification),
        )
        .route("/api/v1/notifications", get(list_notifications))
        .layer(middleware::from_fn(log_requests))
        .with_state(scheduler)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Handled request"
    );
    response
}

/// An id that does not parse cannot name a record.
fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::Scheduler(SchedulerError::NotFound))
}

async fn create_notification(
    State(scheduler): State<Arc<Scheduler>>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    let request = request.into_domain()?;
    let record = scheduler.create(request).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn notification_status(
    State(scheduler): State<Arc<Scheduler>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = parse_id(&id)?;
    let status = scheduler.status(id).await?;
    Ok(Json(StatusResponse { id, status }))
}

async fn cancel_notification(
    State(scheduler): State<Arc<Scheduler>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    scheduler.cancel(id).await?;
    Ok(Json(MessageResponse {
        message: "notification cancelled successfully".to_string(),
    }))
}

async fn list_notifications(
    State(scheduler): State<Arc<Scheduler>>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let records = scheduler.list().await?;
    Ok(Json(
        records.into_iter().map(NotificationResponse::from).collect(),
    ))
}
