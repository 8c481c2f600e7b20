use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{Notification, NotificationTemplate, Pk};
use crate::services::notifications::{AlertReport, SystemAlert, TemplateForm};
use crate::services::ServiceError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InboxQuery {
    pub unread_only: bool,
}

pub async fn my_notifications(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Vec<Notification>> {
    Ok(Json(state.service.read().await.my_notifications(actor, query.unread_only)?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
) -> ApiResult<Notification> {
    Ok(Json(state.service.write().await.mark_read(actor, id)?))
}

pub async fn create_template(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<TemplateForm>,
) -> Result<(StatusCode, Json<NotificationTemplate>), ServiceError> {
    let template = state.service.write().await.create_template(actor, form)?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn list_templates(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<Vec<NotificationTemplate>> {
    Ok(Json(state.service.read().await.list_templates(actor)?))
}

pub async fn send_system_alert(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(alert): Json<SystemAlert>,
) -> ApiResult<AlertReport> {
    Ok(Json(state.service.write().await.send_system_alert(actor, alert)?))
}
