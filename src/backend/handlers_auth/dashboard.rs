use axum::extract::State;
use axum::Json;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::services::dashboard::Dashboard;

pub async fn dashboard(State(state): State<AppState>, SessionUser(actor): SessionUser) -> ApiResult<Dashboard> {
    Ok(Json(state.service.read().await.dashboard(actor)?))
}
