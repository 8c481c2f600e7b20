//! Dossiers patients et signes vitaux

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{Patient, PatientID, Vitals};
use crate::services::patients::{PatientForm, PatientSummary, PatientUpdate, PatientView, VitalsForm};
use crate::services::ServiceError;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn create_patient(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<PatientForm>,
) -> Result<(StatusCode, Json<Patient>), ServiceError> {
    let patient = state.service.write().await.create_patient(actor, form)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn search_patients(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<PatientSummary>> {
    Ok(Json(state.service.read().await.search_patients(actor, &query.q)?))
}

pub async fn get_patient(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<PatientID>,
) -> ApiResult<PatientView> {
    Ok(Json(state.service.read().await.get_patient(actor, &id)?))
}

pub async fn update_patient(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<PatientID>,
    Json(changes): Json<PatientUpdate>,
) -> ApiResult<PatientView> {
    Ok(Json(state.service.write().await.update_patient(actor, &id, changes)?))
}

pub async fn record_vitals(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<PatientID>,
    Json(form): Json<VitalsForm>,
) -> Result<(StatusCode, Json<Vitals>), ServiceError> {
    let vitals = state.service.write().await.record_vitals(actor, &id, form)?;
    Ok((StatusCode::CREATED, Json(vitals)))
}

pub async fn vitals_history(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<PatientID>,
) -> ApiResult<Vec<Vitals>> {
    Ok(Json(state.service.read().await.vitals_history(actor, &id)?))
}
