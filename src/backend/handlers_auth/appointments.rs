//! Rendez-vous, médecins et disponibilités

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{AppointmentID, AppointmentStatus, DoctorID, DoctorSchedule};
use crate::services::appointments::{
    AppointmentFilter, AppointmentForm, AppointmentList, AppointmentUpdate, AppointmentView,
    ConflictQuery, DoctorUpdate, DoctorView, ScheduleForm,
};
use crate::services::ServiceError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Cancellation {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub exclude: Option<AppointmentID>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<AppointmentForm>,
) -> Result<(StatusCode, Json<AppointmentView>), ServiceError> {
    let appointment = state.service.write().await.create_appointment(actor, form)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(filter): Query<AppointmentFilter>,
) -> ApiResult<AppointmentList> {
    Ok(Json(state.service.read().await.list_appointments(actor, filter)?))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<AppointmentID>,
) -> ApiResult<AppointmentView> {
    Ok(Json(state.service.read().await.get_appointment(actor, &id)?))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<AppointmentID>,
    Json(changes): Json<AppointmentUpdate>,
) -> ApiResult<AppointmentView> {
    Ok(Json(state.service.write().await.update_appointment(actor, &id, changes)?))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<AppointmentID>,
) -> Result<StatusCode, ServiceError> {
    state.service.write().await.delete_appointment(actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn confirm_appointment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<AppointmentID>,
) -> ApiResult<AppointmentView> {
    Ok(Json(state.service.write().await.confirm_appointment(actor, &id)?))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<AppointmentID>,
    Json(cancellation): Json<Cancellation>,
) -> ApiResult<AppointmentView> {
    Ok(Json(state.service.write().await.cancel_appointment(
        actor,
        &id,
        cancellation.reason.as_deref(),
    )?))
}

pub async fn set_status(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<AppointmentID>,
    Json(change): Json<StatusChange>,
) -> ApiResult<AppointmentView> {
    Ok(Json(state.service.write().await.set_appointment_status(actor, &id, change.status)?))
}

pub async fn check_conflicts(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(query): Query<ConflictQuery>,
) -> ApiResult<Vec<String>> {
    Ok(Json(state.service.read().await.check_conflicts(actor, query)?))
}

pub async fn list_doctors(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<Vec<DoctorView>> {
    Ok(Json(state.service.read().await.list_doctors(actor)?))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<DoctorID>,
) -> ApiResult<DoctorView> {
    Ok(Json(state.service.read().await.get_doctor(actor, &id)?))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<DoctorID>,
    Json(changes): Json<DoctorUpdate>,
) -> ApiResult<DoctorView> {
    Ok(Json(state.service.write().await.update_doctor_profile(actor, &id, changes)?))
}

pub async fn set_schedule(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<DoctorID>,
    Json(form): Json<ScheduleForm>,
) -> ApiResult<DoctorSchedule> {
    Ok(Json(state.service.write().await.set_schedule(actor, &id, form)?))
}

pub async fn available_slots(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<DoctorID>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<Vec<String>> {
    Ok(Json(state.service.read().await.available_slots(
        actor,
        &id,
        query.date,
        query.exclude.as_ref(),
    )?))
}
