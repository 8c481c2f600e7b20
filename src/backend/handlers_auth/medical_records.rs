//! Dossiers médicaux, ordonnances et examens de laboratoire

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{LabTest, LabTestStatus, PatientID, Pk, Prescription, RecordID};
use crate::services::medical_records::{
    LabTestFilter, LabTestForm, LabTestPage, PrescriptionForm, PrescriptionLine,
    PrescriptionState, PrescriptionUpdate, PrescriptionView, RecordFilter, RecordForm,
    RecordUpdate, RecordView, RecordsDashboard, DEFAULT_PRESCRIPTION_TEMPLATE,
};
use crate::services::ServiceError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PrescriptionQuery {
    pub status: Option<PrescriptionState>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    #[serde(rename = "type", default = "default_template")]
    pub kind: String,
}

fn default_template() -> String {
    DEFAULT_PRESCRIPTION_TEMPLATE.to_owned()
}

#[derive(Debug, Deserialize)]
pub struct LabStatusChange {
    pub status: LabTestStatus,
}

#[derive(Debug, Deserialize)]
pub struct LabResults {
    pub results: String,
}

pub async fn create_record(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(patient): Path<PatientID>,
    Json(form): Json<RecordForm>,
) -> Result<(StatusCode, Json<RecordView>), ServiceError> {
    let record = state.service.write().await.create_record(actor, &patient, form)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn patient_history(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(patient): Path<PatientID>,
) -> ApiResult<Vec<RecordView>> {
    Ok(Json(state.service.read().await.patient_history(actor, &patient)?))
}

pub async fn list_records(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Vec<RecordView>> {
    Ok(Json(state.service.read().await.list_records(actor, filter)?))
}

pub async fn records_dashboard(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<RecordsDashboard> {
    Ok(Json(state.service.read().await.records_dashboard(actor)?))
}

pub async fn get_record(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<RecordID>,
) -> ApiResult<RecordView> {
    Ok(Json(state.service.read().await.get_record(actor, &id)?))
}

pub async fn edit_record(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<RecordID>,
    Json(changes): Json<RecordUpdate>,
) -> ApiResult<RecordView> {
    Ok(Json(state.service.write().await.edit_record(actor, &id, changes)?))
}

pub async fn add_prescription(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(record): Path<RecordID>,
    Json(form): Json<PrescriptionForm>,
) -> Result<(StatusCode, Json<Prescription>), ServiceError> {
    let prescription = state.service.write().await.add_prescription(actor, &record, form)?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

pub async fn edit_prescription(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
    Json(changes): Json<PrescriptionUpdate>,
) -> ApiResult<Prescription> {
    Ok(Json(state.service.write().await.edit_prescription(actor, id, changes)?))
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(query): Query<PrescriptionQuery>,
) -> ApiResult<Vec<PrescriptionView>> {
    Ok(Json(state.service.read().await.list_prescriptions(actor, query.status)?))
}

pub async fn prescription_template(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Vec<PrescriptionLine>> {
    Ok(Json(state.service.read().await.prescription_template(actor, &query.kind)?))
}

pub async fn list_lab_tests(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(filter): Query<LabTestFilter>,
) -> ApiResult<LabTestPage> {
    Ok(Json(state.service.read().await.list_lab_tests(actor, filter)?))
}

pub async fn order_lab_test(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(record): Path<RecordID>,
    Json(form): Json<LabTestForm>,
) -> Result<(StatusCode, Json<LabTest>), ServiceError> {
    let test = state.service.write().await.order_lab_test(actor, &record, form)?;
    Ok((StatusCode::CREATED, Json(test)))
}

pub async fn update_lab_test_status(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
    Json(change): Json<LabStatusChange>,
) -> ApiResult<LabTest> {
    Ok(Json(state.service.write().await.update_lab_test_status(actor, id, change.status)?))
}

pub async fn record_lab_results(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
    Json(body): Json<LabResults>,
) -> ApiResult<LabTest> {
    Ok(Json(state.service.write().await.record_lab_results(actor, id, &body.results)?))
}
