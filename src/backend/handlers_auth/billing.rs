//! Factures, paiements et catalogue des services

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{BillID, Payment, PatientID, Pk, ServiceType};
use crate::services::billing::{
    BillEdit, BillFilter, BillForm, BillPage, BillView, BillingDashboard, BillingReport, ItemForm,
    PaymentFilter, PaymentForm, RevenuePeriod, RevenueReport, ServiceTypeFilter, ServiceTypeForm,
    ServiceTypeUpdate, Totals,
};
use crate::services::ServiceError;

#[derive(Debug, Deserialize)]
pub struct ItemList {
    pub items: Vec<ItemForm>,
}

#[derive(Debug, Deserialize)]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct OverdueReport {
    pub marked: usize,
}

pub async fn create_bill(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<BillForm>,
) -> Result<(StatusCode, Json<BillView>), ServiceError> {
    let bill = state.service.write().await.create_bill(actor, form)?;
    Ok((StatusCode::CREATED, Json(bill)))
}

pub async fn list_bills(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(filter): Query<BillFilter>,
) -> ApiResult<BillPage> {
    Ok(Json(state.service.read().await.list_bills(actor, filter)?))
}

pub async fn get_bill(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<BillID>,
) -> ApiResult<BillView> {
    Ok(Json(state.service.read().await.get_bill(actor, &id)?))
}

pub async fn edit_bill(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<BillID>,
    Json(edit): Json<BillEdit>,
) -> ApiResult<BillView> {
    Ok(Json(state.service.write().await.edit_bill(actor, &id, edit)?))
}

pub async fn process_payment(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<BillID>,
    Json(form): Json<PaymentForm>,
) -> Result<(StatusCode, Json<Payment>), ServiceError> {
    let payment = state.service.write().await.process_payment(actor, &id, form)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn cancel_bill(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<BillID>,
) -> ApiResult<BillView> {
    Ok(Json(state.service.write().await.cancel_bill(actor, &id)?))
}

pub async fn mark_overdue(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<OverdueReport> {
    let marked = state.service.write().await.mark_overdue(actor)?;
    Ok(Json(OverdueReport { marked }))
}

pub async fn patient_pending_bills(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(patient): Path<PatientID>,
) -> ApiResult<Vec<BillView>> {
    Ok(Json(state.service.read().await.patient_pending_bills(actor, &patient)?))
}

pub async fn calculate_total(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(list): Json<ItemList>,
) -> ApiResult<Totals> {
    Ok(Json(state.service.read().await.calculate_total(actor, &list.items)?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Vec<Payment>> {
    Ok(Json(state.service.read().await.list_payments(actor, filter)?))
}

pub async fn billing_dashboard(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<BillingDashboard> {
    Ok(Json(state.service.read().await.billing_dashboard(actor)?))
}

pub async fn billing_report(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(period): Query<ReportPeriod>,
) -> ApiResult<BillingReport> {
    Ok(Json(state.service.read().await.billing_report(actor, period.from, period.to)?))
}

pub async fn revenue_report(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(period): Query<RevenuePeriod>,
) -> ApiResult<RevenueReport> {
    Ok(Json(state.service.read().await.revenue_report(actor, period)?))
}

pub async fn create_service_type(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<ServiceTypeForm>,
) -> Result<(StatusCode, Json<ServiceType>), ServiceError> {
    let service_type = state.service.write().await.create_service_type(actor, form)?;
    Ok((StatusCode::CREATED, Json(service_type)))
}

pub async fn update_service_type(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
    Json(changes): Json<ServiceTypeUpdate>,
) -> ApiResult<ServiceType> {
    Ok(Json(state.service.write().await.update_service_type(actor, id, changes)?))
}

pub async fn list_service_types(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(filter): Query<ServiceTypeFilter>,
) -> ApiResult<Vec<ServiceType>> {
    Ok(Json(state.service.read().await.list_service_types(actor, filter)?))
}
