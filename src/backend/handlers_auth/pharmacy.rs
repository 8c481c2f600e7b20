//! Médicaments, stock et délivrance

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{Dispensing, Medicine, Pk};
use crate::services::pharmacy::{
    DispenseForm, DispensingView, InventoryForm, InventoryView, MedicineForm, PharmacyDashboard,
    SelectOption, StockUpdate,
};
use crate::services::ServiceError;

pub async fn add_medicine(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<MedicineForm>,
) -> Result<(StatusCode, Json<Medicine>), ServiceError> {
    let medicine = state.service.write().await.add_medicine(actor, form)?;
    Ok((StatusCode::CREATED, Json(medicine)))
}

pub async fn medicines_for_select(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<Vec<SelectOption>> {
    Ok(Json(state.service.read().await.medicines_for_select(actor)?))
}

pub async fn add_inventory(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<InventoryForm>,
) -> Result<(StatusCode, Json<InventoryView>), ServiceError> {
    let item = state.service.write().await.add_inventory(actor, form)?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn inventory_list(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<Vec<InventoryView>> {
    Ok(Json(state.service.read().await.inventory_list(actor)?))
}

pub async fn inventory_status(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
) -> ApiResult<InventoryView> {
    Ok(Json(state.service.read().await.inventory_status(actor, id)?))
}

pub async fn update_stock(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(id): Path<Pk>,
    Json(changes): Json<StockUpdate>,
) -> ApiResult<InventoryView> {
    Ok(Json(state.service.write().await.update_stock(actor, id, changes)?))
}

pub async fn stock_alerts(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<Vec<InventoryView>> {
    Ok(Json(state.service.read().await.stock_alerts(actor)?))
}

pub async fn dispense(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(form): Json<DispenseForm>,
) -> Result<(StatusCode, Json<Dispensing>), ServiceError> {
    let dispensing = state.service.write().await.dispense(actor, form)?;
    Ok((StatusCode::CREATED, Json(dispensing)))
}

pub async fn dispensing_history(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<Vec<DispensingView>> {
    Ok(Json(state.service.read().await.dispensing_history(actor)?))
}

pub async fn pharmacy_dashboard(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<PharmacyDashboard> {
    Ok(Json(state.service.read().await.pharmacy_dashboard(actor)?))
}
