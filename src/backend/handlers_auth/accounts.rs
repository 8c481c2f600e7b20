//! Compte courant et administration des utilisateurs

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::ApiResult;
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::models::{Role, UserID, UserView};
use crate::services::accounts::{AccountUpdate, Me, Profile, ProfileData};

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
    #[serde(flatten)]
    pub profile: ProfileData,
}

#[derive(Debug, Deserialize)]
pub struct Activation {
    pub active: bool,
}

pub async fn me(State(state): State<AppState>, SessionUser(actor): SessionUser) -> ApiResult<Me> {
    Ok(Json(state.service.read().await.me(actor)?))
}

pub async fn update_me(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Json(changes): Json<AccountUpdate>,
) -> ApiResult<UserView> {
    Ok(Json(state.service.write().await.update_account(actor, changes)?))
}

pub async fn list_users(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Query(query): Query<RoleQuery>,
) -> ApiResult<Vec<UserView>> {
    Ok(Json(state.service.read().await.list_users(actor, query.role)?))
}

pub async fn role_statistics(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
) -> ApiResult<BTreeMap<Role, usize>> {
    Ok(Json(state.service.read().await.role_statistics(actor)?))
}

pub async fn update_role(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(target): Path<UserID>,
    Json(change): Json<RoleChange>,
) -> ApiResult<Profile> {
    Ok(Json(state.service.write().await.update_role(
        actor,
        target,
        change.role,
        change.profile,
    )?))
}

pub async fn set_active(
    State(state): State<AppState>,
    SessionUser(actor): SessionUser,
    Path(target): Path<UserID>,
    Json(activation): Json<Activation>,
) -> ApiResult<UserView> {
    Ok(Json(state.service.write().await.set_active(actor, target, activation.active)?))
}
