//! Gestion des routes accessibles sans authentification:
//! accueil, inscription, connexion et déconnexion.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::backend::AppState;
use crate::consts::SESSION_USER_KEY;
use crate::models::UserID;
use crate::services::accounts::Registration;
use crate::utils::error_messages::SESSION_ERROR;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Ouvre la session de l'utilisateur
fn open_session(session: &Session, user: UserID) -> axum::response::Result<()> {
    session.insert(SESSION_USER_KEY, user).map_err(|e| {
        warn!("Cannot open session: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": SESSION_ERROR })))
    })?;
    Ok(())
}

/// Page d'accueil de l'API
pub async fn index(session: Session) -> Json<Value> {
    let logged_in = matches!(session.get::<UserID>(SESSION_USER_KEY), Ok(Some(_)));
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "logged_in": logged_in,
    }))
}

/// Inscription d'un patient; la session est ouverte directement
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<Registration>,
) -> axum::response::Result<impl IntoResponse> {
    let user = state.service.write().await.register(registration)?;
    open_session(&session, user)?;

    Ok((StatusCode::CREATED, Json(json!({ "user_id": user }))))
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> axum::response::Result<Json<Value>> {
    let user = state
        .service
        .read()
        .await
        .login(&credentials.email, &credentials.password)?;
    open_session(&session, user)?;

    Ok(Json(json!({ "user_id": user })))
}

pub async fn logout(session: Session) -> StatusCode {
    match session.remove::<UserID>(SESSION_USER_KEY) {
        Ok(Some(user)) => info!("User {user} logged out"),
        Ok(None) => (),
        Err(e) => warn!("Cannot close session: {e}"),
    }
    StatusCode::NO_CONTENT
}
