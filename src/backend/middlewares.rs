//! Middleware pour gérer les sessions utilisateur.
//! Vérifie la validité d'une session utilisateur et rejette les requêtes non autorisées.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::consts::SESSION_USER_KEY;
use crate::models::UserID;
use crate::utils::error_messages::UNAUTHORIZED;

/// L'utilisateur connecté, lu depuis la session
pub struct SessionUser(pub UserID);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            if let Ok(Some(user)) = session.get::<UserID>(SESSION_USER_KEY) {
                return Ok(SessionUser(user));
            }
        }

        Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": UNAUTHORIZED }))))
    }
}
