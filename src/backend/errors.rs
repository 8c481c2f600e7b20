//! Conversion des erreurs de service en réponses JSON `{"error": ...}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;

use crate::db::DBError;
use crate::services::{LoginError, ServiceError};
use crate::utils::error_messages::INTERNAL_ERROR;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ServiceError::DBError(DBError::NotFound { .. } | DBError::InvalidUserID(_)) => StatusCode::NOT_FOUND,
            ServiceError::DBError(DBError::UserAlreadyExists { .. })
            | ServiceError::UserAlreadyExists
            | ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::InvalidInput(_)
            | ServiceError::WeakPassword
            | ServiceError::InvalidTransition { .. }
            | ServiceError::InvalidState(_)
            | ServiceError::PaymentRejected(_)
            | ServiceError::InsufficientStock { .. }
            | ServiceError::MissingProfile(_) => StatusCode::BAD_REQUEST,
            ServiceError::Hashing(_) | ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {self:?}");
            INTERNAL_ERROR.to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AccessDenied;
    use crate::utils::input_validation::InvalidInput;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::from(AccessDenied).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServiceError::from(DBError::NotFound {
                kind: "Bill",
                id: "BILL202401150001".into(),
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ServiceError::Conflict(vec![]).status(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::from(InvalidInput("email")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::InsufficientStock {
                available: 1,
                requested: 2,
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::from(std::io::Error::other("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_not_leaked() {
        let response = ServiceError::from(std::io::Error::other("/var/lib/hms is read-only")).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Internal server error"}"#);
    }
}
