//! Gestion des routes nécessitant une authentification utilisateur.
//! Chaque handler lit l'utilisateur de la session et délègue au service,
//! qui vérifie les droits.

pub mod accounts;
pub mod appointments;
pub mod billing;
pub mod dashboard;
pub mod medical_records;
pub mod notifications;
pub mod patients;
pub mod pharmacy;

use axum::Json;

use crate::services::ServiceError;

/// Réponse JSON d'un handler authentifié
pub type ApiResult<T> = Result<Json<T>, ServiceError>;
