//! Module principal pour le backend de l'application.
//! Contient le routeur, le middleware de session, la conversion des erreurs
//! en réponses HTTP et les handlers (publics et authentifiés).

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::services::Service;

pub mod errors;
pub mod handlers_auth;
pub mod handlers_unauth;
pub mod middlewares;
pub mod router;

/// État partagé par les handlers. Chaque opération prend le verrou en entier.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RwLock<Service>>,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        Self {
            service: Arc::new(RwLock::new(service)),
        }
    }
}
