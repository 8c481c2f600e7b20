//! Service de gestion hospitalière: patients, rendez-vous, facturation,
//! pharmacie et dossiers médicaux, derrière un contrôle d'accès par rôle.

pub mod authorization;
pub mod backend;
pub mod config;
pub mod consts;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;
