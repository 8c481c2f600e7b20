//! API d'accès aux données, et point d'entrée unique pour le contrôle d'accès.
//!
//! Chaque opération reçoit l'utilisateur qui agit, vérifie ses droits auprès
//! de Casbin, modifie la base puis la sauvegarde. Le service vit derrière un
//! verrou en écriture: une opération s'exécute en entier ou pas du tout.

pub mod accounts;
pub mod appointments;
pub mod billing;
pub mod dashboard;
pub mod medical_records;
pub mod notifications;
pub mod patients;
pub mod pharmacy;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::error;
use thiserror::Error;

use crate::authorization::{AccessDenied, Context, Enforcer, Parties, Principal};
use crate::db::{DBError, Database};
use crate::models::*;
use crate::utils::input_validation::InvalidInput;
use crate::utils::password_utils::HashError;

/// Source de l'heure courante, remplaçable dans les tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Service {
    db: Database,
    enforcer: Enforcer,
    clock: Clock,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error("User already registered")]
    UserAlreadyExists,

    #[error(transparent)]
    DBError(#[from] DBError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error("Password too weak")]
    WeakPassword,

    #[error("Scheduling conflict: {}", .0.join("; "))]
    Conflict(Vec<String>),

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("Payment rejected: {0}")]
    PaymentRejected(&'static str),

    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },

    #[error("No {0} profile for this account")]
    MissingProfile(&'static str),

    #[error("Password hashing failed")]
    Hashing(HashError),

    #[error("Storage failure")]
    Storage(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Invalid email or password")]
    InvalidCredentials,
}

impl From<HashError> for ServiceError {
    fn from(e: HashError) -> Self {
        ServiceError::Hashing(e)
    }
}

impl Service {
    pub fn new(db: Database, enforcer: Enforcer) -> Self {
        let mut service = Self {
            db,
            enforcer,
            clock: Arc::new(Utc::now),
        };
        service.install_default_templates();
        service
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        self.db.save()
    }

    /// Sauvegarde après une opération réussie
    fn commit(&self) -> Result<(), ServiceError> {
        self.db.save().map_err(|e| {
            error!("Failed to save database: {e}");
            ServiceError::Storage(e)
        })
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Le sujet Casbin correspondant à un compte actif
    fn principal(&self, actor: UserID) -> Result<Principal, ServiceError> {
        match self.db.get_user(actor) {
            Ok(user) if user.is_active => Ok(Principal {
                id: user.id,
                role: user.role,
            }),
            _ => Err(AccessDenied.into()),
        }
    }

    /// Crée un contexte d'autorisation ayant l'acteur comme sujet
    fn enforce(&self, actor: UserID) -> Result<Context<'_>, ServiceError> {
        let subject = self.principal(actor)?;
        Ok(self.enforcer.with_subject(subject))
    }

    fn patient_user(&self, patient: &PatientID) -> Result<UserID, ServiceError> {
        Ok(self.db.get_patient(patient)?.user)
    }

    fn doctor_user(&self, doctor: &DoctorID) -> Result<UserID, ServiceError> {
        Ok(self.db.get_doctor(doctor)?.user)
    }

    /// Patient et médecin concernés par un dossier ou un rendez-vous
    fn care_parties(&self, patient: &PatientID, doctor: Option<&DoctorID>) -> Result<Parties, ServiceError> {
        let patient = self.patient_user(patient)?;
        let doctor = doctor.map(|d| self.doctor_user(d)).transpose()?;
        Ok(Parties::care(Some(patient), doctor))
    }

    fn actor_doctor(&self, actor: UserID) -> Result<&Doctor, ServiceError> {
        self.db
            .doctor_by_user(actor)
            .ok_or(ServiceError::MissingProfile("doctor"))
    }

    fn actor_patient(&self, actor: UserID) -> Result<&Patient, ServiceError> {
        self.db
            .patient_by_user(actor)
            .ok_or(ServiceError::MissingProfile("patient"))
    }

    fn full_name(&self, user: UserID) -> String {
        self.db
            .get_user(user)
            .map(User::full_name)
            .unwrap_or_default()
    }

    /// Recherche insensible à la casse sur le code et le nom du titulaire.
    /// `query` est déjà en minuscules.
    fn holder_matches(&self, code: &str, user: UserID, query: &str) -> bool {
        code.to_lowercase().contains(query) || self.full_name(user).to_lowercase().contains(query)
    }

    fn patient_matches(&self, patient: &PatientID, query: &str) -> bool {
        self.db
            .get_patient(patient)
            .is_ok_and(|p| self.holder_matches(patient.as_str(), p.user, query))
    }

    fn doctor_matches(&self, doctor: &DoctorID, query: &str) -> bool {
        self.db
            .get_doctor(doctor)
            .is_ok_and(|d| self.holder_matches(doctor.as_str(), d.user, query))
    }
}
