//! Modèle de données
//!
//! Identifiants, rôles et entités de chaque domaine. Les profils (patient,
//! médecin, caissier, pharmacien) sont indexés par leur code métier et
//! référencent l'utilisateur qui les porte.

pub mod accounts;
pub mod appointments;
pub mod billing;
pub mod medical_records;
pub mod money;
pub mod notifications;
pub mod patients;
pub mod pharmacy;

pub use accounts::*;
pub use appointments::*;
pub use billing::*;
pub use medical_records::*;
pub use money::Money;
pub use notifications::*;
pub use patients::*;
pub use pharmacy::*;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

/// Clé numérique des tables secondaires (ordonnances, stock, notifications...)
pub type Pk = u64;

/// Rôle d'un utilisateur
#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumString,
    AsRefStr,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Pharmacist,
    BillingStaff,
    Administrator,
}

/// Un identifiant unique d'utilisateur.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Display,
)]
pub struct UserID(Uuid);

impl UserID {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserID {
    fn default() -> Self {
        Self::new()
    }
}

/// Déclare un identifiant métier textuel (`PAT00001`, `BILL202401150001`...)
macro_rules! code_id {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Serialize, Deserialize, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Display,
            )]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl From<String> for $name {
                fn from(code: String) -> Self {
                    Self(code)
                }
            }

            impl From<&str> for $name {
                fn from(code: &str) -> Self {
                    Self(code.to_owned())
                }
            }
        )+
    };
}

code_id! {
    /// `PAT{n:05}`
    PatientID;
    /// `DOC{n:05}`
    DoctorID;
    /// `BS{n:06}`
    StaffID;
    /// `PH{n:04}`
    PharmacistID;
    /// `APT-{YYYYMMDD}-{XXXXXXXX}`
    AppointmentID;
    /// `BILL{YYYYMMDD}{nnnn}`
    BillID;
    /// `PAY{YYYYMMDD}{XXXXXXXX}`
    PaymentID;
    /// `MR{YYYYMMDD}{nnnn}`
    RecordID;
}

/// Huit caractères hexadécimaux majuscules tirés d'un UUID aléatoire
pub(crate) fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
