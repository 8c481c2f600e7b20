//! Dossiers patients et signes vitaux

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{PatientID, Pk, UserID};
use crate::utils::input_validation::PhoneNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, Display)]
pub enum Gender {
    M,
    F,
    O,
}

/// Un groupe sanguin ABO avec son rhésus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, Display)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    #[strum(serialize = "A+")]
    APos,
    #[serde(rename = "A-")]
    #[strum(serialize = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    #[strum(serialize = "B+")]
    BPos,
    #[serde(rename = "B-")]
    #[strum(serialize = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    #[strum(serialize = "AB+")]
    ABPos,
    #[serde(rename = "AB-")]
    #[strum(serialize = "AB-")]
    ABNeg,
    #[serde(rename = "O+")]
    #[strum(serialize = "O+")]
    OPos,
    #[serde(rename = "O-")]
    #[strum(serialize = "O-")]
    ONeg,
}

/// Le profil médical d'un patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientID,
    pub user: UserID,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: Option<PhoneNumber>,
    pub emergency_contact_relationship: String,
    pub insurance_provider: String,
    pub insurance_number: String,
    pub allergies: String,
    pub chronic_conditions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Une prise de signes vitaux. Toutes les mesures sont facultatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vitals {
    pub id: Pk,
    pub patient: PatientID,
    pub recorded_by: UserID,
    /// cm
    pub height: Option<f64>,
    /// kg
    pub weight: Option<f64>,
    pub blood_pressure_systolic: Option<u32>,
    pub blood_pressure_diastolic: Option<u32>,
    pub pulse_rate: Option<u32>,
    /// °C
    pub temperature: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl Vitals {
    /// Indice de masse corporelle, arrondi au dixième
    pub fn bmi(&self) -> Option<f64> {
        let height_m = self.height? / 100.0;
        let weight = self.weight?;
        if height_m <= 0.0 {
            return None;
        }
        Some((weight / (height_m * height_m) * 10.0).round() / 10.0)
    }
}
