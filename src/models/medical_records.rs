//! Dossiers médicaux, ordonnances et examens de laboratoire

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{AppointmentID, DoctorID, PatientID, Pk, RecordID, UserID};

/// Compte rendu d'une consultation
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("Record {record_id}")]
pub struct MedicalRecord {
    pub record_id: RecordID,
    pub patient: PatientID,
    pub doctor: DoctorID,
    pub appointment: Option<AppointmentID>,
    pub diagnosis: String,
    pub symptoms: String,
    pub treatment_plan: String,
    pub notes: String,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{medication_name} {dosage}")]
pub struct Prescription {
    pub id: Pk,
    pub medical_record: RecordID,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub is_dispensed: bool,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub dispensed_by: Option<UserID>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabTestStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl LabTestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_become(self, next: Self) -> bool {
        use LabTestStatus::*;

        matches!(
            (self, next),
            (Pending, InProgress | Completed | Cancelled) | (InProgress, Completed | Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{test_name} ({status})")]
pub struct LabTest {
    pub id: Pk,
    pub medical_record: RecordID,
    pub test_name: String,
    pub test_description: String,
    pub status: LabTestStatus,
    pub results: String,
    pub test_date: Option<DateTime<Utc>>,
    pub result_date: Option<DateTime<Utc>>,
}
