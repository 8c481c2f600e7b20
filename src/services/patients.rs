//! Dossiers patients: création par le personnel, recherche, consultation,
//! mise à jour et signes vitaux.

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use super::accounts::ProfileData;
use super::{Service, ServiceError};
use crate::authorization::{Action, Parties};
use crate::consts::{SEARCH_MAX_RESULTS, SEARCH_MIN_CHARS};
use crate::models::*;
use crate::utils::input_validation::{optional_text, InvalidInput, PhoneNumber};

/// Champs du dossier patient; absents, ils restent inchangés
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientDetails {
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
    pub allergies: Option<String>,
    pub chronic_conditions: Option<String>,
}

/// Création d'un patient et de son compte par le personnel
#[derive(Debug, Clone, Deserialize)]
pub struct PatientForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub details: PatientDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientUpdate {
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub details: PatientDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VitalsForm {
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub blood_pressure_systolic: Option<u32>,
    pub blood_pressure_diastolic: Option<u32>,
    pub pulse_rate: Option<u32>,
    pub temperature: Option<f64>,
}

/// Résultat de recherche
#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub patient_id: PatientID,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<PhoneNumber>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientView {
    pub patient: Patient,
    pub user: UserView,
    pub latest_vitals: Option<Vitals>,
}

/// Champs validés, prêts à être appliqués
struct CleanDetails {
    gender: Option<Gender>,
    blood_group: Option<BloodGroup>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<Option<PhoneNumber>>,
    emergency_contact_relationship: Option<String>,
    insurance_provider: Option<String>,
    insurance_number: Option<String>,
    allergies: Option<String>,
    chronic_conditions: Option<String>,
}

fn optional_phone(phone: Option<&str>) -> Result<Option<Option<PhoneNumber>>, InvalidInput> {
    match phone.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(phone) => Ok(Some(Some(PhoneNumber::try_from(phone)?))),
    }
}

fn clean_field(value: &Option<String>, field: &'static str) -> Result<Option<String>, InvalidInput> {
    value
        .as_deref()
        .map(|v| optional_text(Some(v), field))
        .transpose()
}

impl PatientDetails {
    fn clean(&self) -> Result<CleanDetails, InvalidInput> {
        Ok(CleanDetails {
            gender: self.gender,
            blood_group: self.blood_group,
            emergency_contact_name: clean_field(&self.emergency_contact_name, "emergency contact name")?,
            emergency_contact_phone: optional_phone(self.emergency_contact_phone.as_deref())?,
            emergency_contact_relationship: clean_field(
                &self.emergency_contact_relationship,
                "emergency contact relationship",
            )?,
            insurance_provider: clean_field(&self.insurance_provider, "insurance provider")?,
            insurance_number: clean_field(&self.insurance_number, "insurance number")?,
            allergies: clean_field(&self.allergies, "allergies")?,
            chronic_conditions: clean_field(&self.chronic_conditions, "chronic conditions")?,
        })
    }
}

impl CleanDetails {
    fn apply(self, patient: &mut Patient) {
        if let Some(gender) = self.gender {
            patient.gender = gender;
        }
        if let Some(blood_group) = self.blood_group {
            patient.blood_group = Some(blood_group);
        }
        if let Some(name) = self.emergency_contact_name {
            patient.emergency_contact_name = name;
        }
        if let Some(phone) = self.emergency_contact_phone {
            patient.emergency_contact_phone = phone;
        }
        if let Some(relationship) = self.emergency_contact_relationship {
            patient.emergency_contact_relationship = relationship;
        }
        if let Some(provider) = self.insurance_provider {
            patient.insurance_provider = provider;
        }
        if let Some(number) = self.insurance_number {
            patient.insurance_number = number;
        }
        if let Some(allergies) = self.allergies {
            patient.allergies = allergies;
        }
        if let Some(conditions) = self.chronic_conditions {
            patient.chronic_conditions = conditions;
        }
    }
}

fn measure(value: Option<f64>, field: &'static str) -> Result<Option<f64>, InvalidInput> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(InvalidInput(field)),
        other => Ok(other),
    }
}

impl Service {
    /// Crée le compte et le dossier d'un nouveau patient en une étape
    pub fn create_patient(&mut self, actor: UserID, form: PatientForm) -> Result<Patient, ServiceError> {
        self.enforce(actor)?.authorize_global(Action::CreatePatient)?;

        let gender = form.details.gender.ok_or(InvalidInput("gender"))?;
        let details = form.details.clean()?;
        let phone = optional_phone(form.phone_number.as_deref())?.flatten();
        let address = optional_text(form.address.as_deref(), "address")?;

        let user = self.create_account(
            &form.email,
            &form.first_name,
            &form.last_name,
            &form.password,
            Role::Patient,
        )?;
        let account = self.db.get_user_mut(user)?;
        account.phone_number = phone;
        account.date_of_birth = form.date_of_birth;
        account.address = address;

        self.create_profile(
            user,
            Role::Patient,
            ProfileData {
                gender: Some(gender),
                ..ProfileData::default()
            },
        )?;

        let patient_id = self
            .db
            .patient_by_user(user)
            .map(|p| p.patient_id.clone())
            .ok_or(ServiceError::MissingProfile("patient"))?;
        let patient = self.db.get_patient_mut(&patient_id)?;
        details.apply(patient);
        let patient = patient.clone();

        info!("Patient {} registered by {actor}", patient.patient_id);
        self.commit()?;
        Ok(patient)
    }

    /// Recherche par nom, email ou code patient. Moins de deux caractères ne
    /// renvoient rien; au plus dix résultats.
    pub fn search_patients(&self, actor: UserID, query: &str) -> Result<Vec<PatientSummary>, ServiceError> {
        self.enforce(actor)?.authorize_global(Action::SearchPatients)?;

        let query = query.trim().to_lowercase();
        if query.chars().count() < SEARCH_MIN_CHARS {
            return Ok(Vec::new());
        }

        let mut results: Vec<PatientSummary> = self
            .db
            .list_patients()
            .filter_map(|patient| {
                let user = self.db.get_user(patient.user).ok()?;
                let matches = user.first_name.to_lowercase().contains(&query)
                    || user.last_name.to_lowercase().contains(&query)
                    || user.email.as_ref().contains(&query)
                    || patient.patient_id.as_str().to_lowercase().contains(&query);
                matches.then(|| PatientSummary {
                    patient_id: patient.patient_id.clone(),
                    full_name: user.full_name(),
                    email: user.email.to_string(),
                    phone_number: user.phone_number.clone(),
                })
            })
            .collect();

        results.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        results.truncate(SEARCH_MAX_RESULTS);
        Ok(results)
    }

    pub fn get_patient(&self, actor: UserID, id: &PatientID) -> Result<PatientView, ServiceError> {
        let owner = self.patient_user(id)?;
        self.enforce(actor)?
            .authorize(Action::ReadPatient, Parties::patient(owner))?;

        let patient = self.db.get_patient(id)?;
        let user = self.db.get_user(patient.user)?;
        let latest_vitals = self
            .db
            .list_vitals()
            .filter(|v| &v.patient == id)
            .max_by_key(|v| (v.recorded_at, v.id))
            .cloned();

        Ok(PatientView {
            patient: patient.clone(),
            user: UserView::from(user),
            latest_vitals,
        })
    }

    pub fn update_patient(
        &mut self,
        actor: UserID,
        id: &PatientID,
        changes: PatientUpdate,
    ) -> Result<PatientView, ServiceError> {
        let owner = self.patient_user(id)?;
        self.enforce(actor)?
            .authorize(Action::UpdatePatient, Parties::patient(owner))?;

        let details = changes.details.clean()?;
        let phone = optional_phone(changes.phone_number.as_deref())?;
        let address = clean_field(&changes.address, "address")?;
        let now = self.now();

        let patient = self.db.get_patient_mut(id)?;
        details.apply(patient);
        patient.updated_at = now;

        let user = self.db.get_user_mut(owner)?;
        if let Some(phone) = phone {
            user.phone_number = phone;
        }
        if let Some(dob) = changes.date_of_birth {
            user.date_of_birth = Some(dob);
        }
        if let Some(address) = address {
            user.address = address;
        }
        user.updated_at = now;

        self.commit()?;
        self.get_patient(actor, id)
    }

    pub fn record_vitals(&mut self, actor: UserID, id: &PatientID, form: VitalsForm) -> Result<Vitals, ServiceError> {
        let owner = self.patient_user(id)?;
        self.enforce(actor)?
            .authorize(Action::RecordVitals, Parties::patient(owner))?;

        let vitals = Vitals {
            id: self.db.allocate_pk(),
            patient: id.clone(),
            recorded_by: actor,
            height: measure(form.height, "height")?,
            weight: measure(form.weight, "weight")?,
            blood_pressure_systolic: form.blood_pressure_systolic,
            blood_pressure_diastolic: form.blood_pressure_diastolic,
            pulse_rate: form.pulse_rate,
            temperature: measure(form.temperature, "temperature")?,
            recorded_at: self.now(),
        };

        self.db.store_vitals(vitals.clone());
        self.commit()?;
        Ok(vitals)
    }

    /// Historique des signes vitaux, le plus récent d'abord
    pub fn vitals_history(&self, actor: UserID, id: &PatientID) -> Result<Vec<Vitals>, ServiceError> {
        let owner = self.patient_user(id)?;
        self.enforce(actor)?
            .authorize(Action::ReadPatient, Parties::patient(owner))?;

        let mut history: Vec<Vitals> = self
            .db
            .list_vitals()
            .filter(|v| &v.patient == id)
            .cloned()
            .collect();
        history.sort_by(|a, b| (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id)));
        Ok(history)
    }
}
