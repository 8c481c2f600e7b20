//! Dossiers médicaux, ordonnances et examens de laboratoire

use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Service, ServiceError};
use crate::authorization::{Action, Parties};
use crate::consts::{
    CRITICAL_SYSTOLIC, CRITICAL_TEMPERATURE, CRITICAL_VITALS_MAX, LAB_TEST_PAGE_SIZE, RECENT_LAB_TESTS,
    RECENT_RECORDS,
};
use crate::models::*;
use crate::utils::input_validation::{long_text, optional_text, short_text, InvalidInput};

#[derive(Debug, Clone, Deserialize)]
pub struct RecordForm {
    pub appointment: Option<AppointmentID>,
    pub diagnosis: String,
    pub symptoms: String,
    pub treatment_plan: String,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordUpdate {
    pub diagnosis: Option<String>,
    pub symptoms: Option<String>,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    pub patient: Option<String>,
    pub doctor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionForm {
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrescriptionUpdate {
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionState {
    Pending,
    Dispensed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabTestForm {
    pub test_name: String,
    pub test_description: Option<String>,
    pub test_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub patient_name: String,
    pub doctor_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prescriptions: Vec<Prescription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lab_tests: Vec<LabTest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub patient: PatientID,
    pub patient_name: String,
    pub doctor_name: String,
    pub prescribed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LabTestFilter {
    pub patient: Option<String>,
    pub status: Option<LabTestStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabTestView {
    #[serde(flatten)]
    pub test: LabTest,
    pub patient: PatientID,
    pub patient_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabTestPage {
    pub lab_tests: Vec<LabTestView>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

/// Signes vitaux au-delà des seuils d'alerte
#[derive(Debug, Clone, Serialize)]
pub struct CriticalVitals {
    #[serde(flatten)]
    pub vitals: Vitals,
    pub patient_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordsDashboard {
    pub records_today: usize,
    pub pending_lab_tests: usize,
    pub pending_prescriptions: usize,
    pub recent_records: Vec<RecordView>,
    pub recent_lab_tests: Vec<LabTestView>,
    pub critical_vitals: Vec<CriticalVitals>,
}

/// Une ligne d'ordonnance type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrescriptionLine {
    pub medication_name: &'static str,
    pub dosage: &'static str,
    pub frequency: &'static str,
    pub duration: &'static str,
    pub instructions: &'static str,
}

const fn line(
    medication_name: &'static str,
    dosage: &'static str,
    frequency: &'static str,
    duration: &'static str,
    instructions: &'static str,
) -> PrescriptionLine {
    PrescriptionLine {
        medication_name,
        dosage,
        frequency,
        duration,
        instructions,
    }
}

pub const DEFAULT_PRESCRIPTION_TEMPLATE: &str = "common_cold";

const PRESCRIPTION_TEMPLATES: [(&str, &[PrescriptionLine]); 3] = [
    (
        "common_cold",
        &[
            line("Paracetamol", "500mg", "Three times daily", "5 days", "Take with food"),
            line("Vitamin C", "1000mg", "Once daily", "7 days", "Take with water"),
        ],
    ),
    (
        "hypertension",
        &[
            line("Amlodipine", "5mg", "Once daily", "30 days", "Take in the morning"),
            line("Hydrochlorothiazide", "25mg", "Once daily", "30 days", "Take with breakfast"),
        ],
    ),
    (
        "diabetes",
        &[line("Metformin", "500mg", "Twice daily", "30 days", "Take with meals")],
    ),
];

fn is_critical(vitals: &Vitals) -> bool {
    vitals.blood_pressure_systolic.is_some_and(|s| s > CRITICAL_SYSTOLIC)
        || vitals.temperature.is_some_and(|t| t > CRITICAL_TEMPERATURE)
}

impl Service {
    fn record_parties(&self, record: &MedicalRecord) -> Result<Parties, ServiceError> {
        self.care_parties(&record.patient, Some(&record.doctor))
    }

    fn record_view(&self, record: &MedicalRecord, detailed: bool) -> RecordView {
        let patient_name = self
            .db
            .get_patient(&record.patient)
            .map(|p| self.full_name(p.user))
            .unwrap_or_default();
        let doctor_name = self
            .db
            .get_doctor(&record.doctor)
            .map(|d| self.full_name(d.user))
            .unwrap_or_default();

        let (prescriptions, lab_tests) = if detailed {
            let mut prescriptions: Vec<Prescription> =
                self.db.prescriptions_for(&record.record_id).cloned().collect();
            prescriptions.sort_by_key(|p| p.id);
            let mut lab_tests: Vec<LabTest> = self.db.lab_tests_for(&record.record_id).cloned().collect();
            lab_tests.sort_by_key(|t| t.id);
            (prescriptions, lab_tests)
        } else {
            (Vec::new(), Vec::new())
        };

        RecordView {
            record: record.clone(),
            patient_name,
            doctor_name,
            prescriptions,
            lab_tests,
        }
    }

    fn prescription_view(&self, prescription: &Prescription) -> Option<PrescriptionView> {
        let record = self.db.get_record(&prescription.medical_record).ok()?;
        let view = self.record_view(record, false);
        Some(PrescriptionView {
            prescription: prescription.clone(),
            patient: record.patient.clone(),
            patient_name: view.patient_name,
            doctor_name: view.doctor_name,
            prescribed_at: record.created_at,
        })
    }

    /// Nouveau dossier rédigé par le médecin qui agit
    pub fn create_record(
        &mut self,
        actor: UserID,
        patient: &PatientID,
        form: RecordForm,
    ) -> Result<RecordView, ServiceError> {
        let patient_user = self.patient_user(patient)?;
        self.enforce(actor)?
            .authorize(Action::CreateRecord, Parties::care(Some(patient_user), Some(actor)))?;
        let doctor = self.actor_doctor(actor)?.doctor_id.clone();

        if let Some(appointment) = &form.appointment {
            if &self.db.get_appointment(appointment)?.patient != patient {
                return Err(InvalidInput("appointment").into());
            }
        }

        let now = self.now();
        let today = now.date_naive();
        let record = MedicalRecord {
            record_id: RecordID::from(format!(
                "MR{}{:04}",
                today.format("%Y%m%d"),
                self.db.records_created_on(today) + 1
            )),
            patient: patient.clone(),
            doctor,
            appointment: form.appointment,
            diagnosis: long_text(&form.diagnosis, "diagnosis")?,
            symptoms: long_text(&form.symptoms, "symptoms")?,
            treatment_plan: long_text(&form.treatment_plan, "treatment plan")?,
            notes: optional_text(form.notes.as_deref(), "notes")?,
            follow_up_date: form.follow_up_date,
            created_at: now,
        };

        info!("Medical record {} created for {patient}", record.record_id);
        let view = self.record_view(&record, true);
        self.db.store_record(record);
        self.commit()?;
        Ok(view)
    }

    pub fn get_record(&self, actor: UserID, id: &RecordID) -> Result<RecordView, ServiceError> {
        let record = self.db.get_record(id)?;
        self.enforce(actor)?
            .authorize(Action::ReadRecord, self.record_parties(record)?)?;

        Ok(self.record_view(record, true))
    }

    pub fn edit_record(&mut self, actor: UserID, id: &RecordID, changes: RecordUpdate) -> Result<RecordView, ServiceError> {
        let parties = self.record_parties(self.db.get_record(id)?)?;
        self.enforce(actor)?
            .authorize(Action::EditRecord, parties)?;

        let diagnosis = changes.diagnosis.map(|d| long_text(&d, "diagnosis")).transpose()?;
        let symptoms = changes.symptoms.map(|s| long_text(&s, "symptoms")).transpose()?;
        let treatment_plan = changes
            .treatment_plan
            .map(|t| long_text(&t, "treatment plan"))
            .transpose()?;
        let notes = changes
            .notes
            .map(|n| optional_text(Some(&n), "notes"))
            .transpose()?;

        let record = self.db.get_record_mut(id)?;
        if let Some(diagnosis) = diagnosis {
            record.diagnosis = diagnosis;
        }
        if let Some(symptoms) = symptoms {
            record.symptoms = symptoms;
        }
        if let Some(plan) = treatment_plan {
            record.treatment_plan = plan;
        }
        if let Some(notes) = notes {
            record.notes = notes;
        }
        if changes.follow_up_date.is_some() {
            record.follow_up_date = changes.follow_up_date;
        }
        let record = record.clone();

        self.commit()?;
        Ok(self.record_view(&record, true))
    }

    /// Historique d'un patient, le plus récent d'abord
    pub fn patient_history(&self, actor: UserID, patient: &PatientID) -> Result<Vec<RecordView>, ServiceError> {
        let parties = self.care_parties(patient, None)?;
        self.enforce(actor)?
            .authorize(Action::ReadRecord, parties)?;

        let mut records: Vec<&MedicalRecord> = self
            .db
            .list_records()
            .filter(|r| &r.patient == patient)
            .collect();
        records.sort_by(|a, b| (b.created_at, &b.record_id).cmp(&(a.created_at, &a.record_id)));
        Ok(records.into_iter().map(|r| self.record_view(r, false)).collect())
    }

    pub fn list_records(&self, actor: UserID, filter: RecordFilter) -> Result<Vec<RecordView>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ListRecords)?;

        let lower = |q: &Option<String>| q.as_deref().map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
        let patient_query = lower(&filter.patient);
        let doctor_query = lower(&filter.doctor);

        let mut records: Vec<&MedicalRecord> = self
            .db
            .list_records()
            .filter(|r| {
                patient_query
                    .as_deref()
                    .map_or(true, |q| self.patient_matches(&r.patient, q))
            })
            .filter(|r| {
                doctor_query
                    .as_deref()
                    .map_or(true, |q| self.doctor_matches(&r.doctor, q))
            })
            .collect();
        records.sort_by(|a, b| (b.created_at, &b.record_id).cmp(&(a.created_at, &a.record_id)));
        Ok(records.into_iter().map(|r| self.record_view(r, false)).collect())
    }

    pub fn add_prescription(
        &mut self,
        actor: UserID,
        record: &RecordID,
        form: PrescriptionForm,
    ) -> Result<Prescription, ServiceError> {
        let parties = self.record_parties(self.db.get_record(record)?)?;
        self.enforce(actor)?
            .authorize(Action::AddPrescription, parties)?;

        let medication_name = short_text(&form.medication_name, "medication name")?;
        let dosage = short_text(&form.dosage, "dosage")?;
        let frequency = short_text(&form.frequency, "frequency")?;
        let duration = short_text(&form.duration, "duration")?;
        let instructions = optional_text(form.instructions.as_deref(), "instructions")?;

        let prescription = Prescription {
            id: self.db.allocate_pk(),
            medical_record: record.clone(),
            medication_name,
            dosage,
            frequency,
            duration,
            instructions,
            is_dispensed: false,
            dispensed_at: None,
            dispensed_by: None,
        };

        self.db.store_prescription(prescription.clone());
        self.commit()?;
        Ok(prescription)
    }

    /// Une ordonnance délivrée n'est plus modifiable
    pub fn edit_prescription(
        &mut self,
        actor: UserID,
        id: Pk,
        changes: PrescriptionUpdate,
    ) -> Result<Prescription, ServiceError> {
        let current = self.db.get_prescription(&id)?;
        let parties = self.record_parties(self.db.get_record(&current.medical_record)?)?;
        self.enforce(actor)?
            .authorize(Action::EditPrescription, parties)?;
        if current.is_dispensed {
            return Err(ServiceError::InvalidState("Prescription already dispensed"));
        }

        let text = |value: Option<String>, field| value.map(|v| short_text(&v, field)).transpose();
        let medication_name = text(changes.medication_name, "medication name")?;
        let dosage = text(changes.dosage, "dosage")?;
        let frequency = text(changes.frequency, "frequency")?;
        let duration = text(changes.duration, "duration")?;
        let instructions = changes
            .instructions
            .map(|i| optional_text(Some(&i), "instructions"))
            .transpose()?;

        let prescription = self.db.get_prescription_mut(&id)?;
        if let Some(name) = medication_name {
            prescription.medication_name = name;
        }
        if let Some(dosage) = dosage {
            prescription.dosage = dosage;
        }
        if let Some(frequency) = frequency {
            prescription.frequency = frequency;
        }
        if let Some(duration) = duration {
            prescription.duration = duration;
        }
        if let Some(instructions) = instructions {
            prescription.instructions = instructions;
        }
        let prescription = prescription.clone();

        self.commit()?;
        Ok(prescription)
    }

    /// Ordonnances filtrées par état de délivrance, les plus récentes d'abord
    pub fn list_prescriptions(
        &self,
        actor: UserID,
        state: Option<PrescriptionState>,
    ) -> Result<Vec<PrescriptionView>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ListPrescriptions)?;

        let mut prescriptions: Vec<PrescriptionView> = self
            .db
            .list_prescriptions()
            .filter(|p| match state {
                Some(PrescriptionState::Dispensed) => p.is_dispensed,
                Some(PrescriptionState::Pending) => !p.is_dispensed,
                None => true,
            })
            .filter_map(|p| self.prescription_view(p))
            .collect();
        prescriptions.sort_by(|a, b| {
            (b.prescribed_at, b.prescription.id).cmp(&(a.prescribed_at, a.prescription.id))
        });
        Ok(prescriptions)
    }

    pub fn order_lab_test(&mut self, actor: UserID, record: &RecordID, form: LabTestForm) -> Result<LabTest, ServiceError> {
        let parties = self.record_parties(self.db.get_record(record)?)?;
        self.enforce(actor)?
            .authorize(Action::ManageLabTests, parties)?;

        let test_name = short_text(&form.test_name, "test name")?;
        let test_description = optional_text(form.test_description.as_deref(), "test description")?;
        let test = LabTest {
            id: self.db.allocate_pk(),
            medical_record: record.clone(),
            test_name,
            test_description,
            status: LabTestStatus::Pending,
            results: String::new(),
            test_date: form.test_date,
            result_date: None,
        };

        self.db.store_lab_test(test.clone());
        self.commit()?;
        Ok(test)
    }

    fn lab_test_parties(&self, id: Pk) -> Result<Parties, ServiceError> {
        let test = self.db.get_lab_test(&id)?;
        self.record_parties(self.db.get_record(&test.medical_record)?)
    }

    /// Fait avancer un examen; un état final n'évolue plus
    pub fn update_lab_test_status(&mut self, actor: UserID, id: Pk, status: LabTestStatus) -> Result<LabTest, ServiceError> {
        let parties = self.lab_test_parties(id)?;
        self.enforce(actor)?
            .authorize(Action::ManageLabTests, parties)?;

        let now = self.now();
        let test = self.db.get_lab_test_mut(&id)?;
        if !test.status.can_become(status) {
            return Err(ServiceError::InvalidTransition {
                from: test.status.to_string(),
                to: status.to_string(),
            });
        }
        test.status = status;
        if status != LabTestStatus::Cancelled {
            test.test_date.get_or_insert(now);
        }
        let test = test.clone();

        self.commit()?;
        Ok(test)
    }

    /// Enregistre les résultats, clôt l'examen et prévient le patient
    pub fn record_lab_results(&mut self, actor: UserID, id: Pk, results: &str) -> Result<LabTest, ServiceError> {
        let parties = self.lab_test_parties(id)?;
        self.enforce(actor)?
            .authorize(Action::ManageLabTests, parties)?;

        let results = long_text(results, "results")?;
        let now = self.now();
        let test = self.db.get_lab_test_mut(&id)?;
        if !test.status.can_become(LabTestStatus::Completed) {
            return Err(ServiceError::InvalidTransition {
                from: test.status.to_string(),
                to: LabTestStatus::Completed.to_string(),
            });
        }
        test.status = LabTestStatus::Completed;
        test.results = results;
        test.result_date = Some(now);
        test.test_date.get_or_insert(now);
        let test = test.clone();

        if let Some(patient) = parties.patient {
            self.notify(
                patient,
                NotificationKind::TestResults,
                &json!({
                    "patient_name": self.full_name(patient),
                    "test_name": test.test_name,
                }),
            );
        }

        info!("Results recorded for lab test {id}");
        self.commit()?;
        Ok(test)
    }

    fn lab_test_view(&self, test: &LabTest) -> Option<LabTestView> {
        let record = self.db.get_record(&test.medical_record).ok()?;
        let patient = self.db.get_patient(&record.patient).ok()?;
        Some(LabTestView {
            test: test.clone(),
            patient: record.patient.clone(),
            patient_name: self.full_name(patient.user),
        })
    }

    /// Examens filtrés et paginés, par date d'examen décroissante
    pub fn list_lab_tests(&self, actor: UserID, filter: LabTestFilter) -> Result<LabTestPage, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ListRecords)?;

        let query = filter
            .patient
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let test_day = |t: &LabTest| t.test_date.map(|d| d.date_naive());

        let mut tests: Vec<LabTestView> = self
            .db
            .list_lab_tests()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.date_from.map_or(true, |from| test_day(t).is_some_and(|d| d >= from)))
            .filter(|t| filter.date_to.map_or(true, |to| test_day(t).is_some_and(|d| d <= to)))
            .filter_map(|t| self.lab_test_view(t))
            .filter(|v| {
                query
                    .as_deref()
                    .map_or(true, |q| self.patient_matches(&v.patient, q))
            })
            .collect();
        tests.sort_by(|a, b| (b.test.test_date, b.test.id).cmp(&(a.test.test_date, a.test.id)));

        let total = tests.len();
        let pages = total.div_ceil(LAB_TEST_PAGE_SIZE).max(1);
        let page = filter.page.unwrap_or(1).clamp(1, pages);

        Ok(LabTestPage {
            lab_tests: tests
                .into_iter()
                .skip((page - 1) * LAB_TEST_PAGE_SIZE)
                .take(LAB_TEST_PAGE_SIZE)
                .collect(),
            total,
            page,
            pages,
        })
    }

    pub fn records_dashboard(&self, actor: UserID) -> Result<RecordsDashboard, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ListRecords)?;

        let mut records: Vec<&MedicalRecord> = self.db.list_records().collect();
        records.sort_by(|a, b| (b.created_at, &b.record_id).cmp(&(a.created_at, &a.record_id)));

        let mut tests: Vec<&LabTest> = self.db.list_lab_tests().collect();
        tests.sort_by(|a, b| (b.test_date, b.id).cmp(&(a.test_date, a.id)));

        let mut critical: Vec<&Vitals> = self.db.list_vitals().filter(|v| is_critical(v)).collect();
        critical.sort_by(|a, b| (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id)));

        Ok(RecordsDashboard {
            records_today: self.db.records_created_on(self.today()),
            pending_lab_tests: self
                .db
                .list_lab_tests()
                .filter(|t| t.status == LabTestStatus::Pending)
                .count(),
            pending_prescriptions: self.db.list_prescriptions().filter(|p| !p.is_dispensed).count(),
            recent_records: records
                .into_iter()
                .take(RECENT_RECORDS)
                .map(|r| self.record_view(r, false))
                .collect(),
            recent_lab_tests: tests
                .into_iter()
                .filter_map(|t| self.lab_test_view(t))
                .take(RECENT_LAB_TESTS)
                .collect(),
            critical_vitals: critical
                .into_iter()
                .take(CRITICAL_VITALS_MAX)
                .map(|v| CriticalVitals {
                    vitals: v.clone(),
                    patient_name: self
                        .db
                        .get_patient(&v.patient)
                        .map(|p| self.full_name(p.user))
                        .unwrap_or_default(),
                })
                .collect(),
        })
    }

    /// Ordonnance type pour une affection courante; vide si inconnue
    pub fn prescription_template(&self, actor: UserID, kind: &str) -> Result<Vec<PrescriptionLine>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ListRecords)?;

        Ok(PRESCRIPTION_TEMPLATES
            .iter()
            .find(|(name, _)| *name == kind)
            .map(|(_, lines)| lines.to_vec())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    fn form() -> RecordForm {
        RecordForm {
            appointment: None,
            diagnosis: "Acute bronchitis".into(),
            symptoms: "Cough, mild fever".into(),
            treatment_plan: "Rest and fluids".into(),
            notes: None,
            follow_up_date: None,
        }
    }

    fn amoxicillin() -> PrescriptionForm {
        PrescriptionForm {
            medication_name: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "3 times daily".into(),
            duration: "7 days".into(),
            instructions: Some("Take after meals".into()),
        }
    }

    fn record(ward: &mut Ward) -> RecordID {
        let patient = ward.patient_id.clone();
        ward.service
            .create_record(ward.doctor, &patient, form())
            .unwrap()
            .record
            .record_id
    }

    #[test]
    fn test_only_doctors_write_records() {
        let mut ward = ward();
        let patient = ward.patient_id.clone();
        assert!(ward.service.create_record(ward.admin, &patient, form()).is_err());
        assert!(ward.service.create_record(ward.patient, &patient, form()).is_err());

        let first = record(&mut ward);
        let second = record(&mut ward);
        assert_eq!(first.as_str(), "MR202401150001");
        assert_eq!(second.as_str(), "MR202401150002");

        let view = ward.service.get_record(ward.patient, &first).unwrap();
        assert_eq!(view.record.doctor, ward.doctor_id);
        assert_eq!(view.doctor_name, "doctor Test");
    }

    #[test]
    fn test_appointment_must_belong_to_patient() {
        let mut ward = ward();
        let other = register(&mut ward.service, "otieno");
        let other_id = patient_id(&ward.service, other);

        let appointment = ward
            .service
            .create_appointment(
                other,
                crate::services::appointments::AppointmentForm {
                    patient: None,
                    doctor: Some(ward.doctor_id.clone()),
                    appointment_date: fixed_now().date_naive(),
                    appointment_time: "10:00".into(),
                    reason: "Check-up".into(),
                },
            )
            .unwrap()
            .appointment
            .appointment_id;

        let patient = ward.patient_id.clone();
        let mismatched = RecordForm {
            appointment: Some(appointment.clone()),
            ..form()
        };
        assert!(matches!(
            ward.service.create_record(ward.doctor, &patient, mismatched.clone()),
            Err(ServiceError::InvalidInput(InvalidInput("appointment")))
        ));
        assert!(ward.service.create_record(ward.doctor, &other_id, mismatched).is_ok());
    }

    #[test]
    fn test_record_access() {
        let mut ward = ward();
        let id = record(&mut ward);
        let other = register(&mut ward.service, "otieno");
        let colleague = with_role(&mut ward.service, ward.admin, "colleague", Role::Doctor);
        let pharmacist = with_role(&mut ward.service, ward.admin, "chemist", Role::Pharmacist);

        assert!(ward.service.get_record(other, &id).is_err());
        assert!(ward.service.get_record(pharmacist, &id).is_err());
        assert!(ward.service.get_record(colleague, &id).is_ok());

        // Seul l'auteur (ou un administrateur) modifie
        let update = RecordUpdate {
            diagnosis: Some("Pneumonia".into()),
            ..Default::default()
        };
        assert!(ward.service.edit_record(colleague, &id, update.clone()).is_err());
        let edited = ward.service.edit_record(ward.admin, &id, update).unwrap();
        assert_eq!(edited.record.diagnosis, "Pneumonia");
        assert_eq!(edited.record.symptoms, "Cough, mild fever");
    }

    #[test]
    fn test_history_and_listing() {
        let mut ward = ward();
        let first = record(&mut ward);
        let second = record(&mut ward);

        let history = ward.service.patient_history(ward.patient, &ward.patient_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].record.record_id, second);
        assert_eq!(history[1].record.record_id, first);

        let by_doctor = ward
            .service
            .list_records(
                ward.admin,
                RecordFilter {
                    doctor: Some("DOCTOR".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(by_doctor.len(), 2);

        let nobody = ward
            .service
            .list_records(
                ward.doctor,
                RecordFilter {
                    patient: Some("kamau".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(nobody.is_empty());
        assert!(ward.service.list_records(ward.patient, RecordFilter::default()).is_err());
    }

    #[test]
    fn test_prescriptions() {
        let mut ward = ward();
        let id = record(&mut ward);
        let pharmacist = with_role(&mut ward.service, ward.admin, "chemist", Role::Pharmacist);

        assert!(ward.service.add_prescription(ward.patient, &id, amoxicillin()).is_err());
        let prescription = ward.service.add_prescription(ward.doctor, &id, amoxicillin()).unwrap();
        assert!(!prescription.is_dispensed);

        let edited = ward
            .service
            .edit_prescription(
                pharmacist,
                prescription.id,
                PrescriptionUpdate {
                    dosage: Some("250mg".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.dosage, "250mg");

        let pending = ward
            .service
            .list_prescriptions(pharmacist, Some(PrescriptionState::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].patient, ward.patient_id);
        assert!(ward
            .service
            .list_prescriptions(pharmacist, Some(PrescriptionState::Dispensed))
            .unwrap()
            .is_empty());

        ward.service.db.get_prescription_mut(&prescription.id).unwrap().is_dispensed = true;
        assert!(matches!(
            ward.service
                .edit_prescription(ward.doctor, prescription.id, PrescriptionUpdate::default()),
            Err(ServiceError::InvalidState(_))
        ));

        let view = ward.service.get_record(ward.patient, &id).unwrap();
        assert_eq!(view.prescriptions.len(), 1);
    }

    #[test]
    fn test_lab_tests() {
        let mut ward = ward();
        let id = record(&mut ward);
        let test = ward
            .service
            .order_lab_test(
                ward.doctor,
                &id,
                LabTestForm {
                    test_name: "Chest X-ray".into(),
                    test_description: None,
                    test_date: None,
                },
            )
            .unwrap();
        assert_eq!(test.status, LabTestStatus::Pending);
        assert!(ward
            .service
            .update_lab_test_status(ward.patient, test.id, LabTestStatus::InProgress)
            .is_err());

        let running = ward
            .service
            .update_lab_test_status(ward.doctor, test.id, LabTestStatus::InProgress)
            .unwrap();
        assert_eq!(running.test_date, Some(fixed_now()));

        let done = ward
            .service
            .record_lab_results(ward.doctor, test.id, "No consolidation seen")
            .unwrap();
        assert_eq!(done.status, LabTestStatus::Completed);
        assert_eq!(done.result_date, Some(fixed_now()));

        let inbox = ward.service.my_notifications(ward.patient, true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].message.contains("Chest X-ray"));

        assert!(matches!(
            ward.service
                .update_lab_test_status(ward.doctor, test.id, LabTestStatus::Cancelled),
            Err(ServiceError::InvalidTransition { .. })
        ));
        assert!(ward.service.record_lab_results(ward.doctor, test.id, "Again").is_err());
    }

    fn order(ward: &mut Ward, record: &RecordID, name: &str, test_date: Option<DateTime<Utc>>) -> LabTest {
        ward.service
            .order_lab_test(
                ward.doctor,
                record,
                LabTestForm {
                    test_name: name.into(),
                    test_description: None,
                    test_date,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_lab_test_listing() {
        let mut ward = ward();
        let id = record(&mut ward);
        let last_week = fixed_now() - chrono::Duration::days(7);
        let old = order(&mut ward, &id, "Malaria smear", Some(last_week));
        let xray = order(&mut ward, &id, "Chest X-ray", Some(fixed_now()));
        order(&mut ward, &id, "Urinalysis", None);
        ward.service
            .update_lab_test_status(ward.doctor, xray.id, LabTestStatus::InProgress)
            .unwrap();

        let all = ward.service.list_lab_tests(ward.doctor, LabTestFilter::default()).unwrap();
        assert_eq!((all.total, all.pages, all.page), (3, 1, 1));
        assert_eq!(all.lab_tests[0].test.id, xray.id);
        assert_eq!(all.lab_tests[1].test.id, old.id);
        assert_eq!(all.lab_tests[2].test.test_date, None);
        assert_eq!(all.lab_tests[0].patient_name, "patient Test");

        let pending = ward
            .service
            .list_lab_tests(
                ward.doctor,
                LabTestFilter {
                    status: Some(LabTestStatus::Pending),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pending.total, 2);

        let today = ward
            .service
            .list_lab_tests(
                ward.admin,
                LabTestFilter {
                    date_from: Some(fixed_now().date_naive()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(today.total, 1);

        let by_code = ward
            .service
            .list_lab_tests(
                ward.admin,
                LabTestFilter {
                    patient: Some(ward.patient_id.as_str().to_lowercase()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(by_code.total, 3);

        assert!(ward.service.list_lab_tests(ward.patient, LabTestFilter::default()).is_err());
    }

    #[test]
    fn test_lab_test_pages() {
        let mut ward = ward();
        let id = record(&mut ward);
        for n in 0..30 {
            order(&mut ward, &id, &format!("Panel {n}"), None);
        }

        let second = ward
            .service
            .list_lab_tests(
                ward.doctor,
                LabTestFilter {
                    page: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!((second.total, second.pages, second.page), (30, 2, 2));
        assert_eq!(second.lab_tests.len(), 5);
    }

    #[test]
    fn test_records_dashboard() {
        let mut ward = ward();
        let id = record(&mut ward);
        ward.service.add_prescription(ward.doctor, &id, amoxicillin()).unwrap();
        order(&mut ward, &id, "Chest X-ray", None);

        let patient = ward.patient_id.clone();
        let vitals = |systolic, temperature| crate::services::patients::VitalsForm {
            blood_pressure_systolic: Some(systolic),
            temperature: Some(temperature),
            ..Default::default()
        };
        ward.service.record_vitals(ward.doctor, &patient, vitals(120, 36.8)).unwrap();
        ward.service.record_vitals(ward.doctor, &patient, vitals(150, 37.0)).unwrap();
        ward.service.record_vitals(ward.doctor, &patient, vitals(118, 38.6)).unwrap();

        let dashboard = ward.service.records_dashboard(ward.doctor).unwrap();
        assert_eq!(dashboard.records_today, 1);
        assert_eq!(dashboard.pending_lab_tests, 1);
        assert_eq!(dashboard.pending_prescriptions, 1);
        assert_eq!(dashboard.recent_records.len(), 1);
        assert_eq!(dashboard.recent_lab_tests.len(), 1);
        assert_eq!(dashboard.critical_vitals.len(), 2);
        assert_eq!(dashboard.critical_vitals[0].patient_name, "patient Test");

        assert!(ward.service.records_dashboard(ward.patient).is_err());
    }

    #[test]
    fn test_prescription_templates() {
        let ward = ward();
        let cold = ward
            .service
            .prescription_template(ward.doctor, DEFAULT_PRESCRIPTION_TEMPLATE)
            .unwrap();
        assert_eq!(cold.len(), 2);
        assert_eq!(cold[0].medication_name, "Paracetamol");

        let diabetes = ward.service.prescription_template(ward.doctor, "diabetes").unwrap();
        assert_eq!(diabetes[0].frequency, "Twice daily");
        assert!(ward.service.prescription_template(ward.doctor, "gout").unwrap().is_empty());
        assert!(ward.service.prescription_template(ward.patient, "diabetes").is_err());
    }
}
