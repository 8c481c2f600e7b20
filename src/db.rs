//! Stockage des données en mémoire, avec sauvegarde en JSON

use crate::models::*;
use crate::utils::input_validation::Email;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, ErrorKind::NotFound},
    path::PathBuf,
};
use thiserror::Error;

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Database {
    #[serde(skip)]
    path: Option<PathBuf>,
    next_pk: Pk,
    next_user_number: u64,
    users: HashMap<UserID, User>,
    patients: HashMap<PatientID, Patient>,
    vitals: HashMap<Pk, Vitals>,
    doctors: HashMap<DoctorID, Doctor>,
    schedules: HashMap<Pk, DoctorSchedule>,
    appointments: HashMap<AppointmentID, Appointment>,
    billing_staff: HashMap<StaffID, BillingStaff>,
    service_types: HashMap<Pk, ServiceType>,
    bills: HashMap<BillID, Bill>,
    payments: HashMap<PaymentID, Payment>,
    records: HashMap<RecordID, MedicalRecord>,
    prescriptions: HashMap<Pk, Prescription>,
    lab_tests: HashMap<Pk, LabTest>,
    pharmacists: HashMap<PharmacistID, Pharmacist>,
    medicines: HashMap<Pk, Medicine>,
    inventory: HashMap<Pk, InventoryItem>,
    dispensings: HashMap<Pk, Dispensing>,
    templates: HashMap<Pk, NotificationTemplate>,
    notifications: HashMap<Pk, Notification>,
}

#[derive(Debug, Error)]
pub enum DBError {
    #[error("Invalid user ID: {0}")]
    InvalidUserID(UserID),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("User already exists: {email}")]
    UserAlreadyExists { email: Email },
}

/// Génère `get_*`, `get_*_mut`, `store_*`, `remove_*` et `list_*` pour une table
macro_rules! table {
    ($table:ident: $key:ty => $value:ty, $key_field:ident, $kind:literal,
     $get:ident, $get_mut:ident, $store:ident, $remove:ident, $list:ident) => {
        pub fn $get(&self, key: &$key) -> Result<&$value, DBError> {
            self.$table.get(key).ok_or_else(|| DBError::NotFound {
                kind: $kind,
                id: key.to_string(),
            })
        }

        pub fn $get_mut(&mut self, key: &$key) -> Result<&mut $value, DBError> {
            self.$table.get_mut(key).ok_or_else(|| DBError::NotFound {
                kind: $kind,
                id: key.to_string(),
            })
        }

        pub fn $store(&mut self, value: $value) {
            self.$table.insert(value.$key_field.clone(), value);
        }

        pub fn $remove(&mut self, key: &$key) -> Option<$value> {
            self.$table.remove(key)
        }

        pub fn $list(&self) -> impl Iterator<Item = &$value> + '_ {
            self.$table.values()
        }
    };
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self, io::Error> {
        match File::open(&path) {
            Ok(f) => {
                let mut db: Self = serde_json::from_reader(f)?;
                db.path = Some(path);
                Ok(db)
            }

            // Fichier non existant, on le crée
            Err(not_found) if not_found.kind() == NotFound => {
                info!("DB file {} not found, creating new empty DB", path.display());
                let mut new_db = Database::default();
                new_db.path = Some(path);

                // On vérifie la sauvegarde immédiatement pour diminuer le risque de perte de données
                new_db.save()?;
                Ok(new_db)
            }

            Err(other) => Err(other),
        }
    }

    pub fn save(&self) -> Result<(), io::Error> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, self)?;
        }
        Ok(())
    }

    /// Prochaine clé des tables secondaires
    pub fn allocate_pk(&mut self) -> Pk {
        self.next_pk += 1;
        self.next_pk
    }

    /// Prochain numéro de compte, base des codes de profil
    pub fn allocate_user_number(&mut self) -> u64 {
        self.next_user_number += 1;
        self.next_user_number
    }

    pub fn get_user(&self, user: UserID) -> Result<&User, DBError> {
        self.users.get(&user).ok_or(DBError::InvalidUserID(user))
    }

    pub fn get_user_mut(&mut self, user: UserID) -> Result<&mut User, DBError> {
        self.users
            .get_mut(&user)
            .ok_or(DBError::InvalidUserID(user))
    }

    pub fn lookup_email(&self, email: &Email) -> Option<&User> {
        self.users.values().find(|user| &user.email == email)
    }

    pub fn store_user(&mut self, data: User) {
        self.users.insert(data.id, data);
    }

    pub fn list_users(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.values()
    }

    table!(patients: PatientID => Patient, patient_id, "Patient",
        get_patient, get_patient_mut, store_patient, remove_patient, list_patients);
    table!(vitals: Pk => Vitals, id, "Vitals",
        get_vitals, get_vitals_mut, store_vitals, remove_vitals, list_vitals);
    table!(doctors: DoctorID => Doctor, doctor_id, "Doctor",
        get_doctor, get_doctor_mut, store_doctor, remove_doctor, list_doctors);
    table!(schedules: Pk => DoctorSchedule, id, "Schedule",
        get_schedule, get_schedule_mut, store_schedule, remove_schedule, list_schedules);
    table!(appointments: AppointmentID => Appointment, appointment_id, "Appointment",
        get_appointment, get_appointment_mut, store_appointment, remove_appointment,
        list_appointments);
    table!(billing_staff: StaffID => BillingStaff, staff_id, "Billing staff",
        get_staff, get_staff_mut, store_staff, remove_staff, list_staff);
    table!(service_types: Pk => ServiceType, id, "Service type",
        get_service_type, get_service_type_mut, store_service_type, remove_service_type,
        list_service_types);
    table!(bills: BillID => Bill, bill_id, "Bill",
        get_bill, get_bill_mut, store_bill, remove_bill, list_bills);
    table!(payments: PaymentID => Payment, payment_id, "Payment",
        get_payment, get_payment_mut, store_payment, remove_payment, list_payments);
    table!(records: RecordID => MedicalRecord, record_id, "Medical record",
        get_record, get_record_mut, store_record, remove_record, list_records);
    table!(prescriptions: Pk => Prescription, id, "Prescription",
        get_prescription, get_prescription_mut, store_prescription, remove_prescription,
        list_prescriptions);
    table!(lab_tests: Pk => LabTest, id, "Lab test",
        get_lab_test, get_lab_test_mut, store_lab_test, remove_lab_test, list_lab_tests);
    table!(pharmacists: PharmacistID => Pharmacist, pharmacist_id, "Pharmacist",
        get_pharmacist, get_pharmacist_mut, store_pharmacist, remove_pharmacist,
        list_pharmacists);
    table!(medicines: Pk => Medicine, id, "Medicine",
        get_medicine, get_medicine_mut, store_medicine, remove_medicine, list_medicines);
    table!(inventory: Pk => InventoryItem, id, "Inventory item",
        get_inventory_item, get_inventory_item_mut, store_inventory_item,
        remove_inventory_item, list_inventory);
    table!(dispensings: Pk => Dispensing, id, "Dispensing",
        get_dispensing, get_dispensing_mut, store_dispensing, remove_dispensing,
        list_dispensings);
    table!(templates: Pk => NotificationTemplate, id, "Notification template",
        get_template, get_template_mut, store_template, remove_template, list_templates);
    table!(notifications: Pk => Notification, id, "Notification",
        get_notification, get_notification_mut, store_notification, remove_notification,
        list_notifications);

    pub fn patient_by_user(&self, user: UserID) -> Option<&Patient> {
        self.patients.values().find(|p| p.user == user)
    }

    pub fn doctor_by_user(&self, user: UserID) -> Option<&Doctor> {
        self.doctors.values().find(|d| d.user == user)
    }

    pub fn staff_by_user(&self, user: UserID) -> Option<&BillingStaff> {
        self.billing_staff.values().find(|s| s.user == user)
    }

    pub fn pharmacist_by_user(&self, user: UserID) -> Option<&Pharmacist> {
        self.pharmacists.values().find(|p| p.user == user)
    }

    pub fn schedule_for(&self, doctor: &DoctorID, day: DayOfWeek) -> Option<&DoctorSchedule> {
        self.schedules
            .values()
            .find(|s| &s.doctor == doctor && s.day_of_week == day)
    }

    pub fn bills_issued_on(&self, day: NaiveDate) -> usize {
        self.bills.values().filter(|b| b.issue_date == day).count()
    }

    pub fn records_created_on(&self, day: NaiveDate) -> usize {
        self.records
            .values()
            .filter(|r| r.created_at.date_naive() == day)
            .count()
    }

    pub fn payments_for(&self, bill: &BillID) -> impl Iterator<Item = &Payment> + '_ {
        let bill = bill.clone();
        self.payments.values().filter(move |p| p.bill == bill)
    }

    pub fn prescriptions_for(&self, record: &RecordID) -> impl Iterator<Item = &Prescription> + '_ {
        let record = record.clone();
        self.prescriptions
            .values()
            .filter(move |p| p.medical_record == record)
    }

    pub fn lab_tests_for(&self, record: &RecordID) -> impl Iterator<Item = &LabTest> + '_ {
        let record = record.clone();
        self.lab_tests
            .values()
            .filter(move |t| t.medical_record == record)
    }
}
