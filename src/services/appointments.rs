//! Rendez-vous: prise, modification, transitions de statut, conflits et
//! créneaux libres. Annuaire et horaires des médecins.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Service, ServiceError};
use crate::authorization::{Action, Parties};
use crate::consts::{FIRST_SLOT, LAST_SLOT, SLOT_MINUTES};
use crate::models::*;
use crate::utils::input_validation::{long_text, optional_text, parse_time, short_text, InvalidInput};

pub const DOCTOR_CONFLICT: &str = "Doctor already has an appointment at this time";
pub const PATIENT_CONFLICT: &str = "Patient already has an appointment at this time";

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentForm {
    pub patient: Option<PatientID>,
    pub doctor: Option<DoctorID>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentUpdate {
    pub patient: Option<PatientID>,
    pub doctor: Option<DoctorID>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub doctor: Option<DoctorID>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictQuery {
    pub doctor: Option<DoctorID>,
    pub patient: Option<PatientID>,
    pub date: NaiveDate,
    pub time: String,
    pub exclude: Option<AppointmentID>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DoctorUpdate {
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub consultation_fee: Option<Money>,
    pub years_of_experience: Option<u32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleForm {
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AppointmentSummary {
    pub today: usize,
    pub scheduled: usize,
    pub this_week: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentList {
    pub appointments: Vec<AppointmentView>,
    pub summary: AppointmentSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub full_name: String,
    pub email: String,
    pub schedules: Vec<DoctorSchedule>,
}

/// Tous les créneaux d'une journée, de 08:00 à 16:30
pub fn daily_slots() -> Vec<NaiveTime> {
    let (Some(first), Some(last)) = (
        NaiveTime::from_hms_opt(FIRST_SLOT.0, FIRST_SLOT.1, 0),
        NaiveTime::from_hms_opt(LAST_SLOT.0, LAST_SLOT.1, 0),
    ) else {
        return Vec::new();
    };

    let mut slots = Vec::new();
    let mut slot = first;
    while slot <= last {
        slots.push(slot);
        slot += Duration::minutes(SLOT_MINUTES);
    }
    slots
}

/// Premier jour (lundi) de la semaine contenant `day`
fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

impl Service {
    /// Les conflits d'un créneau: même médecin ou même patient, rendez-vous
    /// prévu ou confirmé, hors `exclude`.
    pub(super) fn conflicts_for(
        &self,
        doctor: Option<&DoctorID>,
        patient: Option<&PatientID>,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<&AppointmentID>,
    ) -> Vec<String> {
        let busy: Vec<&Appointment> = self
            .db
            .list_appointments()
            .filter(|a| a.status.books_slot())
            .filter(|a| a.appointment_date == date && a.appointment_time == time)
            .filter(|a| Some(&a.appointment_id) != exclude)
            .collect();

        let mut conflicts = Vec::new();
        if doctor.is_some_and(|d| busy.iter().any(|a| &a.doctor == d)) {
            conflicts.push(DOCTOR_CONFLICT.to_owned());
        }
        if patient.is_some_and(|p| busy.iter().any(|a| &a.patient == p)) {
            conflicts.push(PATIENT_CONFLICT.to_owned());
        }
        conflicts
    }

    fn appointment_parties(&self, appointment: &Appointment) -> Result<Parties, ServiceError> {
        self.care_parties(&appointment.patient, Some(&appointment.doctor))
    }

    pub(super) fn appointment_view(&self, appointment: &Appointment) -> AppointmentView {
        let patient_name = self
            .db
            .get_patient(&appointment.patient)
            .map(|p| self.full_name(p.user))
            .unwrap_or_default();
        let doctor_name = self
            .db
            .get_doctor(&appointment.doctor)
            .map(|d| self.full_name(d.user))
            .unwrap_or_default();

        AppointmentView {
            appointment: appointment.clone(),
            patient_name,
            doctor_name,
        }
    }

    fn bookable_patient(&self, id: &PatientID) -> Result<(), ServiceError> {
        let patient = self.db.get_patient(id)?;
        if !self.db.get_user(patient.user)?.is_active {
            return Err(ServiceError::InvalidState("Patient account is inactive"));
        }
        Ok(())
    }

    fn bookable_doctor(&self, id: &DoctorID) -> Result<(), ServiceError> {
        let doctor = self.db.get_doctor(id)?;
        if !doctor.is_available || !self.db.get_user(doctor.user)?.is_active {
            return Err(ServiceError::InvalidState("Doctor is not available"));
        }
        Ok(())
    }

    /// Prend un rendez-vous. Un médecin réserve pour lui-même, un patient pour
    /// lui-même, un administrateur désigne les deux parties.
    pub fn create_appointment(&mut self, actor: UserID, form: AppointmentForm) -> Result<AppointmentView, ServiceError> {
        let subject = self.principal(actor)?;

        let (patient, doctor) = match subject.role {
            Role::Doctor => (
                form.patient.ok_or(InvalidInput("patient"))?,
                self.actor_doctor(actor)?.doctor_id.clone(),
            ),
            Role::Patient => (
                self.actor_patient(actor)?.patient_id.clone(),
                form.doctor.ok_or(InvalidInput("doctor"))?,
            ),
            Role::Administrator => (
                form.patient.ok_or(InvalidInput("patient"))?,
                form.doctor.ok_or(InvalidInput("doctor"))?,
            ),
            _ => return Err(crate::authorization::AccessDenied.into()),
        };

        let parties = self.care_parties(&patient, Some(&doctor))?;
        self.enforce(actor)?
            .authorize(Action::CreateAppointment, parties)?;

        self.bookable_patient(&patient)?;
        self.bookable_doctor(&doctor)?;

        let time = parse_time(&form.appointment_time)?;
        let reason = long_text(&form.reason, "reason")?;

        let conflicts = self.conflicts_for(Some(&doctor), Some(&patient), form.appointment_date, time, None);
        if !conflicts.is_empty() {
            return Err(ServiceError::Conflict(conflicts));
        }

        let now = self.now();
        let appointment = Appointment {
            appointment_id: Appointment::new_id(now.date_naive()),
            patient,
            doctor,
            appointment_date: form.appointment_date,
            appointment_time: time,
            status: AppointmentStatus::Scheduled,
            reason,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };

        info!(
            "Appointment {} booked for {} {}",
            appointment.appointment_id, appointment.appointment_date, appointment.appointment_time
        );
        let view = self.appointment_view(&appointment);
        self.db.store_appointment(appointment);
        self.commit()?;
        Ok(view)
    }

    /// Les rendez-vous visibles par l'acteur, du plus récent au plus ancien,
    /// avec un résumé.
    pub fn list_appointments(&self, actor: UserID, filter: AppointmentFilter) -> Result<AppointmentList, ServiceError> {
        let subject = self.principal(actor)?;
        self.enforce(actor)?
            .authorize_global(Action::ListAppointments)?;

        let own_doctor = match subject.role {
            Role::Doctor => Some(self.actor_doctor(actor)?.doctor_id.clone()),
            _ => None,
        };
        let own_patient = match subject.role {
            Role::Patient => Some(self.actor_patient(actor)?.patient_id.clone()),
            _ => None,
        };

        let mut appointments: Vec<&Appointment> = self
            .db
            .list_appointments()
            .filter(|a| own_doctor.as_ref().map_or(true, |d| &a.doctor == d))
            .filter(|a| own_patient.as_ref().map_or(true, |p| &a.patient == p))
            .filter(|a| filter.doctor.as_ref().map_or(true, |d| &a.doctor == d))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.date_from.map_or(true, |from| a.appointment_date >= from))
            .filter(|a| filter.date_to.map_or(true, |to| a.appointment_date <= to))
            .collect();

        appointments.sort_by(|a, b| {
            (b.appointment_date, b.appointment_time).cmp(&(a.appointment_date, a.appointment_time))
        });

        let today = self.today();
        let monday = week_start(today);
        let sunday = monday + Duration::days(6);
        let summary = AppointmentSummary {
            today: appointments.iter().filter(|a| a.appointment_date == today).count(),
            scheduled: appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Scheduled)
                .count(),
            this_week: appointments
                .iter()
                .filter(|a| (monday..=sunday).contains(&a.appointment_date))
                .count(),
            completed: appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Completed)
                .count(),
        };

        Ok(AppointmentList {
            appointments: appointments.into_iter().map(|a| self.appointment_view(a)).collect(),
            summary,
        })
    }

    pub fn get_appointment(&self, actor: UserID, id: &AppointmentID) -> Result<AppointmentView, ServiceError> {
        let appointment = self.db.get_appointment(id)?;
        let parties = self.appointment_parties(appointment)?;
        self.enforce(actor)?
            .authorize(Action::ReadAppointment, parties)?;

        Ok(self.appointment_view(appointment))
    }

    /// Modifie un rendez-vous. Un patient ne peut pas changer le patient, un
    /// médecin ne peut pas changer le médecin: ces champs sont ignorés.
    pub fn update_appointment(
        &mut self,
        actor: UserID,
        id: &AppointmentID,
        changes: AppointmentUpdate,
    ) -> Result<AppointmentView, ServiceError> {
        let subject = self.principal(actor)?;
        let current = self.db.get_appointment(id)?.clone();
        let parties = self.appointment_parties(&current)?;
        self.enforce(actor)?
            .authorize(Action::UpdateAppointment, parties)?;

        let patient = match (subject.role, changes.patient) {
            (Role::Patient, _) | (_, None) => current.patient.clone(),
            (_, Some(patient)) => patient,
        };
        let doctor = match (subject.role, changes.doctor) {
            (Role::Doctor, _) | (_, None) => current.doctor.clone(),
            (_, Some(doctor)) => doctor,
        };
        if patient != current.patient {
            self.bookable_patient(&patient)?;
        }
        if doctor != current.doctor {
            self.bookable_doctor(&doctor)?;
        }

        let date = changes.appointment_date.unwrap_or(current.appointment_date);
        let time = match &changes.appointment_time {
            Some(time) => parse_time(time)?,
            None => current.appointment_time,
        };
        let reason = changes.reason.map(|r| long_text(&r, "reason")).transpose()?;
        let notes = changes
            .notes
            .map(|n| optional_text(Some(&n), "notes"))
            .transpose()?;

        let moved = patient != current.patient
            || doctor != current.doctor
            || date != current.appointment_date
            || time != current.appointment_time;
        if moved && current.status.books_slot() {
            let conflicts = self.conflicts_for(Some(&doctor), Some(&patient), date, time, Some(id));
            if !conflicts.is_empty() {
                return Err(ServiceError::Conflict(conflicts));
            }
        }

        let now = self.now();
        let appointment = self.db.get_appointment_mut(id)?;
        appointment.patient = patient;
        appointment.doctor = doctor;
        appointment.appointment_date = date;
        appointment.appointment_time = time;
        if let Some(reason) = reason {
            appointment.reason = reason;
        }
        if let Some(notes) = notes {
            appointment.notes = notes;
        }
        appointment.updated_at = now;
        let appointment = appointment.clone();

        self.commit()?;
        Ok(self.appointment_view(&appointment))
    }

    fn transition(
        &mut self,
        id: &AppointmentID,
        next: AppointmentStatus,
    ) -> Result<Appointment, ServiceError> {
        let now = self.now();
        let appointment = self.db.get_appointment_mut(id)?;
        if !appointment.status.can_become(next) {
            return Err(ServiceError::InvalidTransition {
                from: appointment.status.to_string(),
                to: next.to_string(),
            });
        }
        appointment.status = next;
        appointment.updated_at = now;
        info!("Appointment {id} is now {next}");
        Ok(appointment.clone())
    }

    /// Confirmation par le médecin assigné; le patient est notifié
    pub fn confirm_appointment(&mut self, actor: UserID, id: &AppointmentID) -> Result<AppointmentView, ServiceError> {
        let current = self.db.get_appointment(id)?;
        let parties = self.appointment_parties(current)?;
        self.enforce(actor)?
            .authorize(Action::ConfirmAppointment, parties)?;

        if current.status != AppointmentStatus::Scheduled {
            return Err(ServiceError::InvalidTransition {
                from: current.status.to_string(),
                to: AppointmentStatus::Confirmed.to_string(),
            });
        }

        let appointment = self.transition(id, AppointmentStatus::Confirmed)?;
        let view = self.appointment_view(&appointment);

        if let Some(patient) = parties.patient {
            self.notify(
                patient,
                NotificationKind::AppointmentConfirmation,
                &json!({
                    "patient_name": view.patient_name,
                    "doctor_name": view.doctor_name,
                    "appointment_id": appointment.appointment_id,
                    "date": appointment.appointment_date.to_string(),
                    "time": appointment.appointment_time.format("%H:%M").to_string(),
                }),
            );
        }

        self.commit()?;
        Ok(view)
    }

    /// Annule un rendez-vous; le motif éventuel est ajouté en tête des notes
    pub fn cancel_appointment(
        &mut self,
        actor: UserID,
        id: &AppointmentID,
        reason: Option<&str>,
    ) -> Result<AppointmentView, ServiceError> {
        let current = self.db.get_appointment(id)?;
        let parties = self.appointment_parties(current)?;
        self.enforce(actor)?
            .authorize(Action::CancelAppointment, parties)?;

        let reason = optional_text(reason, "reason")?;
        self.transition(id, AppointmentStatus::Cancelled)?;

        let appointment = self.db.get_appointment_mut(id)?;
        if !reason.is_empty() {
            appointment.notes = format!("Cancelled: {reason}\n{}", appointment.notes);
        }
        let appointment = appointment.clone();

        self.commit()?;
        Ok(self.appointment_view(&appointment))
    }

    /// Passage en consultation, terminé ou absent
    pub fn set_appointment_status(
        &mut self,
        actor: UserID,
        id: &AppointmentID,
        status: AppointmentStatus,
    ) -> Result<AppointmentView, ServiceError> {
        let current = self.db.get_appointment(id)?;
        let parties = self.appointment_parties(current)?;
        self.enforce(actor)?
            .authorize(Action::SetAppointmentStatus, parties)?;

        if !matches!(
            status,
            AppointmentStatus::InProgress | AppointmentStatus::Completed | AppointmentStatus::NoShow
        ) {
            return Err(InvalidInput("status").into());
        }

        let appointment = self.transition(id, status)?;
        self.commit()?;
        Ok(self.appointment_view(&appointment))
    }

    /// Supprime un rendez-vous; factures et dossiers qui le citaient sont détachés
    pub fn delete_appointment(&mut self, actor: UserID, id: &AppointmentID) -> Result<(), ServiceError> {
        let current = self.db.get_appointment(id)?;
        let parties = self.appointment_parties(current)?;
        self.enforce(actor)?
            .authorize(Action::DeleteAppointment, parties)?;

        let bills: Vec<BillID> = self
            .db
            .list_bills()
            .filter(|b| b.appointment.as_ref() == Some(id))
            .map(|b| b.bill_id.clone())
            .collect();
        for bill in bills {
            self.db.get_bill_mut(&bill)?.appointment = None;
        }

        let records: Vec<RecordID> = self
            .db
            .list_records()
            .filter(|r| r.appointment.as_ref() == Some(id))
            .map(|r| r.record_id.clone())
            .collect();
        for record in records {
            self.db.get_record_mut(&record)?.appointment = None;
        }

        self.db.remove_appointment(id);
        info!("Appointment {id} deleted by {actor}");
        self.commit()?;
        Ok(())
    }

    /// Les conflits d'un créneau, en texte
    pub fn check_conflicts(&self, actor: UserID, query: ConflictQuery) -> Result<Vec<String>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::CheckAvailability)?;

        let time = parse_time(&query.time)?;
        Ok(self.conflicts_for(
            query.doctor.as_ref(),
            query.patient.as_ref(),
            query.date,
            time,
            query.exclude.as_ref(),
        ))
    }

    /// Créneaux libres d'un médecin pour une date, restreints à son horaire
    /// du jour s'il en a un actif.
    pub fn available_slots(
        &self,
        actor: UserID,
        doctor: &DoctorID,
        date: NaiveDate,
        exclude: Option<&AppointmentID>,
    ) -> Result<Vec<String>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::CheckAvailability)?;
        self.db.get_doctor(doctor)?;

        let schedule = self
            .db
            .schedule_for(doctor, DayOfWeek::from(date.weekday()))
            .filter(|s| s.is_active);

        let booked: Vec<NaiveTime> = self
            .db
            .list_appointments()
            .filter(|a| &a.doctor == doctor && a.appointment_date == date)
            .filter(|a| a.status.books_slot())
            .filter(|a| Some(&a.appointment_id) != exclude)
            .map(|a| a.appointment_time)
            .collect();

        Ok(daily_slots()
            .into_iter()
            .filter(|slot| !booked.contains(slot))
            .filter(|slot| schedule.map_or(true, |s| s.covers(*slot)))
            .map(|slot| slot.format("%H:%M").to_string())
            .collect())
    }

    fn doctor_view(&self, doctor: &Doctor) -> DoctorView {
        let mut schedules: Vec<DoctorSchedule> = self
            .db
            .list_schedules()
            .filter(|s| s.doctor == doctor.doctor_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.day_of_week as u8);

        DoctorView {
            doctor: doctor.clone(),
            full_name: self.full_name(doctor.user),
            email: self
                .db
                .get_user(doctor.user)
                .map(|u| u.email.to_string())
                .unwrap_or_default(),
            schedules,
        }
    }

    /// Les médecins disponibles dont le compte est actif
    pub fn list_doctors(&self, actor: UserID) -> Result<Vec<DoctorView>, ServiceError> {
        self.principal(actor)?;

        let mut doctors: Vec<DoctorView> = self
            .db
            .list_doctors()
            .filter(|d| d.is_available)
            .filter(|d| self.db.get_user(d.user).is_ok_and(|u| u.is_active))
            .map(|d| self.doctor_view(d))
            .collect();
        doctors.sort_by(|a, b| a.doctor.doctor_id.cmp(&b.doctor.doctor_id));
        Ok(doctors)
    }

    pub fn get_doctor(&self, actor: UserID, id: &DoctorID) -> Result<DoctorView, ServiceError> {
        self.principal(actor)?;
        Ok(self.doctor_view(self.db.get_doctor(id)?))
    }

    pub fn update_doctor_profile(
        &mut self,
        actor: UserID,
        id: &DoctorID,
        changes: DoctorUpdate,
    ) -> Result<DoctorView, ServiceError> {
        let owner = self.doctor_user(id)?;
        self.enforce(actor)?
            .authorize(Action::ManageDoctor, Parties::doctor(owner))?;

        let specialization = changes
            .specialization
            .map(|s| optional_text(Some(&s), "specialization"))
            .transpose()?;
        let license_number = changes
            .license_number
            .map(|l| short_text(&l, "license number"))
            .transpose()?;
        if changes.consultation_fee.is_some_and(Money::is_negative) {
            return Err(InvalidInput("consultation fee").into());
        }
        if let Some(license) = &license_number {
            if self
                .db
                .list_doctors()
                .any(|d| &d.license_number == license && &d.doctor_id != id)
            {
                return Err(InvalidInput("license number").into());
            }
        }

        let doctor = self.db.get_doctor_mut(id)?;
        if let Some(specialization) = specialization {
            doctor.specialization = specialization;
        }
        if let Some(license) = license_number {
            doctor.license_number = license;
        }
        if let Some(fee) = changes.consultation_fee {
            doctor.consultation_fee = fee;
        }
        if let Some(years) = changes.years_of_experience {
            doctor.years_of_experience = years;
        }
        if let Some(available) = changes.is_available {
            doctor.is_available = available;
        }
        let doctor = doctor.clone();

        self.commit()?;
        Ok(self.doctor_view(&doctor))
    }

    /// Définit l'horaire d'un jour; remplace celui qui existait
    pub fn set_schedule(
        &mut self,
        actor: UserID,
        id: &DoctorID,
        form: ScheduleForm,
    ) -> Result<DoctorSchedule, ServiceError> {
        let owner = self.doctor_user(id)?;
        self.enforce(actor)?
            .authorize(Action::ManageDoctor, Parties::doctor(owner))?;

        let start_time = parse_time(&form.start_time)?;
        let end_time = parse_time(&form.end_time)?;
        if start_time >= end_time {
            return Err(InvalidInput("schedule").into());
        }

        let existing = self.db.schedule_for(id, form.day_of_week).map(|s| s.id);
        let schedule = DoctorSchedule {
            id: match existing {
                Some(pk) => pk,
                None => self.db.allocate_pk(),
            },
            doctor: id.clone(),
            day_of_week: form.day_of_week,
            start_time,
            end_time,
            is_active: form.is_active,
        };

        self.db.store_schedule(schedule.clone());
        self.commit()?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    // 2024-01-15 est un lundi
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn booking(ward: &Ward, date: NaiveDate, time: &str) -> AppointmentForm {
        AppointmentForm {
            patient: Some(ward.patient_id.clone()),
            doctor: Some(ward.doctor_id.clone()),
            appointment_date: date,
            appointment_time: time.into(),
            reason: "Persistent cough".into(),
        }
    }

    #[test]
    fn test_daily_grid() {
        let slots = daily_slots();
        assert_eq!(slots.len(), 18);
        assert_eq!(slots[0], NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(slots[17], NaiveTime::from_hms_opt(16, 30, 0).unwrap());
    }

    #[test]
    fn test_booking_by_each_role() {
        let mut ward = ward();

        let by_patient = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap();
        assert_eq!(by_patient.appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(by_patient.doctor_name, "doctor Test");
        assert!(by_patient.appointment.appointment_id.as_str().starts_with("APT-20240115-"));

        let mut doctor_form = booking(&ward, monday(), "10:00");
        doctor_form.doctor = None;
        let by_doctor = ward.service.create_appointment(ward.doctor, doctor_form).unwrap();
        assert_eq!(by_doctor.appointment.doctor, ward.doctor_id);

        let mut incomplete = booking(&ward, monday(), "11:00");
        incomplete.doctor = None;
        assert!(matches!(
            ward.service.create_appointment(ward.admin, incomplete),
            Err(ServiceError::InvalidInput(InvalidInput("doctor")))
        ));
        assert!(ward
            .service
            .create_appointment(ward.admin, booking(&ward, monday(), "11:00"))
            .is_ok());
    }

    #[test]
    fn test_other_roles_cannot_book() {
        let mut ward = ward();
        let cashier = with_role(&mut ward.service, ward.admin, "cashier", Role::BillingStaff);
        assert!(matches!(
            ward.service.create_appointment(cashier, booking(&ward, monday(), "09:00")),
            Err(ServiceError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_double_booking_is_a_conflict() {
        let mut ward = ward();
        ward.service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap();

        let other = register(&mut ward.service, "otieno");
        let other_id = patient_id(&ward.service, other);
        let mut form = booking(&ward, monday(), "09:00");
        form.patient = Some(other_id.clone());

        match ward.service.create_appointment(ward.admin, form) {
            Err(ServiceError::Conflict(conflicts)) => assert_eq!(conflicts, [DOCTOR_CONFLICT]),
            other => panic!("Expected a conflict, got {other:?}"),
        }

        let query = ConflictQuery {
            doctor: Some(ward.doctor_id.clone()),
            patient: Some(ward.patient_id.clone()),
            date: monday(),
            time: "09:00".into(),
            exclude: None,
        };
        assert_eq!(
            ward.service.check_conflicts(other, query).unwrap(),
            [DOCTOR_CONFLICT, PATIENT_CONFLICT]
        );
    }

    #[test]
    fn test_cancelled_slot_can_be_rebooked() {
        let mut ward = ward();
        let first = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap();
        ward.service
            .cancel_appointment(ward.patient, &first.appointment.appointment_id, Some("Travelling"))
            .unwrap();

        assert!(ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .is_ok());
    }

    #[test]
    fn test_available_slots() {
        let mut ward = ward();
        ward.service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap();

        let slots = ward
            .service
            .available_slots(ward.patient, &ward.doctor_id, monday(), None)
            .unwrap();
        assert_eq!(slots.len(), 17);
        assert!(!slots.contains(&"09:00".to_owned()));

        ward.service
            .set_schedule(
                ward.doctor,
                &ward.doctor_id,
                ScheduleForm {
                    day_of_week: DayOfWeek::Monday,
                    start_time: "08:00".into(),
                    end_time: "10:00".into(),
                    is_active: true,
                },
            )
            .unwrap();

        let slots = ward
            .service
            .available_slots(ward.patient, &ward.doctor_id, monday(), None)
            .unwrap();
        assert_eq!(slots, ["08:00", "08:30", "09:30"]);

        // Le mardi n'a pas d'horaire: toute la grille moins rien
        let tuesday = monday().succ_opt().unwrap();
        let slots = ward
            .service
            .available_slots(ward.patient, &ward.doctor_id, tuesday, None)
            .unwrap();
        assert_eq!(slots.len(), 18);
    }

    #[test]
    fn test_status_lifecycle() {
        let mut ward = ward();
        let id = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap()
            .appointment
            .appointment_id;

        // Seul le médecin assigné confirme
        assert!(ward.service.confirm_appointment(ward.admin, &id).is_err());
        assert!(ward.service.confirm_appointment(ward.patient, &id).is_err());
        let confirmed = ward.service.confirm_appointment(ward.doctor, &id).unwrap();
        assert_eq!(confirmed.appointment.status, AppointmentStatus::Confirmed);
        assert!(matches!(
            ward.service.confirm_appointment(ward.doctor, &id),
            Err(ServiceError::InvalidTransition { .. })
        ));

        ward.service
            .set_appointment_status(ward.doctor, &id, AppointmentStatus::InProgress)
            .unwrap();
        ward.service
            .set_appointment_status(ward.admin, &id, AppointmentStatus::Completed)
            .unwrap();

        assert!(matches!(
            ward.service.cancel_appointment(ward.patient, &id, None),
            Err(ServiceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            ward.service
                .set_appointment_status(ward.doctor, &id, AppointmentStatus::Scheduled),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(ward
            .service
            .set_appointment_status(ward.patient, &id, AppointmentStatus::NoShow)
            .is_err());
    }

    #[test]
    fn test_confirmation_notifies_patient() {
        let mut ward = ward();
        let id = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap()
            .appointment
            .appointment_id;
        ward.service.confirm_appointment(ward.doctor, &id).unwrap();

        let inbox = ward.service.my_notifications(ward.patient, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].message.contains("09:00"));
        assert!(inbox[0].message.contains("doctor Test"));
    }

    #[test]
    fn test_cancel_prepends_reason() {
        let mut ward = ward();
        let id = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap()
            .appointment
            .appointment_id;
        ward.service
            .update_appointment(
                ward.doctor,
                &id,
                AppointmentUpdate {
                    notes: Some("Bring previous X-rays".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let cancelled = ward
            .service
            .cancel_appointment(ward.doctor, &id, Some("Doctor on leave"))
            .unwrap();
        assert_eq!(cancelled.appointment.status, AppointmentStatus::Cancelled);
        assert_eq!(
            cancelled.appointment.notes,
            "Cancelled: Doctor on leave\nBring previous X-rays"
        );
    }

    #[test]
    fn test_update_rechecks_conflicts_and_ignores_restricted_sides() {
        let mut ward = ward();
        let first = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap()
            .appointment
            .appointment_id;
        let second = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "10:00"))
            .unwrap()
            .appointment
            .appointment_id;

        // Garder le même créneau n'entre pas en conflit avec soi-même
        assert!(ward
            .service
            .update_appointment(
                ward.patient,
                &first,
                AppointmentUpdate {
                    appointment_time: Some("09:00".into()),
                    reason: Some("Follow-up".into()),
                    ..Default::default()
                },
            )
            .is_ok());

        let moved = ward.service.update_appointment(
            ward.patient,
            &second,
            AppointmentUpdate {
                appointment_time: Some("09:00".into()),
                ..Default::default()
            },
        );
        assert!(matches!(moved, Err(ServiceError::Conflict(_))));

        let other = register(&mut ward.service, "otieno");
        let other_id = patient_id(&ward.service, other);
        let view = ward
            .service
            .update_appointment(
                ward.patient,
                &second,
                AppointmentUpdate {
                    patient: Some(other_id),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(view.appointment.patient, ward.patient_id);
    }

    #[test]
    fn test_listing_is_scoped_and_summarised() {
        let mut ward = ward();
        for (date, time) in [(monday(), "09:00"), (monday(), "10:00"), (monday() + Duration::days(10), "09:00")] {
            ward.service
                .create_appointment(ward.patient, booking(&ward, date, time))
                .unwrap();
        }
        let other = register(&mut ward.service, "otieno");

        let mine = ward
            .service
            .list_appointments(ward.patient, AppointmentFilter::default())
            .unwrap();
        assert_eq!(mine.appointments.len(), 3);
        assert_eq!(
            mine.appointments[0].appointment.appointment_date,
            monday() + Duration::days(10)
        );
        assert_eq!(mine.appointments[1].appointment.appointment_time.format("%H:%M").to_string(), "10:00");
        assert_eq!(
            mine.summary,
            AppointmentSummary {
                today: 2,
                scheduled: 3,
                this_week: 2,
                completed: 0,
            }
        );

        let theirs = ward
            .service
            .list_appointments(other, AppointmentFilter::default())
            .unwrap();
        assert!(theirs.appointments.is_empty());

        let filtered = ward
            .service
            .list_appointments(
                ward.doctor,
                AppointmentFilter {
                    date_from: Some(monday() + Duration::days(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(filtered.appointments.len(), 1);

        let cashier = with_role(&mut ward.service, ward.admin, "cashier", Role::BillingStaff);
        assert!(ward
            .service
            .list_appointments(cashier, AppointmentFilter::default())
            .is_err());
    }

    #[test]
    fn test_delete_detaches_references() {
        let mut ward = ward();
        let id = ward
            .service
            .create_appointment(ward.patient, booking(&ward, monday(), "09:00"))
            .unwrap()
            .appointment
            .appointment_id;

        assert!(ward.service.delete_appointment(ward.doctor, &id).is_err());
        ward.service.delete_appointment(ward.admin, &id).unwrap();
        assert!(ward.service.get_appointment(ward.admin, &id).is_err());
    }

    #[test]
    fn test_doctor_directory() {
        let mut ward = ward();
        assert_eq!(ward.service.list_doctors(ward.patient).unwrap().len(), 1);

        assert!(ward
            .service
            .update_doctor_profile(ward.patient, &ward.doctor_id, DoctorUpdate::default())
            .is_err());

        let view = ward
            .service
            .update_doctor_profile(
                ward.doctor,
                &ward.doctor_id,
                DoctorUpdate {
                    specialization: Some("Paediatrics".into()),
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(view.doctor.specialization, "Paediatrics");
        assert!(ward.service.list_doctors(ward.patient).unwrap().is_empty());

        // Un médecin indisponible ne peut pas être réservé
        assert!(matches!(
            ward.service
                .create_appointment(ward.patient, booking(&ward, monday(), "09:00")),
            Err(ServiceError::InvalidState(_))
        ));

        let bad_schedule = ward.service.set_schedule(
            ward.admin,
            &ward.doctor_id,
            ScheduleForm {
                day_of_week: DayOfWeek::Friday,
                start_time: "14:00".into(),
                end_time: "09:00".into(),
                is_active: true,
            },
        );
        assert!(matches!(bad_schedule, Err(ServiceError::InvalidInput(_))));
    }
}
