//! Tableau de bord, dont le contenu dépend du rôle

use std::collections::BTreeMap;

use serde::Serialize;

use super::appointments::AppointmentView;
use super::billing::BillingDashboard;
use super::pharmacy::PharmacyDashboard;
use super::{Service, ServiceError};
use crate::models::*;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Patient {
        upcoming_appointments: Vec<AppointmentView>,
        outstanding_balance: Money,
        unread_notifications: usize,
    },
    Doctor {
        todays_appointments: Vec<AppointmentView>,
        pending_confirmations: usize,
        records_written: usize,
    },
    Pharmacist(PharmacyDashboard),
    BillingStaff(BillingDashboard),
    Administrator {
        users_by_role: BTreeMap<Role, usize>,
        todays_appointments: Vec<AppointmentView>,
        billing: BillingDashboard,
    },
}

impl Service {
    fn todays_appointments(&self, doctor: Option<&DoctorID>) -> Vec<AppointmentView> {
        let today = self.today();
        let mut appointments: Vec<&Appointment> = self
            .db
            .list_appointments()
            .filter(|a| a.appointment_date == today)
            .filter(|a| doctor.map_or(true, |d| &a.doctor == d))
            .collect();
        appointments.sort_by_key(|a| a.appointment_time);
        appointments.into_iter().map(|a| self.appointment_view(a)).collect()
    }

    pub fn dashboard(&self, actor: UserID) -> Result<Dashboard, ServiceError> {
        let subject = self.principal(actor)?;
        let today = self.today();

        Ok(match subject.role {
            Role::Patient => {
                let patient = self.actor_patient(actor)?;
                let mut upcoming: Vec<&Appointment> = self
                    .db
                    .list_appointments()
                    .filter(|a| a.patient == patient.patient_id)
                    .filter(|a| a.appointment_date >= today && a.status.books_slot())
                    .collect();
                upcoming.sort_by_key(|a| (a.appointment_date, a.appointment_time));

                Dashboard::Patient {
                    upcoming_appointments: upcoming.into_iter().map(|a| self.appointment_view(a)).collect(),
                    outstanding_balance: self
                        .db
                        .list_bills()
                        .filter(|b| b.patient == patient.patient_id && !b.status.is_closed())
                        .map(Bill::balance_due)
                        .sum(),
                    unread_notifications: self.unread_count(actor),
                }
            }
            Role::Doctor => {
                let doctor = self.actor_doctor(actor)?;
                Dashboard::Doctor {
                    todays_appointments: self.todays_appointments(Some(&doctor.doctor_id)),
                    pending_confirmations: self
                        .db
                        .list_appointments()
                        .filter(|a| a.doctor == doctor.doctor_id)
                        .filter(|a| a.status == AppointmentStatus::Scheduled && a.appointment_date >= today)
                        .count(),
                    records_written: self
                        .db
                        .list_records()
                        .filter(|r| r.doctor == doctor.doctor_id)
                        .count(),
                }
            }
            Role::Pharmacist => Dashboard::Pharmacist(self.pharmacy_summary()),
            Role::BillingStaff => Dashboard::BillingStaff(self.billing_summary()),
            Role::Administrator => Dashboard::Administrator {
                users_by_role: self.count_roles(),
                todays_appointments: self.todays_appointments(None),
                billing: self.billing_summary(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::appointments::AppointmentForm;
    use crate::services::test_support::*;
    use chrono::Duration;

    fn book(ward: &mut Ward, days_ahead: i64, time: &str) {
        let form = AppointmentForm {
            patient: None,
            doctor: Some(ward.doctor_id.clone()),
            appointment_date: fixed_now().date_naive() + Duration::days(days_ahead),
            appointment_time: time.into(),
            reason: "Review".into(),
        };
        ward.service.create_appointment(ward.patient, form).unwrap();
    }

    #[test]
    fn test_patient_dashboard() {
        let mut ward = ward();
        book(&mut ward, 3, "09:00");
        book(&mut ward, 0, "14:00");
        book(&mut ward, -2, "09:00");

        match ward.service.dashboard(ward.patient).unwrap() {
            Dashboard::Patient {
                upcoming_appointments,
                outstanding_balance,
                unread_notifications,
            } => {
                assert_eq!(upcoming_appointments.len(), 2);
                assert_eq!(
                    upcoming_appointments[0].appointment.appointment_date,
                    fixed_now().date_naive()
                );
                assert_eq!(outstanding_balance, Money::ZERO);
                assert_eq!(unread_notifications, 0);
            }
            other => panic!("Unexpected dashboard {other:?}"),
        }
    }

    #[test]
    fn test_doctor_dashboard() {
        let mut ward = ward();
        book(&mut ward, 0, "11:00");
        book(&mut ward, 0, "08:30");
        book(&mut ward, 1, "09:00");

        match ward.service.dashboard(ward.doctor).unwrap() {
            Dashboard::Doctor {
                todays_appointments,
                pending_confirmations,
                records_written,
            } => {
                let times: Vec<String> = todays_appointments
                    .iter()
                    .map(|a| a.appointment.appointment_time.format("%H:%M").to_string())
                    .collect();
                assert_eq!(times, ["08:30", "11:00"]);
                assert_eq!(pending_confirmations, 3);
                assert_eq!(records_written, 0);
            }
            other => panic!("Unexpected dashboard {other:?}"),
        }
    }

    #[test]
    fn test_staff_dashboards() {
        let mut ward = ward();
        let chemist = with_role(&mut ward.service, ward.admin, "chemist", Role::Pharmacist);
        let cashier = with_role(&mut ward.service, ward.admin, "cashier", Role::BillingStaff);

        assert!(matches!(ward.service.dashboard(chemist).unwrap(), Dashboard::Pharmacist(_)));
        assert!(matches!(ward.service.dashboard(cashier).unwrap(), Dashboard::BillingStaff(_)));

        match ward.service.dashboard(ward.admin).unwrap() {
            Dashboard::Administrator { users_by_role, .. } => {
                assert_eq!(users_by_role[&Role::Administrator], 1);
                assert_eq!(users_by_role[&Role::Doctor], 1);
                assert_eq!(users_by_role[&Role::Patient], 1);
                assert_eq!(users_by_role[&Role::Pharmacist], 1);
                assert_eq!(users_by_role[&Role::BillingStaff], 1);
            }
            other => panic!("Unexpected dashboard {other:?}"),
        }

        let json = serde_json::to_value(ward.service.dashboard(cashier).unwrap()).unwrap();
        assert_eq!(json["role"], "billing_staff");
    }
}
