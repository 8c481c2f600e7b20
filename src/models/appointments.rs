//! Médecins, horaires et rendez-vous

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{AppointmentID, DoctorID, Money, PatientID, Pk, UserID};

/// Profil d'un médecin
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{doctor_id} - {specialization}")]
pub struct Doctor {
    pub doctor_id: DoctorID,
    pub user: UserID,
    pub specialization: String,
    pub license_number: String,
    pub consultation_fee: Money,
    pub years_of_experience: u32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
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
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

/// Plage de consultation d'un médecin pour un jour de la semaine.
/// Au plus une par médecin et par jour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Pk,
    pub doctor: DoctorID,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl DoctorSchedule {
    /// `[start, end)`
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }
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
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Un créneau est occupé tant que le rendez-vous est prévu ou confirmé
    pub fn books_slot(self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    pub fn can_become(self, next: Self) -> bool {
        use AppointmentStatus::*;

        match (self, next) {
            (Scheduled, Confirmed) => true,
            (Scheduled | Confirmed, InProgress | Completed | Cancelled | NoShow) => true,
            (InProgress, Completed | Cancelled) => true,
            _ => false,
        }
    }
}

/// Un rendez-vous entre un patient et un médecin
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{appointment_id} ({status})")]
pub struct Appointment {
    pub appointment_id: AppointmentID,
    pub patient: PatientID,
    pub doctor: DoctorID,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// `APT-{YYYYMMDD}-{XXXXXXXX}`, daté du jour de création
    pub fn new_id(today: NaiveDate) -> AppointmentID {
        AppointmentID::from(format!(
            "APT-{}-{}",
            today.format("%Y%m%d"),
            super::random_suffix()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use AppointmentStatus::*;

    #[test]
    fn test_terminal_statuses_are_final() {
        for terminal in [Completed, Cancelled, NoShow] {
            assert!(terminal.is_terminal());
            for next in AppointmentStatus::iter() {
                assert!(!terminal.can_become(next), "{terminal} -> {next} was allowed");
            }
        }
    }

    #[test]
    fn test_transitions() {
        assert!(Scheduled.can_become(Confirmed));
        assert!(!Confirmed.can_become(Confirmed));
        assert!(!Confirmed.can_become(Scheduled));
        assert!(Confirmed.can_become(InProgress));
        assert!(InProgress.can_become(Completed));
        assert!(!InProgress.can_become(NoShow));
        assert!(!InProgress.can_become(Confirmed));
    }

    #[test]
    fn test_books_slot() {
        let booking: Vec<_> = AppointmentStatus::iter().filter(|s| s.books_slot()).collect();
        assert_eq!(booking, [Scheduled, Confirmed]);
    }

    #[test]
    fn test_schedule_bounds() {
        let schedule = DoctorSchedule {
            id: 1,
            doctor: DoctorID::from("DOC00001"),
            day_of_week: DayOfWeek::Monday,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            is_active: true,
        };
        assert!(schedule.covers(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(schedule.covers(NaiveTime::from_hms_opt(11, 30, 0).unwrap()));
        assert!(!schedule.covers(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!schedule.covers(NaiveTime::from_hms_opt(8, 30, 0).unwrap()));
    }

    #[test]
    fn test_appointment_id_format() {
        let id = Appointment::new_id(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert!(id.as_str().starts_with("APT-20240309-"));
        assert_eq!(id.as_str().len(), "APT-20240309-".len() + 8);
    }
}
