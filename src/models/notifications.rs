//! Modèles de notification et notifications envoyées

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{Pk, UserID};

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
pub enum NotificationKind {
    AppointmentReminder,
    AppointmentConfirmation,
    PaymentDue,
    PrescriptionReady,
    TestResults,
    SystemAlert,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryMethod {
    Email,
    Sms,
    InApp,
    Push,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

/// Gabarit handlebars d'un type de notification
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{name} - {kind}")]
pub struct NotificationTemplate {
    pub id: Pk,
    pub name: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub message_template: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{subject}")]
pub struct Notification {
    pub id: Pk,
    pub recipient: UserID,
    pub template: Pk,
    pub subject: String,
    pub message: String,
    pub delivery_method: DeliveryMethod,
    pub status: NotificationStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}
