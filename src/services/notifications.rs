//! Notifications in-app, rendues depuis des gabarits handlebars

use handlebars::Handlebars;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Service, ServiceError};
use crate::authorization::{Action, Parties};
use crate::models::*;
use crate::utils::input_validation::{long_text, short_text, InvalidInput};

/// Les messages sont du texte brut, pas du HTML
static RENDERER: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
});

/// Gabarits installés sur une base vide: (type, nom, sujet, message)
const DEFAULT_TEMPLATES: [(NotificationKind, &str, &str, &str); 6] = [
    (
        NotificationKind::AppointmentReminder,
        "Appointment reminder",
        "Upcoming appointment",
        "Dear {{patient_name}}, this is a reminder of your appointment with Dr. {{doctor_name}} on {{date}} at {{time}}.",
    ),
    (
        NotificationKind::AppointmentConfirmation,
        "Appointment confirmation",
        "Appointment confirmed",
        "Dear {{patient_name}}, your appointment {{appointment_id}} with Dr. {{doctor_name}} on {{date}} at {{time}} is confirmed.",
    ),
    (
        NotificationKind::PaymentDue,
        "Payment due",
        "Outstanding balance",
        "Dear {{patient_name}}, a balance of {{balance}} remains on bill {{bill_id}}, due on {{due_date}}.",
    ),
    (
        NotificationKind::PrescriptionReady,
        "Prescription ready",
        "Your prescription is ready",
        "Dear {{patient_name}}, your prescription for {{medication}} ({{quantity}}) has been dispensed.",
    ),
    (
        NotificationKind::TestResults,
        "Test results",
        "Lab results available",
        "Dear {{patient_name}}, the results of your {{test_name}} test are available.",
    ),
    (
        NotificationKind::SystemAlert,
        "System alert",
        "{{subject}}",
        "{{message}}",
    ),
];

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateForm {
    pub name: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub message_template: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

fn render(template: &NotificationTemplate, data: &Value) -> Result<(String, String), handlebars::RenderError> {
    let subject = RENDERER.render_template(&template.subject, data)?;
    let message = RENDERER.render_template(&template.message_template, data)?;
    Ok((subject, message))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemAlert {
    pub role: Option<Role>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AlertReport {
    pub sent: usize,
}

impl Service {
    /// Installe les gabarits par défaut si la table est vide
    pub(super) fn install_default_templates(&mut self) {
        if self.db.list_templates().next().is_some() {
            return;
        }

        for (kind, name, subject, message) in DEFAULT_TEMPLATES {
            let id = self.db.allocate_pk();
            self.db.store_template(NotificationTemplate {
                id,
                name: name.to_owned(),
                kind,
                subject: subject.to_owned(),
                message_template: message.to_owned(),
                is_active: true,
            });
        }
        info!("Installed {} default notification templates", DEFAULT_TEMPLATES.len());
    }

    fn active_template(&self, kind: NotificationKind) -> Option<&NotificationTemplate> {
        self.db
            .list_templates()
            .filter(|t| t.kind == kind && t.is_active)
            .min_by_key(|t| t.id)
    }

    /// Envoie une notification in-app. Ne fait jamais échouer l'opération
    /// appelante: un gabarit manquant ou invalide est journalisé et ignoré.
    pub(super) fn notify(&mut self, recipient: UserID, kind: NotificationKind, data: &Value) -> Option<Pk> {
        let Some(template) = self.active_template(kind) else {
            warn!("No active {kind} template, notification to {recipient} skipped");
            return None;
        };

        let (subject, message) = match render(template, data) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!("Cannot render template {}: {e}", template.name);
                return None;
            }
        };
        let template = template.id;

        let now = self.now();
        let notification = Notification {
            id: self.db.allocate_pk(),
            recipient,
            template,
            subject,
            message,
            delivery_method: DeliveryMethod::InApp,
            status: NotificationStatus::Sent,
            scheduled_at: None,
            sent_at: Some(now),
            read_at: None,
            created_at: now,
        };

        info!("Notification {} ({kind}) sent to {recipient}", notification.id);
        let id = notification.id;
        self.db.store_notification(notification);
        Some(id)
    }

    /// Les notifications de l'acteur, les plus récentes d'abord
    pub fn my_notifications(&self, actor: UserID, unread_only: bool) -> Result<Vec<Notification>, ServiceError> {
        self.enforce(actor)?
            .authorize(Action::ReadNotification, Parties::owner(actor))?;

        let mut notifications: Vec<Notification> = self
            .db
            .list_notifications()
            .filter(|n| n.recipient == actor)
            .filter(|n| !unread_only || n.is_unread())
            .cloned()
            .collect();
        notifications.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(notifications)
    }

    pub fn unread_count(&self, actor: UserID) -> usize {
        self.db
            .list_notifications()
            .filter(|n| n.recipient == actor && n.is_unread())
            .count()
    }

    /// Seul le destinataire peut marquer une notification comme lue
    pub fn mark_read(&mut self, actor: UserID, id: Pk) -> Result<Notification, ServiceError> {
        let recipient = self.db.get_notification(&id)?.recipient;
        self.enforce(actor)?
            .authorize(Action::ReadNotification, Parties::owner(recipient))?;

        let now = self.now();
        let notification = self.db.get_notification_mut(&id)?;
        notification.status = NotificationStatus::Read;
        notification.read_at.get_or_insert(now);
        let notification = notification.clone();

        self.commit()?;
        Ok(notification)
    }

    pub fn create_template(&mut self, actor: UserID, form: TemplateForm) -> Result<NotificationTemplate, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageNotifications)?;

        let name = short_text(&form.name, "template name")?;
        let subject = short_text(&form.subject, "subject")?;
        let message_template = form.message_template.trim().to_owned();
        if message_template.is_empty() {
            return Err(InvalidInput("message template").into());
        }

        // Un gabarit qui ne compile pas ne serait jamais rendu
        if Handlebars::new()
            .render_template(&message_template, &json!({}))
            .is_err()
        {
            return Err(InvalidInput("message template").into());
        }

        let template = NotificationTemplate {
            id: self.db.allocate_pk(),
            name,
            kind: form.kind,
            subject,
            message_template,
            is_active: form.is_active,
        };
        self.db.store_template(template.clone());
        self.commit()?;
        Ok(template)
    }

    pub fn list_templates(&self, actor: UserID) -> Result<Vec<NotificationTemplate>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageNotifications)?;

        let mut templates: Vec<NotificationTemplate> = self.db.list_templates().cloned().collect();
        templates.sort_by_key(|t| t.id);
        Ok(templates)
    }

    /// Alerte système à tous les comptes actifs, ou à ceux d'un rôle
    pub fn send_system_alert(&mut self, actor: UserID, alert: SystemAlert) -> Result<AlertReport, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageNotifications)?;

        let subject = short_text(&alert.subject, "subject")?;
        let message = long_text(&alert.message, "message")?;

        let recipients: Vec<UserID> = self
            .db
            .list_users()
            .filter(|u| u.is_active)
            .filter(|u| alert.role.map_or(true, |role| u.role == role))
            .map(|u| u.id)
            .collect();

        let data = json!({ "subject": subject, "message": message });
        let sent = recipients
            .into_iter()
            .filter_map(|recipient| self.notify(recipient, NotificationKind::SystemAlert, &data))
            .count();

        info!("System alert \"{subject}\" sent to {sent} users");
        self.commit()?;
        Ok(AlertReport { sent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_default_templates_cover_every_kind() {
        let mut ward = ward();
        let templates = ward.service.list_templates(ward.admin).unwrap();
        for kind in NotificationKind::iter() {
            assert!(templates.iter().any(|t| t.kind == kind && t.is_active), "{kind}");
        }

        // Pas de doublons à la réinstallation
        ward.service.install_default_templates();
        assert_eq!(ward.service.list_templates(ward.admin).unwrap().len(), templates.len());
    }

    #[test]
    fn test_notify_renders_without_escaping() {
        let mut ward = ward();
        let id = ward.service.notify(
            ward.patient,
            NotificationKind::TestResults,
            &json!({ "patient_name": "Wanjiru <Kamau>", "test_name": "CBC & ESR" }),
        );
        assert!(id.is_some());

        let inbox = ward.service.my_notifications(ward.patient, true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].status, NotificationStatus::Sent);
        assert_eq!(inbox[0].delivery_method, DeliveryMethod::InApp);
        assert!(inbox[0].message.contains("Wanjiru <Kamau>"));
        assert!(inbox[0].message.contains("CBC & ESR"));
        assert_eq!(inbox[0].sent_at, Some(fixed_now()));
    }

    #[test]
    fn test_missing_template_is_skipped() {
        let mut ward = ward();
        for template in ward.service.db.list_templates().map(|t| t.id).collect::<Vec<_>>() {
            ward.service.db.get_template_mut(&template).unwrap().is_active = false;
        }
        assert!(ward
            .service
            .notify(ward.patient, NotificationKind::PaymentDue, &json!({}))
            .is_none());
        assert!(ward.service.my_notifications(ward.patient, false).unwrap().is_empty());
    }

    #[test]
    fn test_only_recipient_marks_read() {
        let mut ward = ward();
        let id = ward
            .service
            .notify(ward.patient, NotificationKind::SystemAlert, &json!({ "subject": "Hi", "message": "Hello" }))
            .unwrap();

        assert!(matches!(
            ward.service.mark_read(ward.doctor, id),
            Err(ServiceError::AccessDenied(_))
        ));
        assert!(ward.service.mark_read(ward.admin, id).is_err());

        let read = ward.service.mark_read(ward.patient, id).unwrap();
        assert_eq!(read.status, NotificationStatus::Read);
        assert!(read.read_at.is_some());
        assert!(ward.service.my_notifications(ward.patient, true).unwrap().is_empty());
        assert_eq!(ward.service.my_notifications(ward.patient, false).unwrap().len(), 1);
        assert_eq!(ward.service.unread_count(ward.patient), 0);
    }

    #[test]
    fn test_system_alert_by_role() {
        let mut ward = ward();
        let alert = SystemAlert {
            role: Some(Role::Doctor),
            subject: "Power outage".into(),
            message: "Generators will be tested at 14:00.".into(),
        };

        assert!(ward.service.send_system_alert(ward.doctor, alert.clone()).is_err());
        assert_eq!(ward.service.send_system_alert(ward.admin, alert).unwrap().sent, 1);

        let inbox = ward.service.my_notifications(ward.doctor, false).unwrap();
        assert_eq!(inbox[0].subject, "Power outage");
        assert_eq!(inbox[0].message, "Generators will be tested at 14:00.");
        assert!(ward.service.my_notifications(ward.patient, false).unwrap().is_empty());

        let everyone = SystemAlert {
            role: None,
            subject: "Maintenance".into(),
            message: "Scheduled downtime tonight.".into(),
        };
        assert_eq!(ward.service.send_system_alert(ward.admin, everyone).unwrap().sent, 3);
    }

    #[test]
    fn test_template_management() {
        let mut ward = ward();
        let form = TemplateForm {
            name: "Reminder SMS".into(),
            kind: NotificationKind::AppointmentReminder,
            subject: "Reminder".into(),
            message_template: "See you on {{date}}".into(),
            is_active: true,
        };
        assert!(ward.service.create_template(ward.patient, form.clone()).is_err());
        let created = ward.service.create_template(ward.admin, form.clone()).unwrap();
        assert_eq!(created.kind, NotificationKind::AppointmentReminder);

        let broken = TemplateForm {
            message_template: "See you on {{#if date}".into(),
            ..form
        };
        assert!(matches!(
            ward.service.create_template(ward.admin, broken),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
