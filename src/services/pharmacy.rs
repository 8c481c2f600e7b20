//! Pharmacie: médicaments, stock par lot, alertes et délivrance

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Service, ServiceError};
use crate::authorization::Action;
use crate::consts::STOCK_ALERTS_MAX;
use crate::models::*;
use crate::utils::input_validation::{optional_text, short_text, InvalidInput};

#[derive(Debug, Clone, Deserialize)]
pub struct MedicineForm {
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub description: Option<String>,
    pub unit_of_measurement: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryForm {
    pub medicine: Pk,
    pub batch_number: String,
    pub quantity_in_stock: u32,
    pub unit_price: Money,
    pub expiry_date: NaiveDate,
    pub supplier: Option<String>,
    pub date_received: Option<NaiveDate>,
    pub minimum_stock_level: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StockUpdate {
    pub quantity_in_stock: Option<u32>,
    pub unit_price: Option<Money>,
    pub minimum_stock_level: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispenseForm {
    pub prescription: Pk,
    pub inventory_item: Pk,
    pub quantity: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub medicine_name: String,
    pub status: StockStatus,
    pub days_to_expiry: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PharmacyDashboard {
    pub medicine_count: usize,
    pub pending_prescriptions: usize,
    pub low_stock: usize,
    pub alerts: Vec<InventoryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispensingView {
    #[serde(flatten)]
    pub dispensing: Dispensing,
    pub medicine_name: String,
    pub medication_name: String,
    pub pharmacist_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SelectOption {
    pub id: Pk,
    pub label: String,
}

impl Service {
    fn inventory_view(&self, item: &InventoryItem) -> InventoryView {
        let today = self.today();
        InventoryView {
            item: item.clone(),
            medicine_name: self
                .db
                .get_medicine(&item.medicine)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            status: item.stock_status(today),
            days_to_expiry: item.days_to_expiry(today),
        }
    }

    pub fn add_medicine(&mut self, actor: UserID, form: MedicineForm) -> Result<Medicine, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageInventory)?;

        let name = short_text(&form.name, "medicine name")?;
        let generic_name = optional_text(form.generic_name.as_deref(), "generic name")?;
        if self
            .db
            .list_medicines()
            .any(|m| m.name.eq_ignore_ascii_case(&name) && m.generic_name.eq_ignore_ascii_case(&generic_name))
        {
            return Err(ServiceError::Conflict(vec![format!("{name} is already registered")]));
        }

        let unit = match form.unit_of_measurement.as_deref().map(str::trim) {
            Some(unit) if !unit.is_empty() => short_text(unit, "unit of measurement")?,
            _ => "tablets".to_owned(),
        };

        let medicine = Medicine {
            id: self.db.allocate_pk(),
            name,
            generic_name,
            manufacturer: optional_text(form.manufacturer.as_deref(), "manufacturer")?,
            description: optional_text(form.description.as_deref(), "description")?,
            unit_of_measurement: unit,
            created_at: self.now(),
        };

        self.db.store_medicine(medicine.clone());
        self.commit()?;
        Ok(medicine)
    }

    /// Réception d'un lot
    pub fn add_inventory(&mut self, actor: UserID, form: InventoryForm) -> Result<InventoryView, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageInventory)?;

        self.db.get_medicine(&form.medicine)?;
        let batch_number = short_text(&form.batch_number, "batch number")?;
        if self
            .db
            .list_inventory()
            .any(|i| i.medicine == form.medicine && i.batch_number == batch_number)
        {
            return Err(ServiceError::Conflict(vec![format!("Batch {batch_number} already in stock")]));
        }
        if form.unit_price.is_negative() {
            return Err(InvalidInput("unit price").into());
        }
        if form.expiry_date <= self.today() {
            return Err(InvalidInput("expiry date").into());
        }

        let now = self.now();
        let item = InventoryItem {
            id: self.db.allocate_pk(),
            medicine: form.medicine,
            batch_number,
            quantity_in_stock: form.quantity_in_stock,
            unit_price: form.unit_price,
            expiry_date: form.expiry_date,
            supplier: optional_text(form.supplier.as_deref(), "supplier")?,
            date_received: form.date_received.unwrap_or(now.date_naive()),
            minimum_stock_level: form.minimum_stock_level.unwrap_or(DEFAULT_MINIMUM_STOCK),
            created_at: now,
            updated_at: now,
        };

        info!("Batch {} received: {} units", item.batch_number, item.quantity_in_stock);
        self.db.store_inventory_item(item.clone());
        self.commit()?;
        Ok(self.inventory_view(&item))
    }

    pub fn update_stock(&mut self, actor: UserID, id: Pk, changes: StockUpdate) -> Result<InventoryView, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageInventory)?;
        if changes.unit_price.is_some_and(Money::is_negative) {
            return Err(InvalidInput("unit price").into());
        }

        let now = self.now();
        let item = self.db.get_inventory_item_mut(&id)?;
        if let Some(quantity) = changes.quantity_in_stock {
            item.quantity_in_stock = quantity;
        }
        if let Some(price) = changes.unit_price {
            item.unit_price = price;
        }
        if let Some(minimum) = changes.minimum_stock_level {
            item.minimum_stock_level = minimum;
        }
        item.updated_at = now;
        let item = item.clone();

        self.commit()?;
        Ok(self.inventory_view(&item))
    }

    /// Délivre une ordonnance depuis un lot. Le patient est prévenu.
    pub fn dispense(&mut self, actor: UserID, form: DispenseForm) -> Result<Dispensing, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::Dispense)?;
        let pharmacist = self
            .db
            .pharmacist_by_user(actor)
            .ok_or(ServiceError::MissingProfile("pharmacist"))?
            .pharmacist_id
            .clone();

        let prescription = self.db.get_prescription(&form.prescription)?;
        if prescription.is_dispensed {
            return Err(ServiceError::InvalidState("Prescription already dispensed"));
        }
        let medication = prescription.medication_name.clone();
        let record = prescription.medical_record.clone();

        let item = self.db.get_inventory_item(&form.inventory_item)?;
        if form.quantity == 0 || form.quantity > item.quantity_in_stock {
            return Err(ServiceError::InsufficientStock {
                available: item.quantity_in_stock,
                requested: form.quantity,
            });
        }
        if item.expiry_date < self.today() {
            return Err(ServiceError::InvalidState("Batch has expired"));
        }
        let notes = optional_text(form.notes.as_deref(), "notes")?;

        let now = self.now();
        let item = self.db.get_inventory_item_mut(&form.inventory_item)?;
        item.quantity_in_stock -= form.quantity;
        item.updated_at = now;
        let remaining = item.quantity_in_stock;

        let prescription = self.db.get_prescription_mut(&form.prescription)?;
        prescription.is_dispensed = true;
        prescription.dispensed_at = Some(now);
        prescription.dispensed_by = Some(actor);

        let dispensing = Dispensing {
            id: self.db.allocate_pk(),
            prescription: form.prescription,
            inventory_item: form.inventory_item,
            pharmacist,
            quantity_dispensed: form.quantity,
            dispensed_at: now,
            notes,
        };
        self.db.store_dispensing(dispensing.clone());
        info!(
            "Prescription {} dispensed: {} units from item {} ({remaining} left)",
            form.prescription, form.quantity, form.inventory_item
        );

        match self.db.get_record(&record).and_then(|r| self.db.get_patient(&r.patient)) {
            Ok(patient) => {
                let recipient = patient.user;
                self.notify(
                    recipient,
                    NotificationKind::PrescriptionReady,
                    &json!({
                        "patient_name": self.full_name(recipient),
                        "medication": medication,
                        "quantity": form.quantity,
                    }),
                );
            }
            Err(e) => warn!("No patient to notify for prescription {}: {e}", form.prescription),
        }

        self.commit()?;
        Ok(dispensing)
    }

    pub fn inventory_status(&self, actor: UserID, id: Pk) -> Result<InventoryView, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ReadInventory)?;
        Ok(self.inventory_view(self.db.get_inventory_item(&id)?))
    }

    /// Tout le stock avec son état, trié par médicament puis péremption
    pub fn inventory_list(&self, actor: UserID) -> Result<Vec<InventoryView>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ReadInventory)?;

        let mut items: Vec<InventoryView> = self.db.list_inventory().map(|i| self.inventory_view(i)).collect();
        items.sort_by(|a, b| {
            (&a.medicine_name, a.item.expiry_date, a.item.id).cmp(&(&b.medicine_name, b.item.expiry_date, b.item.id))
        });
        Ok(items)
    }

    fn alerts(&self) -> Vec<InventoryView> {
        let today = self.today();
        let mut alerts: Vec<&InventoryItem> = self
            .db
            .list_inventory()
            .filter(|i| i.needs_alert(today))
            .collect();
        alerts.sort_by_key(|i| (i.quantity_in_stock, i.id));
        alerts
            .into_iter()
            .take(STOCK_ALERTS_MAX)
            .map(|i| self.inventory_view(i))
            .collect()
    }

    /// Lots sous le minimum ou proches de la péremption, les plus bas d'abord
    pub fn stock_alerts(&self, actor: UserID) -> Result<Vec<InventoryView>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ReadInventory)?;
        Ok(self.alerts())
    }

    pub(super) fn pharmacy_summary(&self) -> PharmacyDashboard {
        PharmacyDashboard {
            medicine_count: self.db.list_medicines().count(),
            pending_prescriptions: self.db.list_prescriptions().filter(|p| !p.is_dispensed).count(),
            low_stock: self
                .db
                .list_inventory()
                .filter(|i| i.quantity_in_stock <= i.minimum_stock_level)
                .count(),
            alerts: self.alerts(),
        }
    }

    pub fn pharmacy_dashboard(&self, actor: UserID) -> Result<PharmacyDashboard, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageInventory)?;
        Ok(self.pharmacy_summary())
    }

    /// Délivrances, les plus récentes d'abord
    pub fn dispensing_history(&self, actor: UserID) -> Result<Vec<DispensingView>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageInventory)?;

        let mut history: Vec<DispensingView> = self
            .db
            .list_dispensings()
            .map(|d| DispensingView {
                dispensing: d.clone(),
                medicine_name: self
                    .db
                    .get_inventory_item(&d.inventory_item)
                    .and_then(|i| self.db.get_medicine(&i.medicine))
                    .map(|m| m.name.clone())
                    .unwrap_or_default(),
                medication_name: self
                    .db
                    .get_prescription(&d.prescription)
                    .map(|p| p.medication_name.clone())
                    .unwrap_or_default(),
                pharmacist_name: self
                    .db
                    .get_pharmacist(&d.pharmacist)
                    .map(|p| self.full_name(p.user))
                    .unwrap_or_default(),
            })
            .collect();
        history.sort_by(|a, b| {
            (b.dispensing.dispensed_at, b.dispensing.id).cmp(&(a.dispensing.dispensed_at, a.dispensing.id))
        });
        Ok(history)
    }

    /// Lots disponibles pour un choix de médicament: `"{nom} (Stock: {qté})"`
    pub fn medicines_for_select(&self, actor: UserID) -> Result<Vec<SelectOption>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ReadInventory)?;

        let mut options: Vec<(String, Pk, u32)> = self
            .db
            .list_inventory()
            .filter(|i| i.quantity_in_stock > 0)
            .filter_map(|i| {
                let medicine = self.db.get_medicine(&i.medicine).ok()?;
                Some((medicine.name.clone(), i.id, i.quantity_in_stock))
            })
            .collect();
        options.sort();

        Ok(options
            .into_iter()
            .map(|(name, id, quantity)| SelectOption {
                id,
                label: format!("{name} (Stock: {quantity})"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::medical_records::{PrescriptionForm, RecordForm};
    use crate::services::test_support::*;
    use chrono::Duration;

    struct Dispensary {
        ward: Ward,
        chemist: UserID,
        paracetamol: Pk,
    }

    fn dispensary() -> Dispensary {
        let mut ward = ward();
        let chemist = with_role(&mut ward.service, ward.admin, "chemist", Role::Pharmacist);
        let paracetamol = ward
            .service
            .add_medicine(
                chemist,
                MedicineForm {
                    name: "Paracetamol".into(),
                    generic_name: Some("Acetaminophen".into()),
                    manufacturer: None,
                    description: None,
                    unit_of_measurement: None,
                },
            )
            .unwrap()
            .id;
        Dispensary {
            ward,
            chemist,
            paracetamol,
        }
    }

    fn today() -> NaiveDate {
        fixed_now().date_naive()
    }

    fn batch(d: &mut Dispensary, number: &str, quantity: u32, expires_in_days: i64) -> Pk {
        d.ward
            .service
            .add_inventory(
                d.chemist,
                InventoryForm {
                    medicine: d.paracetamol,
                    batch_number: number.into(),
                    quantity_in_stock: quantity,
                    unit_price: Money::from_cents(500),
                    expiry_date: today() + Duration::days(expires_in_days),
                    supplier: Some("KEMSA".into()),
                    date_received: None,
                    minimum_stock_level: None,
                },
            )
            .unwrap()
            .item
            .id
    }

    fn prescription(d: &mut Dispensary) -> Pk {
        let patient = d.ward.patient_id.clone();
        let record = d
            .ward
            .service
            .create_record(
                d.ward.doctor,
                &patient,
                RecordForm {
                    appointment: None,
                    diagnosis: "Malaria".into(),
                    symptoms: "Fever".into(),
                    treatment_plan: "Antipyretics".into(),
                    notes: None,
                    follow_up_date: None,
                },
            )
            .unwrap()
            .record
            .record_id;
        d.ward
            .service
            .add_prescription(
                d.ward.doctor,
                &record,
                PrescriptionForm {
                    medication_name: "Paracetamol".into(),
                    dosage: "1g".into(),
                    frequency: "Every 8 hours".into(),
                    duration: "3 days".into(),
                    instructions: None,
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn test_medicines() {
        let mut d = dispensary();
        let medicine = d.ward.service.db.get_medicine(&d.paracetamol).unwrap();
        assert_eq!(medicine.unit_of_measurement, "tablets");

        let duplicate = MedicineForm {
            name: "paracetamol".into(),
            generic_name: Some("acetaminophen".into()),
            manufacturer: None,
            description: None,
            unit_of_measurement: None,
        };
        assert!(matches!(
            d.ward.service.add_medicine(d.chemist, duplicate.clone()),
            Err(ServiceError::Conflict(_))
        ));
        assert!(d.ward.service.add_medicine(d.ward.doctor, duplicate).is_err());
    }

    #[test]
    fn test_inventory_status() {
        let mut d = dispensary();
        let normal = batch(&mut d, "B-100", 200, 400);
        let low = batch(&mut d, "B-101", 8, 400);
        let critical = batch(&mut d, "B-102", 3, 400);
        let expiring = batch(&mut d, "B-103", 200, 60);

        let status = |d: &Dispensary, id| d.ward.service.inventory_status(d.chemist, id).unwrap().status;
        assert_eq!(status(&d, normal), StockStatus::Normal);
        assert_eq!(status(&d, low), StockStatus::Low);
        assert_eq!(status(&d, critical), StockStatus::Critical);
        assert_eq!(status(&d, expiring), StockStatus::Expiring);

        let alerts = d.ward.service.stock_alerts(d.ward.doctor).unwrap();
        let ids: Vec<Pk> = alerts.iter().map(|a| a.item.id).collect();
        assert_eq!(ids, [critical, low, expiring]);

        let dashboard = d.ward.service.pharmacy_dashboard(d.chemist).unwrap();
        assert_eq!(dashboard.medicine_count, 1);
        assert_eq!(dashboard.low_stock, 2);
        assert!(d.ward.service.pharmacy_dashboard(d.ward.doctor).is_err());

        assert!(matches!(
            d.ward.service.add_inventory(
                d.chemist,
                InventoryForm {
                    medicine: d.paracetamol,
                    batch_number: "B-100".into(),
                    quantity_in_stock: 1,
                    unit_price: Money::ZERO,
                    expiry_date: today(),
                    supplier: None,
                    date_received: None,
                    minimum_stock_level: None,
                },
            ),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn test_update_stock() {
        let mut d = dispensary();
        let id = batch(&mut d, "B-200", 4, 400);
        assert_eq!(
            d.ward.service.inventory_status(d.chemist, id).unwrap().status,
            StockStatus::Critical
        );

        let view = d
            .ward
            .service
            .update_stock(
                d.chemist,
                id,
                StockUpdate {
                    quantity_in_stock: Some(120),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(view.status, StockStatus::Normal);
        assert!(d.ward.service.update_stock(d.ward.patient, id, StockUpdate::default()).is_err());
    }

    #[test]
    fn test_dispense() {
        let mut d = dispensary();
        let item = batch(&mut d, "B-300", 30, 400);
        let prescription = prescription(&mut d);
        let form = |quantity| DispenseForm {
            prescription,
            inventory_item: item,
            quantity,
            notes: None,
        };

        // Réservé aux pharmaciens
        assert!(d.ward.service.dispense(d.ward.admin, form(10)).is_err());
        assert!(matches!(
            d.ward.service.dispense(d.chemist, form(31)),
            Err(ServiceError::InsufficientStock {
                available: 30,
                requested: 31
            })
        ));
        assert!(matches!(
            d.ward.service.dispense(d.chemist, form(0)),
            Err(ServiceError::InsufficientStock { .. })
        ));

        let dispensing = d.ward.service.dispense(d.chemist, form(10)).unwrap();
        assert_eq!(dispensing.quantity_dispensed, 10);
        assert_eq!(dispensing.dispensed_at, fixed_now());

        let stock = d.ward.service.inventory_status(d.chemist, item).unwrap();
        assert_eq!(stock.item.quantity_in_stock, 20);

        let stored = d.ward.service.db.get_prescription(&prescription).unwrap();
        assert!(stored.is_dispensed);
        assert_eq!(stored.dispensed_by, Some(d.chemist));
        assert_eq!(stored.dispensed_at, Some(fixed_now()));

        assert!(matches!(
            d.ward.service.dispense(d.chemist, form(1)),
            Err(ServiceError::InvalidState(_))
        ));

        let inbox = d.ward.service.my_notifications(d.ward.patient, true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].message.contains("Paracetamol"));

        let history = d.ward.service.dispensing_history(d.chemist).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].pharmacist_name, "chemist Test");
    }

    #[test]
    fn test_expired_batch_is_refused_at_reception() {
        let mut d = dispensary();
        for (number, expiry_date) in [("B-450", today()), ("B-451", today() - Duration::days(1))] {
            let result = d.ward.service.add_inventory(
                d.chemist,
                InventoryForm {
                    medicine: d.paracetamol,
                    batch_number: number.into(),
                    quantity_in_stock: 10,
                    unit_price: Money::from_cents(500),
                    expiry_date,
                    supplier: None,
                    date_received: None,
                    minimum_stock_level: None,
                },
            );
            assert!(matches!(result, Err(ServiceError::InvalidInput(_))), "{number}");
        }
        assert!(d.ward.service.inventory_list(d.chemist).unwrap().is_empty());
    }

    #[test]
    fn test_expired_batch_is_not_dispensed() {
        let mut d = dispensary();
        let item = batch(&mut d, "B-400", 30, 2);
        let prescription = prescription(&mut d);
        let later = fixed_now() + Duration::days(3);
        d.ward.service.clock = std::sync::Arc::new(move || later);
        let result = d.ward.service.dispense(
            d.chemist,
            DispenseForm {
                prescription,
                inventory_item: item,
                quantity: 1,
                notes: None,
            },
        );
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[test]
    fn test_select_options() {
        let mut d = dispensary();
        batch(&mut d, "B-500", 12, 400);
        let empty = batch(&mut d, "B-501", 0, 400);
        let amoxicillin = d
            .ward
            .service
            .add_medicine(
                d.chemist,
                MedicineForm {
                    name: "Amoxicillin".into(),
                    generic_name: None,
                    manufacturer: Some("Cosmos".into()),
                    description: None,
                    unit_of_measurement: Some("capsules".into()),
                },
            )
            .unwrap()
            .id;
        d.ward
            .service
            .add_inventory(
                d.chemist,
                InventoryForm {
                    medicine: amoxicillin,
                    batch_number: "A-1".into(),
                    quantity_in_stock: 40,
                    unit_price: Money::from_cents(1_200),
                    expiry_date: today() + Duration::days(400),
                    supplier: None,
                    date_received: None,
                    minimum_stock_level: Some(5),
                },
            )
            .unwrap();

        let options = d.ward.service.medicines_for_select(d.ward.doctor).unwrap();
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["Amoxicillin (Stock: 40)", "Paracetamol (Stock: 12)"]);
        assert!(options.iter().all(|o| o.id != empty));
        assert!(d.ward.service.medicines_for_select(d.ward.patient).is_err());
    }
}
