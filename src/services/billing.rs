//! Facturation: factures, paiements, échéances, rapports et tarifs

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Service, ServiceError};
use crate::authorization::{Action, Parties};
use crate::consts::{
    DEFAULT_BILL_TERM_DAYS, PAGE_SIZE, RECENT_PAYMENTS, RECENT_PENDING_BILLS, REVENUE_REPORT_DAYS,
};
use crate::models::*;
use crate::utils::input_validation::{optional_text, short_text, InvalidInput};

#[derive(Debug, Clone, Deserialize)]
pub struct ItemForm {
    pub service_type: Pk,
    pub description: Option<String>,
    #[serde(default = "one")]
    pub quantity: u32,
    /// Prix de base du service si absent
    pub unit_price: Option<Money>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillForm {
    pub patient: PatientID,
    pub appointment: Option<AppointmentID>,
    pub items: Vec<ItemForm>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillEdit {
    pub items: Vec<ItemForm>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentForm {
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BillFilter {
    pub status: Option<BillStatus>,
    pub query: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentFilter {
    pub method: Option<PaymentMethod>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceTypeForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_price: Money,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceTypeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<Money>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceTypeFilter {
    pub active: Option<bool>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillView {
    #[serde(flatten)]
    pub bill: Bill,
    pub patient_name: String,
    pub balance_due: Money,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillPage {
    pub bills: Vec<BillView>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Totals {
    pub total: Money,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingDashboard {
    pub revenue_today: Money,
    pub revenue_this_month: Money,
    pub pending_bills: usize,
    pub overdue_bills: usize,
    pub recent_payments: Vec<Payment>,
    pub newest_pending: Vec<BillView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub payment_count: usize,
    pub payments_total: Money,
    pub by_method: BTreeMap<PaymentMethod, Money>,
    pub outstanding: Money,
}

/// Période du rapport de recettes; par défaut les 30 derniers jours
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RevenuePeriod {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRevenue {
    pub service: String,
    pub total_revenue: Money,
    pub quantity_sold: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub payments: Vec<Payment>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub service_revenue: Vec<ServiceRevenue>,
}

impl Service {
    /// Lignes de facture validées; le prix unitaire vient du service par défaut
    fn build_items(&self, items: &[ItemForm]) -> Result<Vec<BillItem>, ServiceError> {
        if items.is_empty() {
            return Err(InvalidInput("items").into());
        }

        items
            .iter()
            .map(|item| -> Result<BillItem, ServiceError> {
                let service = self
                    .db
                    .get_service_type(&item.service_type)
                    .ok()
                    .filter(|s| s.is_active)
                    .ok_or(InvalidInput("service type"))?;
                if item.quantity == 0 {
                    return Err(InvalidInput("quantity").into());
                }
                let unit_price = item.unit_price.unwrap_or(service.base_price);
                if unit_price.is_negative() {
                    return Err(InvalidInput("unit price").into());
                }
                let description = match item.description.as_deref().map(str::trim) {
                    Some(d) if !d.is_empty() => short_text(d, "description")?,
                    _ => service.name.clone(),
                };
                BillItem::new(service.id, description, item.quantity, unit_price)
                    .ok_or_else(|| InvalidInput("amount").into())
            })
            .collect()
    }

    fn items_total(items: &[BillItem]) -> Result<Money, ServiceError> {
        Money::checked_sum(items.iter().map(|i| i.total_price)).ok_or_else(|| InvalidInput("amount").into())
    }

    fn bill_view(&self, bill: &Bill, with_payments: bool) -> BillView {
        let patient_name = self
            .db
            .get_patient(&bill.patient)
            .map(|p| self.full_name(p.user))
            .unwrap_or_default();

        let payments = if with_payments {
            let mut payments: Vec<Payment> = self.db.payments_for(&bill.bill_id).cloned().collect();
            payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
            payments
        } else {
            Vec::new()
        };

        BillView {
            bill: bill.clone(),
            patient_name,
            balance_due: bill.balance_due(),
            payments,
        }
    }

    fn bill_parties(&self, bill: &Bill) -> Result<Parties, ServiceError> {
        Ok(Parties::patient(self.patient_user(&bill.patient)?))
    }

    pub fn create_bill(&mut self, actor: UserID, form: BillForm) -> Result<BillView, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        self.db.get_patient(&form.patient)?;
        if let Some(appointment) = &form.appointment {
            if self.db.get_appointment(appointment)?.patient != form.patient {
                return Err(InvalidInput("appointment").into());
            }
        }

        let items = self.build_items(&form.items)?;
        let total_amount = Self::items_total(&items)?;
        let notes = optional_text(form.notes.as_deref(), "notes")?;
        let now = self.now();
        let issue_date = now.date_naive();
        let due_date = form
            .due_date
            .unwrap_or(issue_date + Duration::days(DEFAULT_BILL_TERM_DAYS));
        if due_date < issue_date {
            return Err(InvalidInput("due date").into());
        }

        let bill = Bill {
            bill_id: BillID::from(format!(
                "BILL{}{:04}",
                issue_date.format("%Y%m%d"),
                self.db.bills_issued_on(issue_date) + 1
            )),
            patient: form.patient,
            appointment: form.appointment,
            total_amount,
            items,
            amount_paid: Money::ZERO,
            status: BillStatus::Pending,
            issue_date,
            due_date,
            created_by: actor,
            notes,
            created_at: now,
        };

        info!("Bill {} issued for {} ({})", bill.bill_id, bill.patient, bill.total_amount);
        let view = self.bill_view(&bill, false);
        self.db.store_bill(bill);
        self.commit()?;
        Ok(view)
    }

    /// Remplace les lignes d'une facture ouverte
    pub fn edit_bill(&mut self, actor: UserID, id: &BillID, edit: BillEdit) -> Result<BillView, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let current = self.db.get_bill(id)?;
        if current.status.is_closed() {
            return Err(ServiceError::InvalidState("Bill is paid or cancelled"));
        }

        let items = self.build_items(&edit.items)?;
        let total = Self::items_total(&items)?;
        if total < current.amount_paid {
            return Err(ServiceError::InvalidState("New total is below the amount already paid"));
        }
        let due_date = edit.due_date.unwrap_or(current.due_date);
        if due_date < current.issue_date {
            return Err(InvalidInput("due date").into());
        }
        let notes = edit
            .notes
            .as_deref()
            .map(|n| optional_text(Some(n), "notes"))
            .transpose()?;

        let today = self.today();
        let bill = self.db.get_bill_mut(id)?;
        bill.items = items;
        bill.total_amount = total;
        bill.due_date = due_date;
        if let Some(notes) = notes {
            bill.notes = notes;
        }
        // Une facture en retard le reste tant qu'elle est due et échue
        bill.status = match bill.settled_status() {
            BillStatus::Paid => BillStatus::Paid,
            _ if bill.status == BillStatus::Overdue && bill.due_date < today => BillStatus::Overdue,
            status => status,
        };
        let bill = bill.clone();

        self.commit()?;
        Ok(self.bill_view(&bill, true))
    }

    /// Encaisse un paiement. Le patient est notifié s'il reste un solde.
    pub fn process_payment(&mut self, actor: UserID, id: &BillID, form: PaymentForm) -> Result<Payment, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let bill = self.db.get_bill(id)?;
        if bill.status.is_closed() {
            return Err(ServiceError::PaymentRejected("bill is paid or cancelled"));
        }
        if !form.amount.is_positive() {
            return Err(ServiceError::PaymentRejected("amount must be positive"));
        }
        if form.amount > bill.balance_due() {
            return Err(ServiceError::PaymentRejected("amount exceeds the balance due"));
        }

        let transaction_reference = optional_text(form.transaction_reference.as_deref(), "transaction reference")?;
        let notes = optional_text(form.notes.as_deref(), "notes")?;
        let now = self.now();

        let payment = Payment {
            payment_id: PaymentID::from(format!(
                "PAY{}{}",
                now.format("%Y%m%d"),
                crate::models::random_suffix()
            )),
            bill: id.clone(),
            amount: form.amount,
            payment_method: form.payment_method,
            transaction_reference,
            payment_date: now,
            processed_by: actor,
            notes,
        };

        let bill = self.db.get_bill_mut(id)?;
        bill.amount_paid += payment.amount;
        bill.status = bill.settled_status();
        let bill = bill.clone();

        info!(
            "Payment {} of {} on bill {} ({})",
            payment.payment_id, payment.amount, bill.bill_id, bill.status
        );
        self.db.store_payment(payment.clone());

        if bill.balance_due().is_positive() {
            if let Ok(patient) = self.db.get_patient(&bill.patient) {
                let recipient = patient.user;
                self.notify(
                    recipient,
                    NotificationKind::PaymentDue,
                    &json!({
                        "patient_name": self.full_name(recipient),
                        "bill_id": bill.bill_id,
                        "balance": bill.balance_due().formatted(),
                        "due_date": bill.due_date.to_string(),
                    }),
                );
            }
        }

        self.commit()?;
        Ok(payment)
    }

    /// Annule une facture sans paiement
    pub fn cancel_bill(&mut self, actor: UserID, id: &BillID) -> Result<BillView, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        if self.db.payments_for(id).next().is_some() {
            return Err(ServiceError::InvalidState("Bill has payments"));
        }

        let bill = self.db.get_bill_mut(id)?;
        if bill.status == BillStatus::Cancelled {
            return Err(ServiceError::InvalidState("Bill is already cancelled"));
        }
        bill.status = BillStatus::Cancelled;
        let bill = bill.clone();

        info!("Bill {id} cancelled by {actor}");
        self.commit()?;
        Ok(self.bill_view(&bill, false))
    }

    /// Passe en retard les factures ouvertes dont l'échéance est dépassée
    pub fn mark_overdue(&mut self, actor: UserID) -> Result<usize, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let today = self.today();
        let overdue: Vec<BillID> = self
            .db
            .list_bills()
            .filter(|b| b.is_overdue_on(today))
            .map(|b| b.bill_id.clone())
            .collect();

        for id in &overdue {
            self.db.get_bill_mut(id)?.status = BillStatus::Overdue;
        }

        info!("{} bills marked overdue", overdue.len());
        self.commit()?;
        Ok(overdue.len())
    }

    pub fn get_bill(&self, actor: UserID, id: &BillID) -> Result<BillView, ServiceError> {
        let bill = self.db.get_bill(id)?;
        self.enforce(actor)?
            .authorize(Action::ReadBill, self.bill_parties(bill)?)?;

        Ok(self.bill_view(bill, true))
    }

    pub fn list_bills(&self, actor: UserID, filter: BillFilter) -> Result<BillPage, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let query = filter
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut bills: Vec<&Bill> = self
            .db
            .list_bills()
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.date_from.map_or(true, |from| b.issue_date >= from))
            .filter(|b| filter.date_to.map_or(true, |to| b.issue_date <= to))
            .filter(|b| {
                query.as_deref().map_or(true, |q| {
                    b.bill_id.as_str().to_lowercase().contains(q) || self.patient_matches(&b.patient, q)
                })
            })
            .collect();
        bills.sort_by(|a, b| (b.created_at, &b.bill_id).cmp(&(a.created_at, &a.bill_id)));

        let total = bills.len();
        let pages = total.div_ceil(PAGE_SIZE).max(1);
        let page = filter.page.unwrap_or(1).clamp(1, pages);

        Ok(BillPage {
            bills: bills
                .into_iter()
                .skip((page - 1) * PAGE_SIZE)
                .take(PAGE_SIZE)
                .map(|b| self.bill_view(b, false))
                .collect(),
            total,
            page,
            pages,
        })
    }

    /// Factures ouvertes d'un patient avec un solde positif
    pub fn patient_pending_bills(&self, actor: UserID, patient: &PatientID) -> Result<Vec<BillView>, ServiceError> {
        let owner = self.patient_user(patient)?;
        self.enforce(actor)?
            .authorize(Action::ReadBill, Parties::patient(owner))?;

        let mut bills: Vec<BillView> = self
            .db
            .list_bills()
            .filter(|b| &b.patient == patient)
            .filter(|b| matches!(b.status, BillStatus::Pending | BillStatus::Partial))
            .filter(|b| b.balance_due().is_positive())
            .map(|b| self.bill_view(b, false))
            .collect();
        bills.sort_by(|a, b| a.bill.due_date.cmp(&b.bill.due_date));
        Ok(bills)
    }

    /// Total d'une liste de lignes, avant création de la facture
    pub fn calculate_total(&self, actor: UserID, items: &[ItemForm]) -> Result<Totals, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let total = Self::items_total(&self.build_items(items)?)?;
        Ok(Totals {
            total,
            formatted: total.formatted(),
        })
    }

    pub fn list_payments(&self, actor: UserID, filter: PaymentFilter) -> Result<Vec<Payment>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let query = filter
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut payments: Vec<Payment> = self
            .db
            .list_payments()
            .filter(|p| filter.method.map_or(true, |m| p.payment_method == m))
            .filter(|p| filter.date_from.map_or(true, |from| p.payment_date.date_naive() >= from))
            .filter(|p| filter.date_to.map_or(true, |to| p.payment_date.date_naive() <= to))
            .filter(|p| {
                query.as_deref().map_or(true, |q| {
                    p.payment_id.as_str().to_lowercase().contains(q)
                        || p.bill.as_str().to_lowercase().contains(q)
                        || p.transaction_reference.to_lowercase().contains(q)
                        || self
                            .db
                            .get_bill(&p.bill)
                            .is_ok_and(|b| self.patient_matches(&b.patient, q))
                })
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| (b.payment_date, &b.payment_id).cmp(&(a.payment_date, &a.payment_id)));
        Ok(payments)
    }

    /// Indicateurs de facturation, sans contrôle d'accès
    pub(super) fn billing_summary(&self) -> BillingDashboard {
        let today = self.today();

        let revenue_today = self
            .db
            .list_payments()
            .filter(|p| p.payment_date.date_naive() == today)
            .map(|p| p.amount)
            .sum();
        let revenue_this_month = self
            .db
            .list_payments()
            .filter(|p| {
                let day = p.payment_date.date_naive();
                day.year() == today.year() && day.month() == today.month()
            })
            .map(|p| p.amount)
            .sum();

        let mut recent_payments: Vec<Payment> = self.db.list_payments().cloned().collect();
        recent_payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        recent_payments.truncate(RECENT_PAYMENTS);

        let mut pending: Vec<&Bill> = self
            .db
            .list_bills()
            .filter(|b| b.status == BillStatus::Pending)
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        BillingDashboard {
            revenue_today,
            revenue_this_month,
            pending_bills: pending.len(),
            overdue_bills: self
                .db
                .list_bills()
                .filter(|b| b.status == BillStatus::Overdue && b.due_date < today)
                .count(),
            recent_payments,
            newest_pending: pending
                .into_iter()
                .take(RECENT_PENDING_BILLS)
                .map(|b| self.bill_view(b, false))
                .collect(),
        }
    }

    pub fn billing_dashboard(&self, actor: UserID) -> Result<BillingDashboard, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;
        Ok(self.billing_summary())
    }

    /// Encaissements sur une période (bornes incluses) et encours total
    pub fn billing_report(&self, actor: UserID, from: NaiveDate, to: NaiveDate) -> Result<BillingReport, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;
        if to < from {
            return Err(InvalidInput("date range").into());
        }

        let payments: Vec<&Payment> = self
            .db
            .list_payments()
            .filter(|p| (from..=to).contains(&p.payment_date.date_naive()))
            .collect();

        let mut by_method: BTreeMap<PaymentMethod, Money> = BTreeMap::new();
        for payment in &payments {
            *by_method.entry(payment.payment_method).or_default() += payment.amount;
        }

        Ok(BillingReport {
            from,
            to,
            payment_count: payments.len(),
            payments_total: payments.iter().map(|p| p.amount).sum(),
            by_method,
            outstanding: self
                .db
                .list_bills()
                .filter(|b| !b.status.is_closed())
                .map(Bill::balance_due)
                .sum(),
        })
    }

    /// Recettes détaillées: paiements et recettes par jour sur la période,
    /// lignes facturées par service pour les factures émises sur la période
    pub fn revenue_report(&self, actor: UserID, period: RevenuePeriod) -> Result<RevenueReport, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let to = period.date_to.unwrap_or_else(|| self.today());
        let from = period
            .date_from
            .unwrap_or_else(|| self.today() - Duration::days(REVENUE_REPORT_DAYS));
        if to < from {
            return Err(InvalidInput("date range").into());
        }

        let mut payments: Vec<Payment> = self
            .db
            .list_payments()
            .filter(|p| (from..=to).contains(&p.payment_date.date_naive()))
            .cloned()
            .collect();
        payments.sort_by(|a, b| (b.payment_date, &b.payment_id).cmp(&(a.payment_date, &a.payment_id)));

        let mut by_day: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        for payment in &payments {
            *by_day.entry(payment.payment_date.date_naive()).or_default() += payment.amount;
        }

        let mut by_service: BTreeMap<Pk, (Money, u64)> = BTreeMap::new();
        for bill in self
            .db
            .list_bills()
            .filter(|b| (from..=to).contains(&b.created_at.date_naive()))
        {
            for item in &bill.items {
                let (revenue, quantity) = by_service.entry(item.service_type).or_default();
                *revenue += item.total_price;
                *quantity += u64::from(item.quantity);
            }
        }

        let mut service_revenue: Vec<ServiceRevenue> = by_service
            .into_iter()
            .map(|(id, (total_revenue, quantity_sold))| ServiceRevenue {
                service: self
                    .db
                    .get_service_type(&id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|_| format!("Service {id}")),
                total_revenue,
                quantity_sold,
            })
            .collect();
        service_revenue.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then_with(|| a.service.cmp(&b.service))
        });

        Ok(RevenueReport {
            from,
            to,
            payments,
            daily_revenue: by_day
                .into_iter()
                .map(|(day, total)| DailyRevenue { day, total })
                .collect(),
            service_revenue,
        })
    }

    pub fn create_service_type(&mut self, actor: UserID, form: ServiceTypeForm) -> Result<ServiceType, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let name = short_text(&form.name, "service name")?;
        if self
            .db
            .list_service_types()
            .any(|s| s.name.eq_ignore_ascii_case(&name))
        {
            return Err(ServiceError::Conflict(vec![format!("Service {name} already exists")]));
        }
        if form.base_price.is_negative() {
            return Err(InvalidInput("base price").into());
        }

        let service = ServiceType {
            id: self.db.allocate_pk(),
            name,
            description: optional_text(form.description.as_deref(), "description")?,
            base_price: form.base_price,
            is_active: form.is_active,
        };
        self.db.store_service_type(service.clone());
        self.commit()?;
        Ok(service)
    }

    pub fn update_service_type(
        &mut self,
        actor: UserID,
        id: Pk,
        changes: ServiceTypeUpdate,
    ) -> Result<ServiceType, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;
        self.db.get_service_type(&id)?;

        let name = changes
            .name
            .as_deref()
            .map(|n| short_text(n, "service name"))
            .transpose()?;
        if let Some(name) = &name {
            if self
                .db
                .list_service_types()
                .any(|s| s.id != id && s.name.eq_ignore_ascii_case(name))
            {
                return Err(ServiceError::Conflict(vec![format!("Service {name} already exists")]));
            }
        }
        let description = changes
            .description
            .as_deref()
            .map(|d| optional_text(Some(d), "description"))
            .transpose()?;
        if changes.base_price.is_some_and(Money::is_negative) {
            return Err(InvalidInput("base price").into());
        }

        let service = self.db.get_service_type_mut(&id)?;
        if let Some(name) = name {
            service.name = name;
        }
        if let Some(description) = description {
            service.description = description;
        }
        if let Some(price) = changes.base_price {
            service.base_price = price;
        }
        if let Some(active) = changes.is_active {
            service.is_active = active;
        }
        let service = service.clone();

        self.commit()?;
        Ok(service)
    }

    pub fn list_service_types(&self, actor: UserID, filter: ServiceTypeFilter) -> Result<Vec<ServiceType>, ServiceError> {
        self.enforce(actor)?
            .authorize_global(Action::ManageBilling)?;

        let query = filter.query.as_deref().map(|q| q.trim().to_lowercase());
        let mut services: Vec<ServiceType> = self
            .db
            .list_service_types()
            .filter(|s| filter.active.map_or(true, |active| s.is_active == active))
            .filter(|s| {
                query.as_deref().map_or(true, |q| {
                    s.name.to_lowercase().contains(q) || s.description.to_lowercase().contains(q)
                })
            })
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}
