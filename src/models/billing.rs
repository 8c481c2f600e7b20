//! Factures, lignes de facture, paiements et prestations facturables

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{AppointmentID, BillID, Money, PatientID, PaymentID, Pk, UserID};

/// Une prestation facturable et son prix de base
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{name}")]
pub struct ServiceType {
    pub id: Pk,
    pub name: String,
    pub description: String,
    pub base_price: Money,
    pub is_active: bool,
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
pub enum BillStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl BillStatus {
    /// Une facture payée ou annulée n'accepte plus ni paiement ni modification
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    Insurance,
    BankTransfer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub service_type: Pk,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

impl BillItem {
    /// `None` si le total de la ligne dépasse les montants représentables
    pub fn new(service_type: Pk, description: String, quantity: u32, unit_price: Money) -> Option<Self> {
        Some(Self {
            service_type,
            description,
            quantity,
            unit_price,
            total_price: unit_price.checked_mul(quantity)?,
        })
    }
}

/// Une facture émise pour un patient
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("Bill {bill_id} ({status})")]
pub struct Bill {
    pub bill_id: BillID,
    pub patient: PatientID,
    pub appointment: Option<AppointmentID>,
    pub items: Vec<BillItem>,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub status: BillStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub created_by: UserID,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn balance_due(&self) -> Money {
        self.total_amount - self.amount_paid
    }

    /// Statut après un paiement ou une modification des lignes
    pub fn settled_status(&self) -> BillStatus {
        if self.amount_paid >= self.total_amount {
            BillStatus::Paid
        } else if self.amount_paid.is_positive() {
            BillStatus::Partial
        } else {
            BillStatus::Pending
        }
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        matches!(self.status, BillStatus::Pending | BillStatus::Partial) && self.due_date < today
    }
}

/// Un paiement enregistré contre une facture
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("Payment {payment_id} - {amount}")]
pub struct Payment {
    pub payment_id: PaymentID,
    pub bill: BillID,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub transaction_reference: String,
    pub payment_date: DateTime<Utc>,
    pub processed_by: UserID,
    pub notes: String,
}
