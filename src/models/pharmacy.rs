//! Médicaments, stock et délivrances

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{Money, PharmacistID, Pk};

/// Seuil en dessous duquel un lot est critique, quel que soit son minimum
pub const CRITICAL_STOCK_LEVEL: u32 = 5;
/// Un lot qui expire dans moins de trois mois est signalé
pub const EXPIRY_WARNING_MONTHS: i64 = 3;
pub const EXPIRY_ALERT_DAYS: i64 = 90;
pub const DEFAULT_MINIMUM_STOCK: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{name} ({generic_name})")]
pub struct Medicine {
    pub id: Pk,
    pub name: String,
    pub generic_name: String,
    pub manufacturer: String,
    pub description: String,
    pub unit_of_measurement: String,
    pub created_at: DateTime<Utc>,
}

/// Un lot d'un médicament en stock
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("Batch {batch_number}")]
pub struct InventoryItem {
    pub id: Pk,
    pub medicine: Pk,
    pub batch_number: String,
    pub quantity_in_stock: u32,
    pub unit_price: Money,
    pub expiry_date: NaiveDate,
    pub supplier: String,
    pub date_received: NaiveDate,
    pub minimum_stock_level: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
pub enum StockStatus {
    Normal,
    Low,
    Critical,
    Expiring,
}

impl InventoryItem {
    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    /// L'expiration proche l'emporte sur le niveau de stock
    pub fn stock_status(&self, today: NaiveDate) -> StockStatus {
        let months_left = self.days_to_expiry(today).div_euclid(30);

        if months_left < EXPIRY_WARNING_MONTHS {
            StockStatus::Expiring
        } else if self.quantity_in_stock <= CRITICAL_STOCK_LEVEL {
            StockStatus::Critical
        } else if self.quantity_in_stock <= self.minimum_stock_level {
            StockStatus::Low
        } else {
            StockStatus::Normal
        }
    }

    /// Stock au minimum ou en dessous, ou expiration sous 90 jours
    pub fn needs_alert(&self, today: NaiveDate) -> bool {
        self.quantity_in_stock <= self.minimum_stock_level
            || self.expiry_date <= today + chrono::Duration::days(EXPIRY_ALERT_DAYS)
    }
}

/// Trace d'une délivrance au comptoir
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispensing {
    pub id: Pk,
    pub prescription: Pk,
    pub inventory_item: Pk,
    pub pharmacist: PharmacistID,
    pub quantity_dispensed: u32,
    pub dispensed_at: DateTime<Utc>,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, expires_in_days: i64) -> (InventoryItem, NaiveDate) {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let item = InventoryItem {
            id: 1,
            medicine: 1,
            batch_number: "B-001".into(),
            quantity_in_stock: quantity,
            unit_price: Money::from_cents(1_000),
            expiry_date: today + chrono::Duration::days(expires_in_days),
            supplier: "MEDS Kenya".into(),
            date_received: today,
            minimum_stock_level: DEFAULT_MINIMUM_STOCK,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (item, today)
    }

    #[test]
    fn test_stock_levels() {
        let (normal, today) = item(50, 365);
        assert_eq!(normal.stock_status(today), StockStatus::Normal);

        let (low, today) = item(10, 365);
        assert_eq!(low.stock_status(today), StockStatus::Low);

        let (critical, today) = item(5, 365);
        assert_eq!(critical.stock_status(today), StockStatus::Critical);
    }

    #[test]
    fn test_expiry_overrides_stock() {
        let (expiring, today) = item(2, 89);
        assert_eq!(expiring.stock_status(today), StockStatus::Expiring);

        // 90 days is three whole months: no longer expiring
        let (not_yet, today) = item(50, 90);
        assert_eq!(not_yet.stock_status(today), StockStatus::Normal);

        let (expired, today) = item(50, -1);
        assert_eq!(expired.stock_status(today), StockStatus::Expiring);
    }

    #[test]
    fn test_alerts() {
        let (plenty, today) = item(50, 365);
        assert!(!plenty.needs_alert(today));

        let (at_minimum, today) = item(10, 365);
        assert!(at_minimum.needs_alert(today));

        let (soon, today) = item(50, 90);
        assert!(soon.needs_alert(today));
    }
}
