//! Comptes utilisateurs et profils du personnel

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{PharmacistID, Role, StaffID, UserID};
use crate::utils::input_validation::{Email, PhoneNumber};
use crate::utils::password_utils::PWHash;

/// Un compte, quel que soit son rôle.
///
/// `number` est attribué séquentiellement à la création et sert à dériver les
/// codes des profils (`PAT00007`, `BS000007`...).
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{first_name} {last_name} - {role}")]
pub struct User {
    pub id: UserID,
    pub number: u64,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: Option<PhoneNumber>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub is_active: bool,
    pub password: PWHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Ce qu'on expose d'un compte: tout sauf le haché du mot de passe
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserID,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    pub phone_number: Option<PhoneNumber>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            role: user.role,
            phone_number: user.phone_number.clone(),
            date_of_birth: user.date_of_birth,
            address: user.address.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Profil d'un membre du service de facturation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingStaff {
    pub staff_id: StaffID,
    pub user: UserID,
    pub department: String,
    pub created_at: DateTime<Utc>,
}

/// Profil d'un pharmacien
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pharmacist {
    pub pharmacist_id: PharmacistID,
    pub user: UserID,
    pub license_number: String,
    pub created_at: DateTime<Utc>,
}
