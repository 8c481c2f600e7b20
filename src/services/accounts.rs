//! Inscription, connexion et gestion des rôles

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::{LoginError, Service, ServiceError};
use crate::authorization::{Action, Parties};
use crate::models::*;
use crate::utils::input_validation::{
    optional_text, password_validation, short_text, Email, InvalidInput, PhoneNumber,
};
use crate::utils::password_utils::{hash, verify};

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Données facultatives du profil créé lors d'un changement de rôle
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileData {
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub consultation_fee: Option<Money>,
    pub years_of_experience: Option<u32>,
    pub department: Option<String>,
    pub gender: Option<Gender>,
}

/// Modification de son propre compte
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

/// Le profil attaché au rôle courant d'un compte
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Patient(Patient),
    Doctor(Doctor),
    BillingStaff(BillingStaff),
    Pharmacist(Pharmacist),
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct Me {
    pub user: UserView,
    pub profile: Profile,
}

impl Service {
    /// Crée le compte et l'enregistre, sans profil
    pub(super) fn create_account(
        &mut self,
        email: &str,
        first_name: &str,
        last_name: &str,
        password: &str,
        role: Role,
    ) -> Result<UserID, ServiceError> {
        let email = Email::try_from(email)?;
        let first_name = short_text(first_name, "first name")?;
        let last_name = short_text(last_name, "last name")?;

        if !password_validation(password, email.local_part()) {
            return Err(ServiceError::WeakPassword);
        }

        if self.db.lookup_email(&email).is_some() {
            return Err(ServiceError::UserAlreadyExists);
        }

        let password = hash(password)?;
        let now = self.now();
        let user = User {
            id: UserID::new(),
            number: self.db.allocate_user_number(),
            email,
            first_name,
            last_name,
            role,
            phone_number: None,
            date_of_birth: None,
            address: String::new(),
            is_active: true,
            password,
            created_at: now,
            updated_at: now,
        };
        let id = user.id;

        info!("Account created for {} ({})", user.email, user.role);
        self.db.store_user(user);
        Ok(id)
    }

    /// Crée le profil par défaut du rôle donné
    pub(super) fn create_profile(
        &mut self,
        user: UserID,
        role: Role,
        data: ProfileData,
    ) -> Result<(), ServiceError> {
        let profile = self.build_profile(user, role, data)?;
        self.store_profile(profile);
        Ok(())
    }

    /// Valide et construit le profil sans toucher à la base
    fn build_profile(&self, user: UserID, role: Role, data: ProfileData) -> Result<Profile, ServiceError> {
        let n = self.db.get_user(user)?.number;
        let now = self.now();

        Ok(match role {
            Role::Patient => Profile::Patient(Patient {
                patient_id: PatientID::from(format!("PAT{n:05}")),
                user,
                gender: data.gender.unwrap_or(Gender::O),
                blood_group: None,
                emergency_contact_name: String::new(),
                emergency_contact_phone: None,
                emergency_contact_relationship: String::new(),
                insurance_provider: String::new(),
                insurance_number: String::new(),
                allergies: String::new(),
                chronic_conditions: String::new(),
                created_at: now,
                updated_at: now,
            }),
            Role::Doctor => {
                let consultation_fee = data.consultation_fee.unwrap_or_default();
                if consultation_fee.is_negative() {
                    return Err(InvalidInput("consultation fee").into());
                }
                Profile::Doctor(Doctor {
                    doctor_id: DoctorID::from(format!("DOC{n:05}")),
                    user,
                    specialization: optional_text(data.specialization.as_deref(), "specialization")?,
                    license_number: match data.license_number {
                        Some(license) => short_text(&license, "license number")?,
                        None => format!("LIC{n:05}"),
                    },
                    consultation_fee,
                    years_of_experience: data.years_of_experience.unwrap_or(0),
                    is_available: true,
                    created_at: now,
                })
            }
            Role::BillingStaff => Profile::BillingStaff(BillingStaff {
                staff_id: StaffID::from(format!("BS{n:06}")),
                user,
                department: match data.department {
                    Some(department) => short_text(&department, "department")?,
                    None => "Billing".to_owned(),
                },
                created_at: now,
            }),
            Role::Pharmacist => Profile::Pharmacist(Pharmacist {
                pharmacist_id: PharmacistID::from(format!("PH{n:04}")),
                user,
                license_number: match data.license_number {
                    Some(license) => short_text(&license, "license number")?,
                    None => format!("LIC{n:05}"),
                },
                created_at: now,
            }),
            Role::Administrator => Profile::None,
        })
    }

    fn store_profile(&mut self, profile: Profile) {
        match profile {
            Profile::Patient(patient) => self.db.store_patient(patient),
            Profile::Doctor(doctor) => self.db.store_doctor(doctor),
            Profile::BillingStaff(staff) => self.db.store_staff(staff),
            Profile::Pharmacist(pharmacist) => self.db.store_pharmacist(pharmacist),
            Profile::None => {}
        }
    }

    /// Supprime le profil de l'ancien rôle, s'il n'est plus référencé
    fn remove_profile(&mut self, user: UserID, role: Role) -> Result<(), ServiceError> {
        match role {
            Role::Patient => {
                let Some(patient) = self.db.patient_by_user(user) else {
                    return Ok(());
                };
                let id = patient.patient_id.clone();
                let referenced = self.db.list_appointments().any(|a| a.patient == id)
                    || self.db.list_bills().any(|b| b.patient == id)
                    || self.db.list_records().any(|r| r.patient == id);
                if referenced {
                    return Err(ServiceError::InvalidState(
                        "Patient profile is referenced by appointments, bills or records",
                    ));
                }
                let vitals: Vec<Pk> = self
                    .db
                    .list_vitals()
                    .filter(|v| v.patient == id)
                    .map(|v| v.id)
                    .collect();
                for v in vitals {
                    self.db.remove_vitals(&v);
                }
                self.db.remove_patient(&id);
            }
            Role::Doctor => {
                let Some(doctor) = self.db.doctor_by_user(user) else {
                    return Ok(());
                };
                let id = doctor.doctor_id.clone();
                let referenced = self.db.list_appointments().any(|a| a.doctor == id)
                    || self.db.list_records().any(|r| r.doctor == id);
                if referenced {
                    return Err(ServiceError::InvalidState(
                        "Doctor profile is referenced by appointments or records",
                    ));
                }
                let schedules: Vec<Pk> = self
                    .db
                    .list_schedules()
                    .filter(|s| s.doctor == id)
                    .map(|s| s.id)
                    .collect();
                for s in schedules {
                    self.db.remove_schedule(&s);
                }
                self.db.remove_doctor(&id);
            }
            Role::BillingStaff => {
                if let Some(staff) = self.db.staff_by_user(user) {
                    let id = staff.staff_id.clone();
                    self.db.remove_staff(&id);
                }
            }
            Role::Pharmacist => {
                let Some(pharmacist) = self.db.pharmacist_by_user(user) else {
                    return Ok(());
                };
                let id = pharmacist.pharmacist_id.clone();
                if self.db.list_dispensings().any(|d| d.pharmacist == id) {
                    return Err(ServiceError::InvalidState(
                        "Pharmacist profile is referenced by dispensing records",
                    ));
                }
                self.db.remove_pharmacist(&id);
            }
            Role::Administrator => {}
        }
        Ok(())
    }

    fn profile_of(&self, user: &User) -> Profile {
        let profile = match user.role {
            Role::Patient => self.db.patient_by_user(user.id).cloned().map(Profile::Patient),
            Role::Doctor => self.db.doctor_by_user(user.id).cloned().map(Profile::Doctor),
            Role::BillingStaff => self.db.staff_by_user(user.id).cloned().map(Profile::BillingStaff),
            Role::Pharmacist => self.db.pharmacist_by_user(user.id).cloned().map(Profile::Pharmacist),
            Role::Administrator => None,
        };
        profile.unwrap_or(Profile::None)
    }

    /// Enregistre un nouveau patient et son dossier
    pub fn register(&mut self, registration: Registration) -> Result<UserID, ServiceError> {
        let id = self.create_account(
            &registration.email,
            &registration.first_name,
            &registration.last_name,
            &registration.password,
            Role::Patient,
        )?;
        self.create_profile(id, Role::Patient, ProfileData::default())?;
        self.commit()?;
        Ok(id)
    }

    /// Vérifie le mot de passe. Un compte inconnu, désactivé ou un mauvais
    /// mot de passe donnent la même erreur.
    pub fn login(&self, email: &str, password: &str) -> Result<UserID, LoginError> {
        let user = Email::try_from(email)
            .ok()
            .and_then(|email| self.db.lookup_email(&email));

        if !verify(password, user.map(|u| &u.password)) {
            return Err(LoginError::InvalidCredentials);
        }

        match user {
            Some(user) if user.is_active => {
                info!("User {} logged in", user.email);
                Ok(user.id)
            }
            Some(user) => {
                warn!("Login attempt on deactivated account {}", user.email);
                Err(LoginError::InvalidCredentials)
            }
            None => Err(LoginError::InvalidCredentials),
        }
    }

    /// Crée l'administrateur initial si aucun n'existe
    pub fn bootstrap_admin(&mut self, email: &str, password: &str) -> Result<Option<UserID>, ServiceError> {
        if self.db.list_users().any(|u| u.role == Role::Administrator) {
            return Ok(None);
        }
        let id = self.create_account(email, "System", "Administrator", password, Role::Administrator)?;
        self.commit()?;
        info!("Bootstrap administrator {email} created");
        Ok(Some(id))
    }

    pub fn me(&self, actor: UserID) -> Result<Me, ServiceError> {
        self.principal(actor)?;
        let user = self.db.get_user(actor)?;
        Ok(Me {
            user: UserView::from(user),
            profile: self.profile_of(user),
        })
    }

    pub fn update_account(&mut self, actor: UserID, changes: AccountUpdate) -> Result<UserView, ServiceError> {
        self.principal(actor)?;

        let first_name = changes.first_name.map(|n| short_text(&n, "first name")).transpose()?;
        let last_name = changes.last_name.map(|n| short_text(&n, "last name")).transpose()?;
        let phone_number = match changes.phone_number.as_deref().map(str::trim) {
            Some("") => Some(None),
            Some(phone) => Some(Some(PhoneNumber::try_from(phone)?)),
            None => None,
        };
        let address = changes
            .address
            .map(|a| optional_text(Some(&a), "address"))
            .transpose()?;
        let now = self.now();

        let user = self.db.get_user_mut(actor)?;
        if let Some(first_name) = first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            user.last_name = last_name;
        }
        if let Some(phone_number) = phone_number {
            user.phone_number = phone_number;
        }
        if let Some(dob) = changes.date_of_birth {
            user.date_of_birth = Some(dob);
        }
        if let Some(address) = address {
            user.address = address;
        }
        user.updated_at = now;
        let view = UserView::from(&*user);

        self.commit()?;
        Ok(view)
    }

    /// Change le rôle d'un utilisateur: l'ancien profil est supprimé et le
    /// nouveau créé avec ses valeurs par défaut. En cas d'erreur rien ne change.
    pub fn update_role(
        &mut self,
        actor: UserID,
        target: UserID,
        role: Role,
        data: ProfileData,
    ) -> Result<Profile, ServiceError> {
        self.enforce(actor)?
            .authorize(Action::ManageUsers, Parties::owner(target))?;

        let old_role = self.db.get_user(target)?.role;
        if old_role != role {
            // Le nouveau profil est validé avant toute suppression
            let profile = self.build_profile(target, role, data)?;
            self.remove_profile(target, old_role)?;
            self.store_profile(profile);

            let now = self.now();
            let user = self.db.get_user_mut(target)?;
            user.role = role;
            user.updated_at = now;
            info!("Role of {} changed from {old_role} to {role}", user.email);
            self.commit()?;
        }

        let user = self.db.get_user(target)?;
        Ok(self.profile_of(user))
    }

    pub fn list_users(&self, actor: UserID, role: Option<Role>) -> Result<Vec<UserView>, ServiceError> {
        self.enforce(actor)?.authorize_global(Action::ManageUsers)?;

        let mut users: Vec<UserView> = self
            .db
            .list_users()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .map(UserView::from)
            .collect();
        users.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(users)
    }

    /// Nombre de comptes par rôle, rôles vides compris
    pub fn role_statistics(&self, actor: UserID) -> Result<BTreeMap<Role, usize>, ServiceError> {
        self.enforce(actor)?.authorize_global(Action::ManageUsers)?;
        Ok(self.count_roles())
    }

    pub(super) fn count_roles(&self) -> BTreeMap<Role, usize> {
        let mut counts: BTreeMap<Role, usize> = Role::iter().map(|r| (r, 0)).collect();
        for user in self.db.list_users() {
            *counts.entry(user.role).or_default() += 1;
        }
        counts
    }

    pub fn set_active(&mut self, actor: UserID, target: UserID, active: bool) -> Result<UserView, ServiceError> {
        self.enforce(actor)?
            .authorize(Action::ManageUsers, Parties::owner(target))?;

        let now = self.now();
        let user = self.db.get_user_mut(target)?;
        user.is_active = active;
        user.updated_at = now;
        info!("Account {} is now {}", user.email, if active { "active" } else { "inactive" });
        let view = UserView::from(&*user);

        self.commit()?;
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[test]
    fn test_register_creates_patient_profile() {
        let mut service = service();
        let id = register(&mut service, "wanjiru");

        let me = service.me(id).unwrap();
        assert_eq!(me.user.role, Role::Patient);
        assert_eq!(me.user.email.as_ref(), "wanjiru@knh.org");
        match me.profile {
            Profile::Patient(patient) => {
                assert_eq!(patient.patient_id.as_str(), "PAT00001");
                assert_eq!(patient.gender, Gender::O);
            }
            other => panic!("Unexpected profile {other:?}"),
        }
    }

    #[test]
    fn test_register_rejections() {
        let mut service = service();
        register(&mut service, "wanjiru");

        let duplicate = service.register(Registration {
            email: "WANJIRU@knh.org".into(),
            first_name: "W".into(),
            last_name: "K".into(),
            password: PASSWORD.into(),
        });
        assert!(matches!(duplicate, Err(ServiceError::UserAlreadyExists)));

        let weak = service.register(Registration {
            email: "otieno@knh.org".into(),
            first_name: "O".into(),
            last_name: "K".into(),
            password: "password1".into(),
        });
        assert!(matches!(weak, Err(ServiceError::WeakPassword)));

        let bad_email = service.register(Registration {
            email: "otieno".into(),
            first_name: "O".into(),
            last_name: "K".into(),
            password: PASSWORD.into(),
        });
        assert!(matches!(bad_email, Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_login() {
        let mut service = service();
        let id = register(&mut service, "wanjiru");

        assert_eq!(service.login("wanjiru@knh.org", PASSWORD).unwrap(), id);
        assert!(matches!(
            service.login("wanjiru@knh.org", "wrong password"),
            Err(LoginError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody@knh.org", PASSWORD),
            Err(LoginError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("not an email", PASSWORD),
            Err(LoginError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_deactivated_account_cannot_login() {
        let mut service = service();
        let admin = admin(&mut service);
        let id = register(&mut service, "wanjiru");

        service.set_active(admin, id, false).unwrap();
        assert!(service.login("wanjiru@knh.org", PASSWORD).is_err());
        assert!(matches!(service.me(id), Err(ServiceError::AccessDenied(_))));

        service.set_active(admin, id, true).unwrap();
        assert!(service.login("wanjiru@knh.org", PASSWORD).is_ok());
    }

    #[test]
    fn test_role_change_swaps_profiles() {
        let mut service = service();
        let admin = admin(&mut service);
        let id = register(&mut service, "kamau");

        let profile = service
            .update_role(
                admin,
                id,
                Role::Doctor,
                ProfileData {
                    specialization: Some("Cardiology".into()),
                    consultation_fee: Some(Money::from_cents(250_000)),
                    ..Default::default()
                },
            )
            .unwrap();

        match profile {
            Profile::Doctor(doctor) => {
                assert_eq!(doctor.doctor_id.as_str(), "DOC00002");
                assert_eq!(doctor.license_number, "LIC00002");
                assert_eq!(doctor.specialization, "Cardiology");
            }
            other => panic!("Unexpected profile {other:?}"),
        }
        assert!(service.db.patient_by_user(id).is_none());

        let profile = service
            .update_role(admin, id, Role::BillingStaff, ProfileData::default())
            .unwrap();
        match profile {
            Profile::BillingStaff(staff) => {
                assert_eq!(staff.staff_id.as_str(), "BS000002");
                assert_eq!(staff.department, "Billing");
            }
            other => panic!("Unexpected profile {other:?}"),
        }
        assert!(service.db.doctor_by_user(id).is_none());

        // Même rôle: rien ne change
        let again = service
            .update_role(admin, id, Role::BillingStaff, ProfileData::default())
            .unwrap();
        assert!(matches!(again, Profile::BillingStaff(_)));
    }

    #[test]
    fn test_failed_role_change_keeps_profile() {
        let mut service = service();
        let admin = admin(&mut service);
        let id = register(&mut service, "kamau");
        let patient_id = service.db.patient_by_user(id).unwrap().patient_id.clone();

        let result = service.update_role(
            admin,
            id,
            Role::Doctor,
            ProfileData {
                consultation_fee: Some(Money::from_cents(-100)),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));

        let me = service.me(id).unwrap();
        assert_eq!(me.user.role, Role::Patient);
        assert!(matches!(me.profile, Profile::Patient(_)));
        assert_eq!(service.db.patient_by_user(id).unwrap().patient_id, patient_id);
        assert!(service.db.doctor_by_user(id).is_none());
    }

    #[test]
    fn test_only_admin_manages_roles() {
        let mut service = service();
        let _admin = admin(&mut service);
        let patient = register(&mut service, "wanjiru");
        let other = register(&mut service, "otieno");

        let result = service.update_role(patient, other, Role::Doctor, ProfileData::default());
        assert!(matches!(result, Err(ServiceError::AccessDenied(_))));
        assert!(service.list_users(patient, None).is_err());
        assert!(service.role_statistics(patient).is_err());
    }

    #[test]
    fn test_role_statistics() {
        let mut service = service();
        let admin = admin(&mut service);
        with_role(&mut service, admin, "doc", Role::Doctor);
        register(&mut service, "p1");
        register(&mut service, "p2");

        let stats = service.role_statistics(admin).unwrap();
        assert_eq!(stats[&Role::Patient], 2);
        assert_eq!(stats[&Role::Doctor], 1);
        assert_eq!(stats[&Role::Administrator], 1);
        assert_eq!(stats[&Role::Pharmacist], 0);

        let doctors = service.list_users(admin, Some(Role::Doctor)).unwrap();
        assert_eq!(doctors.len(), 1);
    }

    #[test]
    fn test_bootstrap_admin_runs_once() {
        let mut service = service();
        let first = service.bootstrap_admin("root@knh.org", PASSWORD).unwrap();
        assert!(first.is_some());
        let second = service.bootstrap_admin("other@knh.org", PASSWORD).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_update_account() {
        let mut service = service();
        let id = register(&mut service, "wanjiru");

        let view = service
            .update_account(
                id,
                AccountUpdate {
                    phone_number: Some("+254 712 345 678".into()),
                    address: Some("  Upper Hill, Nairobi ".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(view.phone_number.unwrap().as_ref(), "+254712345678");
        assert_eq!(view.address, "Upper Hill, Nairobi");

        let invalid = service.update_account(
            id,
            AccountUpdate {
                phone_number: Some("12".into()),
                ..Default::default()
            },
        );
        assert!(matches!(invalid, Err(ServiceError::InvalidInput(_))));
    }
}
