//! Wrapper d'appel à Casbin pour la vérification des conventions
//! sujet-objet-action.
//!
//! Le sujet est le couple (identifiant, rôle) de l'utilisateur connecté.
//! L'objet décrit les parties concernées par la ressource: son propriétaire,
//! le patient et le médecin qu'elle implique. Tout ce qui n'est pas
//! explicitement permis par la politique est refusé.

use casbin::CoreApi;
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use strum_macros::{AsRefStr, Display, EnumIter};
use thiserror::Error;

use crate::models::{Role, UserID};

/// Un enforcer Casbin
pub struct Enforcer(casbin::Enforcer);

type CasbinResult = Result<(), AccessDenied>;

/// Une erreur sans détails en cas d'accès refusé
#[derive(Debug, Error)]
#[error("Access denied")]
pub struct AccessDenied;

/// L'utilisateur qui agit
#[derive(Debug, Clone, Copy, Serialize, Hash)]
pub struct Principal {
    pub id: UserID,
    pub role: Role,
}

/// Les utilisateurs liés à la ressource visée. Une partie absente ne
/// correspond à aucun sujet.
#[derive(Debug, Clone, Copy, Default, Serialize, Hash)]
pub struct Parties {
    pub owner: Option<UserID>,
    pub patient: Option<UserID>,
    pub doctor: Option<UserID>,
}

impl Parties {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn owner(owner: UserID) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn patient(patient: UserID) -> Self {
        Self {
            patient: Some(patient),
            ..Self::default()
        }
    }

    pub fn doctor(doctor: UserID) -> Self {
        Self {
            doctor: Some(doctor),
            ..Self::default()
        }
    }

    pub fn care(patient: Option<UserID>, doctor: Option<UserID>) -> Self {
        Self {
            patient,
            doctor,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    ManageUsers,
    CreatePatient,
    SearchPatients,
    ReadPatient,
    UpdatePatient,
    RecordVitals,
    CheckAvailability,
    ManageDoctor,
    ListAppointments,
    CreateAppointment,
    ReadAppointment,
    UpdateAppointment,
    CancelAppointment,
    ConfirmAppointment,
    SetAppointmentStatus,
    DeleteAppointment,
    ManageBilling,
    ReadBill,
    CreateRecord,
    ListRecords,
    ReadRecord,
    EditRecord,
    AddPrescription,
    EditPrescription,
    ListPrescriptions,
    ManageLabTests,
    ManageInventory,
    ReadInventory,
    Dispense,
    ReadNotification,
    ManageNotifications,
}

/// Un contexte contenant une référence à un enforcer et à un sujet.
pub struct Context<'ctx> {
    enforcer: &'ctx Enforcer,
    subject: Principal,
}

impl Enforcer {
    pub async fn new(model: &str, policy: &str) -> Result<Self, casbin::Error> {
        let model = casbin::DefaultModel::from_file(model).await?;
        let adapter = casbin::FileAdapter::new(policy.to_owned());
        let enforcer = casbin::Enforcer::new(model, adapter).await?;
        Ok(Enforcer(enforcer))
    }

    /// Version bloquante de [`Enforcer::new`], hors runtime async
    pub fn load(model: &str, policy: &str) -> Result<Self, casbin::Error> {
        futures::executor::block_on(Self::new(model, policy))
    }

    pub fn with_subject(&self, subject: Principal) -> Context<'_> {
        Context {
            enforcer: self,
            subject,
        }
    }
}

impl Context<'_> {
    fn enforce<O>(&self, object: O, action: Action) -> CasbinResult
    where
        O: Serialize + std::fmt::Debug + std::hash::Hash,
    {
        let subject = self.subject;

        info!(
            "Enforcing {}",
            json!({ "sub": subject, "obj": &object, "act": action.as_ref() })
        );

        match self.enforcer.0.enforce((subject, &object, action.as_ref())) {
            Err(e) => {
                error!("Casbin error: {e:?}");
                Err(AccessDenied)
            }
            Ok(r) => {
                info!("Granted: {r}");
                if r {
                    Ok(())
                } else {
                    Err(AccessDenied)
                }
            }
        }
    }

    /// Vérifie une action sur une ressource liée aux parties données
    pub fn authorize(&self, action: Action, parties: Parties) -> CasbinResult {
        self.enforce(parties, action)
    }

    /// Vérifie une action qui ne dépend que du rôle du sujet
    pub fn authorize_global(&self, action: Action) -> CasbinResult {
        self.enforce(Parties::none(), action)
    }
}
