//! Paramètres d'exécution.
//!
//! Lus depuis un fichier YAML (chemin `HMS_CONFIG`, par défaut
//! `config/hms.yaml`), puis surchargés par les variables d'environnement
//! `HMS_PORT`, `HMS_DATA_PATH`, `HMS_POLICY_MODEL` et `HMS_POLICY_FILE`.
//! Un fichier absent donne les valeurs par défaut.

use anyhow::Context;
use serde::Deserialize;
use std::{env, fs, io::ErrorKind, path::PathBuf};

use crate::consts::{CONFIG_PATH, DB_PATH, DEFAULT_POLICY_FILE, DEFAULT_POLICY_MODEL, HTTP_PORT};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub port: u16,
    pub data_path: PathBuf,
    pub policy_model: String,
    pub policy_file: String,
    /// Cookie de session marqué `Secure` (derrière HTTPS uniquement)
    pub secure_cookies: bool,
    #[serde(skip)]
    pub bootstrap_admin: Option<AdminCredentials>,
}

/// Administrateur créé au démarrage s'il n'en existe aucun
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: HTTP_PORT,
            data_path: PathBuf::from(DB_PATH),
            policy_model: DEFAULT_POLICY_MODEL.to_owned(),
            policy_file: DEFAULT_POLICY_FILE.to_owned(),
            secure_cookies: false,
            bootstrap_admin: None,
        }
    }
}

impl Settings {
    /// Charge la configuration depuis le fichier et l'environnement du processus
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("HMS_CONFIG").unwrap_or_else(|_| CONFIG_PATH.to_owned());
        let mut settings = Self::from_file(&path)?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid configuration file {path}")),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("No configuration file at {path}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Cannot read configuration file {path}")),
        }
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("HMS_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid HMS_PORT: {port}"))?;
        }
        if let Some(path) = lookup("HMS_DATA_PATH") {
            self.data_path = PathBuf::from(path);
        }
        if let Some(model) = lookup("HMS_POLICY_MODEL") {
            self.policy_model = model;
        }
        if let Some(policy) = lookup("HMS_POLICY_FILE") {
            self.policy_file = policy;
        }
        if let (Some(email), Some(password)) = (lookup("HMS_ADMIN_EMAIL"), lookup("HMS_ADMIN_PASSWORD")) {
            self.bootstrap_admin = Some(AdminCredentials { email, password });
        }
        Ok(())
    }
}
