//! Définition des constantes globales pour l'application.

pub const HTTP_PORT: u16 = 8080; // Port par défaut pour le serveur HTTP.
pub const DB_PATH: &str = "./data/hms.json"; // Instantané JSON de la base.
pub const CONFIG_PATH: &str = "config/hms.yaml"; // Fichier de configuration, surchargé par HMS_CONFIG.
pub const DEFAULT_POLICY_MODEL: &str = "access_control/model.conf";
pub const DEFAULT_POLICY_FILE: &str = "access_control/policy.csv";

/// Clé de session contenant l'identifiant de l'utilisateur connecté
pub const SESSION_USER_KEY: &str = "user_id";

/// Grille des créneaux de consultation: de 08:00 à 16:30 par pas de 30 minutes
pub const FIRST_SLOT: (u32, u32) = (8, 0);
pub const LAST_SLOT: (u32, u32) = (16, 30);
pub const SLOT_MINUTES: i64 = 30;

pub const PAGE_SIZE: usize = 20; // Factures par page.
pub const SEARCH_MIN_CHARS: usize = 2;
pub const SEARCH_MAX_RESULTS: usize = 10;
pub const RECENT_PAYMENTS: usize = 5;
pub const RECENT_PENDING_BILLS: usize = 10;
pub const STOCK_ALERTS_MAX: usize = 10;
pub const DEFAULT_BILL_TERM_DAYS: i64 = 30; // Échéance par défaut d'une facture.
pub const REVENUE_REPORT_DAYS: i64 = 30; // Période par défaut du rapport de recettes.

pub const LAB_TEST_PAGE_SIZE: usize = 25;
pub const RECENT_RECORDS: usize = 10;
pub const RECENT_LAB_TESTS: usize = 5;
pub const CRITICAL_VITALS_MAX: usize = 5;
/// Seuils d'alerte des signes vitaux: tension systolique (mmHg) et température (°C)
pub const CRITICAL_SYSTOLIC: u32 = 140;
pub const CRITICAL_TEMPERATURE: f64 = 38.0;
