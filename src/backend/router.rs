//! Configuration des routes pour l'application.
//! Définit les routes accessibles avec ou sans authentification et configure les middlewares.

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, patch, post, put};
use axum::{BoxError, Router};
use http::StatusCode;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::backend::handlers_auth::{
    accounts, appointments, billing, dashboard, medical_records, notifications, patients, pharmacy,
};
use crate::backend::handlers_unauth::{index, login, logout, register};
use crate::backend::middlewares::SessionUser;
use crate::backend::AppState;
use crate::config::Settings;

/// Initialisation du routeur principal et des middlewares
pub fn get_router(state: AppState, settings: &Settings) -> Router {
    let session_manager = SessionManagerLayer::new(MemoryStore::default())
        .with_http_only(true)
        .with_secure(settings.secure_cookies);

    let service = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|_e: BoxError| async move {
            StatusCode::BAD_REQUEST
        }))
        .layer(session_manager);

    let router = Router::new()
        .merge(unauth_routes())
        .merge(auth_routes())
        .layer(service)
        .with_state(state);

    // Requêtes de n'importe quelle origine, en mode debug uniquement
    if cfg!(debug_assertions) {
        let cors = CorsLayer::new()
            .allow_methods(tower_http::cors::AllowMethods::any())
            .allow_origin(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Routes accessibles sans authentification
fn unauth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/register", post(register)) // Inscription d'un patient
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Routes nécessitant une authentification
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        // Comptes
        .route("/accounts/me", get(accounts::me).patch(accounts::update_me))
        .route("/users", get(accounts::list_users))
        .route("/users/stats", get(accounts::role_statistics))
        .route("/users/:id/role", put(accounts::update_role))
        .route("/users/:id/active", put(accounts::set_active))
        // Patients
        .route("/patients", post(patients::create_patient))
        .route("/patients/search", get(patients::search_patients))
        .route("/patients/:id", get(patients::get_patient).patch(patients::update_patient))
        .route(
            "/patients/:id/vitals",
            get(patients::vitals_history).post(patients::record_vitals),
        )
        .route("/patients/:id/bills", get(billing::patient_pending_bills))
        .route(
            "/patients/:id/records",
            get(medical_records::patient_history).post(medical_records::create_record),
        )
        // Rendez-vous et médecins
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route("/appointments/conflicts", get(appointments::check_conflicts))
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .patch(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route("/appointments/:id/confirm", post(appointments::confirm_appointment))
        .route("/appointments/:id/cancel", post(appointments::cancel_appointment))
        .route("/appointments/:id/status", put(appointments::set_status))
        .route("/doctors", get(appointments::list_doctors))
        .route("/doctors/:id", get(appointments::get_doctor).patch(appointments::update_doctor))
        .route("/doctors/:id/schedule", put(appointments::set_schedule))
        .route("/doctors/:id/slots", get(appointments::available_slots))
        // Facturation
        .route("/bills", get(billing::list_bills).post(billing::create_bill))
        .route("/bills/overdue", post(billing::mark_overdue))
        .route("/bills/total", post(billing::calculate_total))
        .route("/bills/:id", get(billing::get_bill).patch(billing::edit_bill))
        .route("/bills/:id/payments", post(billing::process_payment))
        .route("/bills/:id/cancel", post(billing::cancel_bill))
        .route("/payments", get(billing::list_payments))
        .route("/billing/dashboard", get(billing::billing_dashboard))
        .route("/billing/report", get(billing::billing_report))
        .route("/billing/revenue", get(billing::revenue_report))
        .route(
            "/service-types",
            get(billing::list_service_types).post(billing::create_service_type),
        )
        .route("/service-types/:id", patch(billing::update_service_type))
        // Dossiers médicaux
        .route("/records", get(medical_records::list_records))
        .route("/records/dashboard", get(medical_records::records_dashboard))
        .route(
            "/records/:id",
            get(medical_records::get_record).patch(medical_records::edit_record),
        )
        .route("/records/:id/prescriptions", post(medical_records::add_prescription))
        .route("/records/:id/lab-tests", post(medical_records::order_lab_test))
        .route("/prescriptions", get(medical_records::list_prescriptions))
        .route("/prescriptions/templates", get(medical_records::prescription_template))
        .route("/prescriptions/:id", patch(medical_records::edit_prescription))
        .route("/lab-tests", get(medical_records::list_lab_tests))
        .route("/lab-tests/:id/status", put(medical_records::update_lab_test_status))
        .route("/lab-tests/:id/results", put(medical_records::record_lab_results))
        // Pharmacie
        .route("/medicines", post(pharmacy::add_medicine))
        .route("/medicines/select", get(pharmacy::medicines_for_select))
        .route("/inventory", get(pharmacy::inventory_list).post(pharmacy::add_inventory))
        .route("/inventory/alerts", get(pharmacy::stock_alerts))
        .route(
            "/inventory/:id",
            get(pharmacy::inventory_status).patch(pharmacy::update_stock),
        )
        .route(
            "/dispensings",
            get(pharmacy::dispensing_history).post(pharmacy::dispense),
        )
        .route("/pharmacy/dashboard", get(pharmacy::pharmacy_dashboard))
        // Notifications
        .route("/notifications", get(notifications::my_notifications))
        .route("/notifications/alerts", post(notifications::send_system_alert))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route(
            "/notification-templates",
            get(notifications::list_templates).post(notifications::create_template),
        )
        .layer(axum::middleware::from_extractor::<SessionUser>()) // Vérifie l'utilisateur connecté
}
