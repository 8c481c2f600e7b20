//! Point d'entrée principal de l'application.
//! Charge la configuration, la base et la politique d'accès, puis démarre
//! le serveur web avec Axum.

use std::net::SocketAddr;

use anyhow::Context;
use dotenv::dotenv;
use log::{error, info};

use hms::authorization::Enforcer;
use hms::backend::router::get_router;
use hms::backend::AppState;
use hms::config::Settings;
use hms::db::Database;
use hms::services::Service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let settings = Settings::load()?;

    let db = Database::open(settings.data_path.clone())
        .with_context(|| format!("Cannot open database {}", settings.data_path.display()))?;
    let enforcer = Enforcer::new(&settings.policy_model, &settings.policy_file)
        .await
        .context("Cannot load access control policy")?;

    let mut service = Service::new(db, enforcer);
    if let Some(admin) = &settings.bootstrap_admin {
        service
            .bootstrap_admin(&admin.email, &admin.password)
            .context("Cannot create the bootstrap administrator")?;
    }
    service.save()?;

    let state = AppState::new(service);
    let app = get_router(state.clone(), &settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to open web server listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for shutdown signal: {e}");
            }
        })
        .await
        .context("Failed to bind Axum to listener")?;

    // Sauvegarde finale
    state.service.read().await.save()?;
    info!("Database saved, bye");
    Ok(())
}
