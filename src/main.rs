#[macro_use]
extern crate rocket;

mod api;
mod config;
mod cors;
mod db;
mod env;
mod error;
mod models;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_analysis_detail, api_analysis_tag, api_create_record, api_delete_record, api_get_record,
    api_get_records_by_month, api_update_record, default_catcher, health,
};
use config::AppConfig;
use cors::{CorsFairing, preflight};
use error::AppError;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Server error: {0}")]
    Rocket(#[from] rocket::Error),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let loaded_env_files = env::load_environment()?;
    let config = AppConfig::from_env()?;
    let _telemetry = init_tracing(&config)?;

    for file in &loaded_env_files {
        debug!("Loaded environment from: {}", file);
    }
    for key in AppConfig::ignored_server_parameters() {
        warn!("{} is set but ignored by the SQLite backend", key);
    }

    let pool = db::connect(&config.database).await?;
    db::run_migrations(&pool).await?;

    let _rocket = init_rocket(pool, &config).launch().await?;

    info!("Practice record service stopped");
    Ok(())
}

pub fn init_rocket(pool: SqlitePool, config: &AppConfig) -> Rocket<Build> {
    info!(
        environment = %config.environment,
        allowed_origins = ?config.allowed_origins,
        "Starting practice record service"
    );

    rocket::build()
        .manage(pool)
        .mount(
            "/",
            routes![
                api_create_record,
                api_get_records_by_month,
                api_get_record,
                api_delete_record,
                api_update_record,
                api_analysis_tag,
                api_analysis_detail,
                health,
                preflight,
            ],
        )
        .register("/", catchers![default_catcher])
        .attach(CorsFairing::new(config.allowed_origins.clone()))
        .attach(TelemetryFairing)
}
