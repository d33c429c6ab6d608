//! # incidents-api - incident tracking service backed by MongoDB
//!
//! On start the service connects to MongoDB, makes sure its collections exist
//! (creating and seeding the missing ones) and only then opens the HTTP API.
//!
//! ## Environment Variables
//!
//! - `DATABASE_URL` or `MONGODB_URL`: MongoDB connection string
//! - `DB_USER`, `DB_PASSWORD`, `DB_CLUSTER`, `DB_IDENTIFIER`: Atlas credentials,
//!   used when no connection string is given
//! - `DB_NAME`: database name (default `mongoIncidencias`)
//! - `HOST`, `PORT`: HTTP bind address (default `0.0.0.0:5000`)
//! - `INCIDENTS_*`: any setting, e.g. `INCIDENTS_DATABASE__BOOTSTRAP_TIMEOUT_MS`

use anyhow::{Context, anyhow};
use mongodb::Database;
use rocket::{Build, Rocket, catchers, fairing::AdHoc, http::Method, routes};
use rocket_cors::{AllowedOrigins, CorsOptions};

use crate::{
    bootstrap::BootstrapSummary,
    cli::Action,
    db::Lifecycle,
    settings::Settings,
};

pub mod bootstrap;
pub mod catalog;
pub mod cli;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod schemas;
pub mod settings;
pub mod setup;
pub mod telemetry;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let action = cli::parse();
    let settings = Settings::load().context("failed to load settings")?;
    telemetry::init(&settings.telemetry);

    match action {
        Action::Serve => serve(settings).await,
        Action::Setup => cli::handle_setup(&settings).await,
        Action::Check => cli::handle_check(&settings).await,
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let (mut connection, summary) = cli::bootstrap_database(&settings).await?;
    let database = connection.get_database()?.clone();

    let result = match build_rocket(&settings, database, summary) {
        Ok(rocket) => rocket
            .launch()
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("HTTP server failed: {e}")),
        Err(e) => Err(e),
    };

    connection.close().await;
    result
}

fn build_rocket(
    settings: &Settings,
    database: Database,
    summary: BootstrapSummary,
) -> anyhow::Result<Rocket<Build>> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Patch,
                Method::Put,
                Method::Delete,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow!("failed to build CORS options: {e}"))?;

    let figment = rocket::Config::figment()
        .merge(("address", settings.server.host.clone()))
        .merge(("port", settings.server.port));
    let address = format!("http://{}:{}", settings.server.host, settings.server.port);

    Ok(rocket::custom(figment)
        .manage(database)
        .manage(summary)
        .attach(cors)
        .attach(AdHoc::on_liftoff("Announce address", move |_| {
            Box::pin(async move {
                tracing::info!(%address, "server is online");
            })
        }))
        .register(
            "/",
            catchers![
                handlers::catch404,
                handlers::catch422,
                handlers::catch500,
                handlers::catch_default
            ],
        )
        .mount("/api", routes![handlers::index])
        .mount("/api", handlers::misc::routes())
        .mount("/api/users", handlers::users::routes())
        .mount("/api/tickets", handlers::tickets::routes()))
}
