use mongodb::Database;
use rocket::{State, get, routes as rocket_routes, serde::json::Json};
use serde::Serialize;

use crate::bootstrap::BootstrapSummary;
use crate::catalog::Catalog;
use crate::schemas::Schema;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CollectionHealth {
    pub name: &'static str,
    pub online: bool,
}

#[derive(Serialize, Clone, Debug)]
pub struct HealthStatus {
    pub db_status: String,
    pub collections: Vec<CollectionHealth>,
}

#[get("/status")]
pub fn status(summary: &State<BootstrapSummary>) -> Json<BootstrapSummary> {
    Json(summary.inner().clone())
}

#[get("/check-health")]
pub async fn health(db: &State<Database>) -> Json<HealthStatus> {
    Json(check_health(db.inner()).await)
}

pub async fn check_health(db: &dyn Catalog) -> HealthStatus {
    if let Err(e) = db.ping().await {
        tracing::warn!(error = %e, "health check ping failed");
        return offline();
    }

    let names = match db.collection_names().await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "health check could not list collections");
            return offline();
        }
    };
    let collections = Schema::ALL
        .iter()
        .map(|schema| CollectionHealth {
            name: schema.entity(),
            online: names.iter().any(|name| name == schema.entity()),
        })
        .collect();

    HealthStatus {
        db_status: "database online".to_string(),
        collections,
    }
}

fn offline() -> HealthStatus {
    HealthStatus {
        db_status: "database offline".to_string(),
        collections: Vec::new(),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    rocket_routes![status, health]
}
