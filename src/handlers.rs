//! # HTTP handlers
//!
//! Everything is mounted under `/api`. Errors, whether raised by a handler or
//! caught by Rocket, are rendered as `{"statusCode": .., "message": ..}`.

use rocket::{Request, State, catch, get, http::Status, response::content::RawJson, serde::json::Json};
use serde::Serialize;

use crate::bootstrap::BootstrapSummary;
use crate::errors::error_body;

pub mod misc;
pub mod tickets;
pub mod users;

#[derive(Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub database: String,
}

#[get("/")]
pub fn index(summary: &State<BootstrapSummary>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database: summary.database.clone(),
    })
}

fn caught(status: Status, message: &str) -> (Status, RawJson<String>) {
    (status, RawJson(error_body(status, message)))
}

#[catch(404)]
pub fn catch404(req: &Request) -> (Status, RawJson<String>) {
    caught(Status::NotFound, &format!("no route for {} {}", req.method(), req.uri()))
}

#[catch(422)]
pub fn catch422(_req: &Request) -> (Status, RawJson<String>) {
    caught(Status::UnprocessableEntity, "request could not be processed")
}

#[catch(500)]
pub fn catch500(_req: &Request) -> (Status, RawJson<String>) {
    caught(Status::InternalServerError, "internal server error")
}

#[catch(default)]
pub fn catch_default(status: Status, _req: &Request) -> (Status, RawJson<String>) {
    caught(status, status.reason_lossy())
}
