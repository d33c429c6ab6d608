use std::fmt;
use std::time::Duration;

use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::Request;
use serde_json::json;
use thiserror::Error;

use crate::bootstrap::Phase;

/// Failure of a single catalog operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Step of collection setup during which an initialization error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    ExistenceCheck,
    GenerateCollection,
    CreateData,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SetupStage::ExistenceCheck => "check existence",
            SetupStage::GenerateCollection => "generate collection",
            SetupStage::CreateData => "create seed data",
        };
        f.write_str(stage)
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to connect to {endpoint}")]
    Connection {
        endpoint: String,
        #[source]
        source: StoreError,
    },
    #[error("no database connection has been established")]
    NotConnected,
    #[error("failed to {stage} for collection '{collection}'")]
    Initialization {
        collection: String,
        stage: SetupStage,
        #[source]
        source: StoreError,
    },
    #[error("database bootstrap did not finish within {0:?}")]
    Timeout(Duration),
    #[error("database bootstrap already ran and ended in {0:?}")]
    AlreadyBootstrapped(Phase),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("database error")]
    Database(#[from] mongodb::error::Error),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Database(_) => Status::InternalServerError,
        }
    }
}

/// Renders the JSON body shared by handlers and catchers.
pub fn error_body(status: Status, message: &str) -> String {
    json!({
        "statusCode": status.code,
        "message": message,
    })
    .to_string()
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if let ApiError::Database(e) = &self {
            tracing::error!(error = %e, "database error while handling request");
        }

        let body = error_body(status, &self.to_string());

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), std::io::Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_error_names_collection_and_stage() {
        let err = DbError::Initialization {
            collection: "tickets".to_string(),
            stage: SetupStage::CreateData,
            source: StoreError::Rejected("duplicate key".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to create seed data for collection 'tickets'"
        );
    }

    #[test]
    fn error_body_uses_status_code_and_message() {
        let body: serde_json::Value =
            serde_json::from_str(&error_body(Status::NotFound, "user not found")).unwrap();
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["message"], "user not found");
    }

    #[test]
    fn api_errors_map_to_statuses() {
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            Status::NotFound
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            Status::BadRequest
        );
    }
}
