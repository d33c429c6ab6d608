//! # Collection setup
//!
//! Ensures every configured collection exists. A collection that is missing is
//! generated (validator and indexes) and then seeded; one that is already
//! present is left untouched. Descriptors run one after another and the first
//! failure stops the run.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::errors::{DbError, SetupStage, StoreError};

/// Accessor for one collection, bound to a live database handle.
#[rocket::async_trait]
pub trait CollectionSetup: Send + Sync {
    /// Collection name, used for the existence check and for logging.
    fn entity(&self) -> &str;

    /// Creates the collection with its validator and indexes.
    async fn generate_collection(&self) -> Result<(), StoreError>;

    /// Inserts the seed documents.
    async fn create_data(&self) -> Result<(), StoreError>;
}

/// Static description of a collection that can produce its accessor.
pub trait CollectionDescriptor: Send + Sync {
    fn instantiate<'a>(&'a self, db: &'a dyn Catalog) -> Box<dyn CollectionSetup + 'a>;
}

/// Outcome of one [`SetupDb::setup_collections`] run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub created: Vec<String>,
    pub omitted: Vec<String>,
}

pub struct SetupDb<'a> {
    db: &'a dyn Catalog,
}

impl<'a> SetupDb<'a> {
    pub fn new(db: &'a dyn Catalog) -> Self {
        Self { db }
    }

    pub async fn setup_collections<D>(&self, descriptors: &[D]) -> Result<SetupReport, DbError>
    where
        D: CollectionDescriptor,
    {
        let mut report = SetupReport::default();

        for descriptor in descriptors {
            let entity = descriptor.instantiate(self.db);
            let name = entity.entity().to_string();

            if let Err(err) = self.setup_one(entity.as_ref(), &mut report).await {
                tracing::error!(collection = %name, error = ?err, "collection setup failed");
                return Err(err);
            }
        }

        tracing::info!(
            created = report.created.len(),
            omitted = report.omitted.len(),
            "collections updated successfully"
        );

        Ok(report)
    }

    async fn setup_one(
        &self,
        entity: &dyn CollectionSetup,
        report: &mut SetupReport,
    ) -> Result<(), DbError> {
        let name = entity.entity();
        let fail = |stage| {
            move |source| DbError::Initialization {
                collection: name.to_string(),
                stage,
                source,
            }
        };

        let exists = self
            .db
            .collection_exists(name)
            .await
            .map_err(fail(SetupStage::ExistenceCheck))?;

        if exists {
            tracing::info!(collection = %name, "collection omitted, it already exists");
            report.omitted.push(name.to_string());
            return Ok(());
        }

        entity
            .generate_collection()
            .await
            .map_err(fail(SetupStage::GenerateCollection))?;
        entity
            .create_data()
            .await
            .map_err(fail(SetupStage::CreateData))?;

        tracing::info!(collection = %name, "collection created and seeded");
        report.created.push(name.to_string());
        Ok(())
    }
}
