//! # Catalog
//!
//! The handful of database operations collection setup needs. Implemented for
//! [`mongodb::Database`]; tests use the in-memory catalog in `memory`.

use mongodb::{
    Database, IndexModel,
    bson::{Document, doc},
};

use crate::errors::StoreError;

#[rocket::async_trait]
pub trait Catalog: Send + Sync {
    /// Names of the collections currently present in the database.
    async fn collection_names(&self) -> Result<Vec<String>, StoreError>;

    async fn create_collection(
        &self,
        name: &str,
        validator: Option<Document>,
    ) -> Result<(), StoreError>;

    async fn create_indexes(
        &self,
        name: &str,
        indexes: Vec<IndexModel>,
    ) -> Result<(), StoreError>;

    /// Inserts `documents` into `name`, returning how many were written.
    async fn insert_documents(
        &self,
        name: &str,
        documents: Vec<Document>,
    ) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Live existence check. Lists the collections on every call.
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let names = self.collection_names().await?;
        Ok(names.iter().any(|existing| existing == name))
    }
}

#[rocket::async_trait]
impl Catalog for Database {
    async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.list_collection_names().await?)
    }

    async fn create_collection(
        &self,
        name: &str,
        validator: Option<Document>,
    ) -> Result<(), StoreError> {
        let mut action = Database::create_collection(self, name);
        if let Some(validator) = validator {
            action = action.validator(validator);
        }
        action.await?;
        Ok(())
    }

    async fn create_indexes(
        &self,
        name: &str,
        indexes: Vec<IndexModel>,
    ) -> Result<(), StoreError> {
        if indexes.is_empty() {
            return Ok(());
        }
        self.collection::<Document>(name)
            .create_indexes(indexes)
            .await?;
        Ok(())
    }

    async fn insert_documents(
        &self,
        name: &str,
        documents: Vec<Document>,
    ) -> Result<u64, StoreError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection::<Document>(name)
            .insert_many(documents)
            .await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default, Clone)]
    pub struct MemoryCollection {
        pub validator: Option<Document>,
        pub indexes: Vec<Document>,
        pub documents: Vec<Document>,
    }

    /// In-memory catalog that journals every call it receives.
    #[derive(Default)]
    pub struct MemoryCatalog {
        collections: Mutex<BTreeMap<String, MemoryCollection>>,
        journal: Mutex<Vec<String>>,
        fail_inserts_into: Mutex<Option<String>>,
        fail_listing: Mutex<bool>,
    }

    impl MemoryCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_collections(names: &[&str]) -> Self {
            let catalog = Self::new();
            {
                let mut collections = catalog.collections.lock().unwrap();
                for name in names {
                    collections.insert(name.to_string(), MemoryCollection::default());
                }
            }
            catalog
        }

        /// Makes every subsequent insert into `name` fail.
        pub fn fail_inserts_into(&self, name: &str) {
            *self.fail_inserts_into.lock().unwrap() = Some(name.to_string());
        }

        /// Makes every subsequent collection listing fail.
        pub fn fail_listing(&self) {
            *self.fail_listing.lock().unwrap() = true;
        }

        pub fn journal(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }

        pub fn collection(&self, name: &str) -> Option<MemoryCollection> {
            self.collections.lock().unwrap().get(name).cloned()
        }

        pub fn document_count(&self, name: &str) -> usize {
            self.collection(name)
                .map(|collection| collection.documents.len())
                .unwrap_or(0)
        }

        fn record(&self, entry: String) {
            self.journal.lock().unwrap().push(entry);
        }
    }

    #[rocket::async_trait]
    impl Catalog for MemoryCatalog {
        async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
            self.record("list".to_string());
            if *self.fail_listing.lock().unwrap() {
                return Err(StoreError::Rejected("listCollections refused".to_string()));
            }
            Ok(self.collections.lock().unwrap().keys().cloned().collect())
        }

        async fn create_collection(
            &self,
            name: &str,
            validator: Option<Document>,
        ) -> Result<(), StoreError> {
            self.record(format!("create:{name}"));
            let mut collections = self.collections.lock().unwrap();
            if collections.contains_key(name) {
                return Err(StoreError::Rejected(format!(
                    "collection {name} already exists"
                )));
            }
            collections.insert(
                name.to_string(),
                MemoryCollection {
                    validator,
                    ..Default::default()
                },
            );
            Ok(())
        }

        async fn create_indexes(
            &self,
            name: &str,
            indexes: Vec<IndexModel>,
        ) -> Result<(), StoreError> {
            self.record(format!("index:{name}"));
            let mut collections = self.collections.lock().unwrap();
            let collection = collections.entry(name.to_string()).or_default();
            collection
                .indexes
                .extend(indexes.into_iter().map(|index| index.keys));
            Ok(())
        }

        async fn insert_documents(
            &self,
            name: &str,
            documents: Vec<Document>,
        ) -> Result<u64, StoreError> {
            self.record(format!("insert:{name}"));
            if self.fail_inserts_into.lock().unwrap().as_deref() == Some(name) {
                return Err(StoreError::Rejected(format!("insert into {name} refused")));
            }
            let mut collections = self.collections.lock().unwrap();
            let collection = collections.entry(name.to_string()).or_default();
            let written = documents.len() as u64;
            collection.documents.extend(documents);
            Ok(written)
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }
}
