//! # Schemas
//!
//! The collections this service owns. Each one knows how to create itself
//! (JSON-schema validator plus indexes) and which documents it starts with.

use chrono::NaiveDateTime;
use mongodb::{
    IndexModel,
    bson::{self, Document, doc, oid::ObjectId},
    options::IndexOptions,
};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::errors::StoreError;
use crate::models::{Priority, Role, Ticket, TicketStatus, User};
use crate::setup::{CollectionDescriptor, CollectionSetup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Users,
    Tickets,
}

impl Schema {
    /// Every schema, in bootstrap order.
    pub const ALL: [Schema; 2] = [Schema::Users, Schema::Tickets];

    pub fn entity(self) -> &'static str {
        match self {
            Schema::Users => "users",
            Schema::Tickets => "tickets",
        }
    }
}

impl CollectionDescriptor for Schema {
    fn instantiate<'a>(&'a self, db: &'a dyn Catalog) -> Box<dyn CollectionSetup + 'a> {
        match self {
            Schema::Users => Box::new(UsersCollection { db }),
            Schema::Tickets => Box::new(TicketsCollection { db }),
        }
    }
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn to_documents<T: serde::Serialize>(records: &[T]) -> Result<Vec<Document>, StoreError> {
    records
        .iter()
        .map(|record| bson::to_document(record).map_err(StoreError::from))
        .collect()
}

struct UsersCollection<'a> {
    db: &'a dyn Catalog,
}

impl UsersCollection<'_> {
    fn validator() -> Document {
        let roles: Vec<&str> = Role::ALL.iter().map(|role| role.as_str()).collect();
        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["name", "email", "role", "area", "created_at"],
                "properties": {
                    "name": { "bsonType": "string", "minLength": 1 },
                    "email": { "bsonType": "string", "pattern": "^[^@\\s]+@[^@\\s]+$" },
                    "role": { "enum": roles },
                    "area": { "bsonType": "string" },
                    "created_at": { "bsonType": "string" },
                },
            }
        }
    }

    fn indexes() -> Vec<IndexModel> {
        vec![
            unique_index(doc! { "email": 1 }),
            IndexModel::builder().keys(doc! { "role": 1 }).build(),
        ]
    }
}

pub fn seed_users(created_at: NaiveDateTime) -> Vec<User> {
    [
        ("Ana Torres", "ana.torres@incidencias.dev", Role::Admin, "systems"),
        ("Luis Moreno", "luis.moreno@incidencias.dev", Role::Technician, "support"),
        ("Carla Ruiz", "carla.ruiz@incidencias.dev", Role::Reporter, "accounting"),
    ]
    .into_iter()
    .map(|(name, email, role, area)| User {
        oid: ObjectId::new(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        area: area.to_string(),
        created_at,
    })
    .collect()
}

#[rocket::async_trait]
impl CollectionSetup for UsersCollection<'_> {
    fn entity(&self) -> &str {
        Schema::Users.entity()
    }

    async fn generate_collection(&self) -> Result<(), StoreError> {
        self.db
            .create_collection(self.entity(), Some(Self::validator()))
            .await?;
        self.db.create_indexes(self.entity(), Self::indexes()).await
    }

    async fn create_data(&self) -> Result<(), StoreError> {
        let documents = to_documents(&seed_users(now()))?;
        let written = self.db.insert_documents(self.entity(), documents).await?;
        tracing::debug!(collection = self.entity(), written, "seed users inserted");
        Ok(())
    }
}

struct TicketsCollection<'a> {
    db: &'a dyn Catalog,
}

impl TicketsCollection<'_> {
    fn validator() -> Document {
        let statuses: Vec<&str> = TicketStatus::ALL.iter().map(|s| s.as_str()).collect();
        let priorities: Vec<&str> = Priority::ALL.iter().map(|p| p.as_str()).collect();
        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": [
                    "code", "title", "description", "status",
                    "priority", "area", "reporter", "created_at",
                ],
                "properties": {
                    "code": { "bsonType": "string" },
                    "title": { "bsonType": "string", "minLength": 1 },
                    "description": { "bsonType": "string" },
                    "status": { "enum": statuses },
                    "priority": { "enum": priorities },
                    "area": { "bsonType": "string" },
                    "reporter": { "bsonType": "string" },
                    "assignee": { "bsonType": ["string", "null"] },
                    "created_at": { "bsonType": "string" },
                },
            }
        }
    }

    fn indexes() -> Vec<IndexModel> {
        vec![
            unique_index(doc! { "code": 1 }),
            IndexModel::builder()
                .keys(doc! { "status": 1, "priority": -1 })
                .build(),
            IndexModel::builder().keys(doc! { "reporter": 1 }).build(),
        ]
    }
}

fn ticket_code() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("INC-{}", id[..8].to_uppercase())
}

pub fn seed_tickets(created_at: NaiveDateTime) -> Vec<Ticket> {
    [
        (
            "Printer on second floor offline",
            "The shared printer stopped answering print jobs after the power cut.",
            TicketStatus::Open,
            Priority::Medium,
            "accounting",
            "carla.ruiz@incidencias.dev",
            None,
        ),
        (
            "VPN drops every few minutes",
            "Remote sessions disconnect roughly every five minutes since Monday.",
            TicketStatus::InProgress,
            Priority::High,
            "support",
            "carla.ruiz@incidencias.dev",
            Some("luis.moreno@incidencias.dev"),
        ),
        (
            "New laptop setup",
            "Provision a laptop with the standard image for the new hire.",
            TicketStatus::Closed,
            Priority::Low,
            "systems",
            "ana.torres@incidencias.dev",
            Some("luis.moreno@incidencias.dev"),
        ),
    ]
    .into_iter()
    .map(
        |(title, description, status, priority, area, reporter, assignee)| Ticket {
            oid: ObjectId::new(),
            code: ticket_code(),
            title: title.to_string(),
            description: description.to_string(),
            status,
            priority,
            area: area.to_string(),
            reporter: reporter.to_string(),
            assignee: assignee.map(str::to_string),
            created_at,
        },
    )
    .collect()
}

#[rocket::async_trait]
impl CollectionSetup for TicketsCollection<'_> {
    fn entity(&self) -> &str {
        Schema::Tickets.entity()
    }

    async fn generate_collection(&self) -> Result<(), StoreError> {
        self.db
            .create_collection(self.entity(), Some(Self::validator()))
            .await?;
        self.db.create_indexes(self.entity(), Self::indexes()).await
    }

    async fn create_data(&self) -> Result<(), StoreError> {
        let documents = to_documents(&seed_tickets(now()))?;
        let written = self.db.insert_documents(self.entity(), documents).await?;
        tracing::debug!(collection = self.entity(), written, "seed tickets inserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::setup::SetupDb;

    #[tokio::test]
    async fn fresh_database_gets_both_collections_seeded() {
        let catalog = MemoryCatalog::new();

        let report = SetupDb::new(&catalog)
            .setup_collections(&Schema::ALL)
            .await
            .unwrap();

        assert_eq!(report.created, vec!["users", "tickets"]);
        assert_eq!(catalog.document_count("users"), 3);
        assert_eq!(catalog.document_count("tickets"), 3);

        let users = catalog.collection("users").unwrap();
        assert!(users.validator.unwrap().contains_key("$jsonSchema"));
        assert_eq!(users.indexes[0], doc! { "email": 1 });
    }

    #[tokio::test]
    async fn existing_users_collection_is_left_alone() {
        let catalog = MemoryCatalog::with_collections(&["users"]);

        let report = SetupDb::new(&catalog)
            .setup_collections(&Schema::ALL)
            .await
            .unwrap();

        assert_eq!(report.omitted, vec!["users"]);
        assert_eq!(report.created, vec!["tickets"]);
        assert_eq!(catalog.document_count("users"), 0);
        assert!(!catalog.journal().contains(&"create:users".to_string()));
    }

    #[tokio::test]
    async fn rerunning_the_schemas_adds_nothing() {
        let catalog = MemoryCatalog::new();
        let setup = SetupDb::new(&catalog);

        setup.setup_collections(&Schema::ALL).await.unwrap();
        let report = setup.setup_collections(&Schema::ALL).await.unwrap();

        assert!(report.created.is_empty());
        assert_eq!(report.omitted, vec!["users", "tickets"]);
        assert_eq!(catalog.document_count("users"), 3);
        assert_eq!(catalog.document_count("tickets"), 3);
    }

    #[test]
    fn seed_tickets_have_distinct_codes_and_known_reporters() {
        let created_at = now();
        let emails: HashSet<String> = seed_users(created_at)
            .into_iter()
            .map(|user| user.email)
            .collect();
        let tickets = seed_tickets(created_at);

        let codes: HashSet<&str> = tickets.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes.len(), tickets.len());
        for ticket in &tickets {
            assert!(ticket.code.starts_with("INC-"));
            assert!(emails.contains(&ticket.reporter));
            if let Some(assignee) = &ticket.assignee {
                assert!(emails.contains(assignee));
            }
        }
    }

    #[test]
    fn seed_documents_encode_enums_as_strings() {
        let documents = to_documents(&seed_users(now())).unwrap();
        assert_eq!(documents[0].get_str("role").unwrap(), "admin");
        assert!(documents[0].get_object_id("_id").is_ok());
    }
}
