//! # Bootstrap
//!
//! Startup sequence: connect, set up every collection, then report whether
//! the service may start taking requests. Runs exactly once per process.

use std::time::Duration;

use serde::Serialize;

use crate::db::Lifecycle;
use crate::errors::DbError;
use crate::setup::{CollectionDescriptor, SetupDb, SetupReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Initializing,
    Ready,
    Failed,
}

/// What the HTTP layer reports about the finished bootstrap.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapSummary {
    pub phase: Phase,
    pub database: String,
    pub collections: SetupReport,
}

pub struct Bootstrap {
    phase: Phase,
    deadline: Option<Duration>,
}

impl Bootstrap {
    pub fn new(deadline: Option<Duration>) -> Self {
        Self {
            phase: Phase::Idle,
            deadline,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Snapshot for the HTTP layer, carrying the phase this bootstrap is in.
    pub fn summary(&self, database: &str, collections: SetupReport) -> BootstrapSummary {
        BootstrapSummary {
            phase: self.phase,
            database: database.to_string(),
            collections,
        }
    }

    /// Connects through `connection` and sets up `descriptors` in order.
    ///
    /// Ends in [`Phase::Ready`] on success and [`Phase::Failed`] otherwise. A
    /// finished bootstrap cannot be run again.
    pub async fn run<L, D>(
        &mut self,
        connection: &mut L,
        descriptors: &[D],
    ) -> Result<SetupReport, DbError>
    where
        L: Lifecycle,
        D: CollectionDescriptor,
    {
        if self.phase != Phase::Idle {
            return Err(DbError::AlreadyBootstrapped(self.phase));
        }

        let sequence = Self::sequence(&mut self.phase, connection, descriptors);
        let outcome = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, sequence)
                .await
                .unwrap_or(Err(DbError::Timeout(limit))),
            None => sequence.await,
        };

        match outcome {
            Ok(report) => {
                self.phase = Phase::Ready;
                tracing::info!(
                    created = ?report.created,
                    omitted = ?report.omitted,
                    "database bootstrap complete"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::error!(from = ?self.phase, error = %err, "database bootstrap failed");
                self.phase = Phase::Failed;
                Err(err)
            }
        }
    }

    async fn sequence<L, D>(
        phase: &mut Phase,
        connection: &mut L,
        descriptors: &[D],
    ) -> Result<SetupReport, DbError>
    where
        L: Lifecycle,
        D: CollectionDescriptor,
    {
        *phase = Phase::Connecting;
        connection.connect().await?;

        *phase = Phase::Initializing;
        tracing::info!(collections = descriptors.len(), "setting up collections");
        let db = connection.get_database()?;
        SetupDb::new(db).setup_collections(descriptors).await
    }
}
