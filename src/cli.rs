use anyhow::Context;
use clap::{ArgMatches, Command};

use crate::bootstrap::{Bootstrap, BootstrapSummary};
use crate::catalog::Catalog;
use crate::db::{Connection, Lifecycle};
use crate::schemas::Schema;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Serve,
    Setup,
    Check,
}

pub fn cli() -> Command {
    Command::new("incidents-api")
        .about("Incident tracking API backed by MongoDB")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(
            Command::new("serve")
                .about("Bootstrap the database and serve the HTTP API (default)"),
        )
        .subcommand(
            Command::new("setup").about("Create and seed any missing collections, then exit"),
        )
        .subcommand(
            Command::new("check")
                .about("Report which collections exist without changing anything"),
        )
}

pub fn parse() -> Action {
    action_from(&cli().get_matches())
}

fn action_from(matches: &ArgMatches) -> Action {
    match matches.subcommand_name() {
        Some("setup") => Action::Setup,
        Some("check") => Action::Check,
        _ => Action::Serve,
    }
}

fn connection_for(settings: &Settings) -> anyhow::Result<Connection> {
    let uri = settings
        .database
        .connection_uri()
        .context("database connection is not configured")?;
    Ok(Connection::new(uri, &settings.database))
}

/// Connects and sets up every schema. The connection is closed before any
/// error is returned.
pub async fn bootstrap_database(
    settings: &Settings,
) -> anyhow::Result<(Connection, BootstrapSummary)> {
    let mut connection = connection_for(settings)?;
    let mut bootstrap = Bootstrap::new(settings.database.bootstrap_deadline());

    match bootstrap.run(&mut connection, &Schema::ALL).await {
        Ok(report) => {
            let summary = bootstrap.summary(connection.database_name(), report);
            Ok((connection, summary))
        }
        Err(e) => {
            connection.close().await;
            Err(e).context("database bootstrap failed")
        }
    }
}

pub async fn handle_setup(settings: &Settings) -> anyhow::Result<()> {
    let (mut connection, summary) = bootstrap_database(settings).await?;
    let report = &summary.collections;

    for name in &report.created {
        println!("created  {name}");
    }
    for name in &report.omitted {
        println!("omitted  {name}");
    }

    connection.close().await;
    Ok(())
}

pub async fn handle_check(settings: &Settings) -> anyhow::Result<()> {
    let mut connection = connection_for(settings)?;
    connection.connect().await?;

    let result = report_existence(connection.get_database()?).await;
    connection.close().await;
    let existence = result?;

    for (name, exists) in existence {
        let state = if exists { "present" } else { "missing" };
        println!("{name:<10} {state}");
    }

    Ok(())
}

async fn report_existence(db: &dyn Catalog) -> anyhow::Result<Vec<(&'static str, bool)>> {
    let mut existence = Vec::with_capacity(Schema::ALL.len());
    for schema in Schema::ALL {
        let exists = db
            .collection_exists(schema.entity())
            .await
            .with_context(|| format!("failed to inspect collection '{}'", schema.entity()))?;
        existence.push((schema.entity(), exists));
    }
    Ok(existence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;

    fn action(args: &[&str]) -> Action {
        action_from(&cli().try_get_matches_from(args.iter().copied()).unwrap())
    }

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        assert_eq!(action(&["incidents-api"]), Action::Serve);
        assert_eq!(action(&["incidents-api", "serve"]), Action::Serve);
        assert_eq!(action(&["incidents-api", "setup"]), Action::Setup);
        assert_eq!(action(&["incidents-api", "check"]), Action::Check);
    }

    #[test]
    fn unconfigured_database_is_reported() {
        let err = connection_for(&Settings::default()).unwrap_err();
        assert!(format!("{err:#}").contains("DB_USER"));
    }

    #[tokio::test]
    async fn check_reports_every_schema_without_creating() {
        let catalog = MemoryCatalog::with_collections(&["tickets"]);

        let existence = report_existence(&catalog).await.unwrap();

        assert_eq!(existence, vec![("users", false), ("tickets", true)]);
        assert!(!catalog.journal().iter().any(|e| e.starts_with("create:")));
    }
}
