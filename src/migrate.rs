use thiserror::Error as ThisError;
use tracing::{info, instrument};

use crate::config::DEFAULT_MAX_DATABASES;
use crate::endpoint::{Endpoint, EndpointError};
use crate::keyset::{candidate_keys, KeyFilter, KeysetError};
use crate::report::MigrationReport;
use crate::transfer::{transfer, TransferOutcome};

#[derive(Debug, ThisError)]
pub enum MigrateError {
    /// Database selection is assumed infallible under normal operation; a
    /// failure here means a broken connection, which every following
    /// transfer would fail on anyway. Abort instead.
    #[error("failed to select database {database} on the {role} endpoint: {source}")]
    SelectDatabase {
        database: u32,
        role: &'static str,
        source: EndpointError,
    },
    #[error(transparent)]
    Keyset(#[from] KeysetError),
}

#[derive(Clone, Copy, Debug)]
pub struct MigrateOptions {
    pub max_databases: u32,
    pub replace: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        MigrateOptions {
            max_databases: DEFAULT_MAX_DATABASES,
            replace: false,
        }
    }
}

/// Drives a whole migration: for each logical database, select it on the
/// endpoints that have the concept, enumerate candidate keys and transfer
/// them one by one. Sharded sources expose one implicit keyspace and a key
/// file names its keys exactly once, so both collapse the loop to a single
/// pass.
///
/// Every `TransferOutcome` is folded into the report and handed to
/// `on_outcome`; whether and how outcomes are rendered is the caller's
/// decision.
#[instrument(name = "migration", skip_all, fields(run_id))]
pub async fn run<S, D, F>(
    source: &mut S,
    destination: &mut D,
    filter: &KeyFilter,
    options: &MigrateOptions,
    mut on_outcome: F,
) -> Result<MigrationReport, MigrateError>
where
    S: Endpoint,
    D: Endpoint,
    F: FnMut(&TransferOutcome),
{
    let mut report = MigrationReport::new();
    tracing::Span::current().record("run_id", report.run_id.to_string());

    let databases = if filter.per_database() && source.supports_databases() {
        options.max_databases
    } else {
        1
    };

    for database in 0..databases {
        if source.supports_databases() {
            source
                .select_database(database)
                .await
                .map_err(|source| MigrateError::SelectDatabase {
                    database,
                    role: "source",
                    source,
                })?;
        }
        if destination.supports_databases() {
            destination
                .select_database(database)
                .await
                .map_err(|source| MigrateError::SelectDatabase {
                    database,
                    role: "destination",
                    source,
                })?;
        }

        let keys = candidate_keys(filter, source).await?;
        info!(database, keys = keys.len(), "transferring database");

        for key in &keys {
            let outcome = transfer(key, source, destination, options.replace).await;
            report.record(&outcome);
            on_outcome(&outcome);
        }
    }

    info!(
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        "migration finished"
    );
    Ok(report)
}
