//! Staged loading of record batches.
//!
//! Keyed batches go through a staging table: the target table is reconciled, an empty copy of it
//! is created, the batch is inserted into the copy, and a single merge applies it to the target.
//! Batches without keys are inserted directly into the target table.

use std::fmt;

use tracing::{debug, info, warn};

use crate::conversions::record::dedup_by_key;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::reconcile::Reconciler;
use crate::session::Session;
use crate::sink_error;
use crate::types::{TableName, TableRow, TableSchema};

/// Phases a batch goes through while being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    TableEnsured,
    TempCreated,
    TempLoaded,
    Merged,
    Loaded,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadPhase::Idle => "idle",
            LoadPhase::TableEnsured => "table_ensured",
            LoadPhase::TempCreated => "temp_created",
            LoadPhase::TempLoaded => "temp_loaded",
            LoadPhase::Merged => "merged",
            LoadPhase::Loaded => "loaded",
        };

        f.write_str(name)
    }
}

/// A staging table that must be released once the batch is done with it.
///
/// Dropping it without calling [`StagingTable::release`] leaks the table until the session
/// ends, which is logged.
#[must_use]
#[derive(Debug)]
struct StagingTable {
    name: TableName,
    released: bool,
}

impl StagingTable {
    async fn create<S: Session>(session: &mut S, table: &TableName) -> SinkResult<Self> {
        let name = table.staging_table();
        session.create_staging_table(table, &name).await?;

        Ok(Self {
            name,
            released: false,
        })
    }

    fn name(&self) -> &TableName {
        &self.name
    }

    async fn release<S: Session>(mut self, session: &mut S) -> SinkResult<()> {
        self.released = true;
        session.drop_staging_table(&self.name).await
    }
}

impl Drop for StagingTable {
    fn drop(&mut self) {
        if !self.released {
            warn!(staging = %self.name, "staging table was not released");
        }
    }
}

/// Loads batches of conformed rows into destination tables.
#[derive(Debug, Clone, Copy)]
pub struct StagedLoader {
    reconciler: Reconciler,
}

impl StagedLoader {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Loads one batch of rows into `table`.
    ///
    /// Returns the number of rows in the batch, or `None` when `rows` did not report an exact
    /// length up front. Rows of keyed tables sharing a key are collapsed to the last one before
    /// staging.
    pub async fn process_batch<S, I>(
        &self,
        session: &mut S,
        table: &TableSchema,
        rows: I,
    ) -> SinkResult<Option<u64>>
    where
        S: Session,
        I: IntoIterator<Item = TableRow>,
    {
        let rows = rows.into_iter();
        let exact_len = match rows.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower as u64),
            _ => None,
        };
        let rows: Vec<TableRow> = rows.collect();

        let mut phase = LoadPhase::Idle;
        self.reconciler.ensure_table(session, table).await?;
        advance(&mut phase, LoadPhase::TableEnsured, &table.name);

        if !table.has_primary_key() {
            let inserted = session.insert_rows(&table.name, &table.columns, &rows).await?;
            advance(&mut phase, LoadPhase::Loaded, &table.name);
            info!(table = %table.name, rows = inserted, "inserted batch");

            return Ok(exact_len);
        }

        let key_indexes: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(index, _)| index)
            .collect();
        let received = rows.len();
        let rows = dedup_by_key(rows, &key_indexes);
        if rows.len() < received {
            debug!(table = %table.name, duplicates = received - rows.len(), "collapsed duplicate keys");
        }

        let staging = StagingTable::create(session, &table.name).await?;
        advance(&mut phase, LoadPhase::TempCreated, &table.name);

        let merged = self
            .load_and_merge(session, table, staging.name(), &rows, &mut phase)
            .await;
        let released = staging.release(session).await;
        advance(&mut phase, LoadPhase::Idle, &table.name);

        match (merged, released) {
            (Ok(affected), Ok(())) => {
                info!(table = %table.name, rows = rows.len(), affected, "merged batch");
                Ok(exact_len)
            }
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Err(merge_err), Err(release_err)) => Err(SinkError::from(vec![merge_err, release_err])),
        }
    }

    async fn load_and_merge<S: Session>(
        &self,
        session: &mut S,
        table: &TableSchema,
        staging: &TableName,
        rows: &[TableRow],
        phase: &mut LoadPhase,
    ) -> SinkResult<u64> {
        session.insert_rows(staging, &table.columns, rows).await?;
        advance(phase, LoadPhase::TempLoaded, &table.name);

        let affected = session
            .merge_from_staging(table, staging)
            .await
            .map_err(|err| {
                sink_error!(
                    ErrorKind::MergeExecutionFailed,
                    "Failed to merge staged rows",
                    format!(
                        "table `{}`: {}",
                        table.name,
                        err.detail().unwrap_or(err.description())
                    ),
                    source: err
                )
            })?;
        advance(phase, LoadPhase::Merged, &table.name);

        Ok(affected)
    }
}

fn advance(phase: &mut LoadPhase, next: LoadPhase, table: &TableName) {
    debug!(table = %table, from = %phase, to = %next, "load phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::{MemorySession, OperationKind, SessionOperation};
    use crate::types::{Cell, ColumnSchema, ColumnType};

    fn users(keyed: bool) -> TableSchema {
        TableSchema::new(
            TableName::new(None, "users"),
            vec![
                ColumnSchema::new("id", ColumnType::BigInt, keyed),
                ColumnSchema::new("name", ColumnType::Varchar(Some(50)), false),
            ],
        )
    }

    fn row(id: i64, name: &str) -> TableRow {
        TableRow::new(vec![Cell::I64(id), Cell::String(name.to_string())])
    }

    fn loader() -> StagedLoader {
        StagedLoader::new(Reconciler::new(true, true))
    }

    #[tokio::test]
    async fn test_keyed_batch_goes_through_staging() {
        let mut session = MemorySession::new();
        let table = users(true);

        let count = loader()
            .process_batch(&mut session, &table, vec![row(1, "a"), row(2, "b")])
            .await
            .unwrap();

        assert_eq!(count, Some(2));
        let staging = table.name.staging_table();
        assert_eq!(
            session.operations().await,
            vec![
                SessionOperation::CreateTable(table.name.clone()),
                SessionOperation::CreateStagingTable {
                    table: table.name.clone(),
                    staging: staging.clone(),
                },
                SessionOperation::InsertRows {
                    table: staging.clone(),
                    rows: 2,
                },
                SessionOperation::Merge {
                    table: table.name.clone(),
                    staging: staging.clone(),
                    rows: 2,
                },
                SessionOperation::DropStagingTable(staging),
            ]
        );
        assert!(session.staging_tables().await.is_empty());
    }

    #[tokio::test]
    async fn test_unkeyed_batch_is_inserted_directly() {
        let mut session = MemorySession::new();
        let table = users(false);

        loader()
            .process_batch(&mut session, &table, vec![row(1, "a"), row(1, "a")])
            .await
            .unwrap();

        assert_eq!(session.table_rows(&table.name).await.len(), 2);
        assert!(
            session
                .operations()
                .await
                .iter()
                .all(|op| op.kind() != OperationKind::Merge)
        );
    }

    #[tokio::test]
    async fn test_unknown_length_yields_none() {
        let mut session = MemorySession::new();
        let table = users(false);
        let rows = (0..3)
            .map(|id| row(id, "x"))
            .filter(|row| row.values()[0] != Cell::I64(1));

        let count = loader()
            .process_batch(&mut session, &table, rows)
            .await
            .unwrap();

        assert_eq!(count, None);
        assert_eq!(session.table_rows(&table.name).await.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_failure_releases_staging() {
        let mut session = MemorySession::new();
        let table = users(true);
        session.fail_next(OperationKind::Merge).await;

        let err = loader()
            .process_batch(&mut session, &table, vec![row(1, "a")])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MergeExecutionFailed);
        assert!(session.staging_tables().await.is_empty());
        assert!(session.table_rows(&table.name).await.is_empty());
    }

    #[tokio::test]
    async fn test_merge_and_release_failures_are_both_reported() {
        let mut session = MemorySession::new();
        let table = users(true);
        session.fail_next(OperationKind::Merge).await;
        session.fail_next(OperationKind::DropStagingTable).await;

        let err = loader()
            .process_batch(&mut session, &table, vec![row(1, "a")])
            .await
            .unwrap_err();

        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::MergeExecutionFailed,
                ErrorKind::DestinationQueryFailed
            ]
        );
    }

    #[tokio::test]
    async fn test_staging_insert_failure_releases_staging() {
        let mut session = MemorySession::new();
        let table = users(true);

        let err = loader()
            .process_batch(&mut session, &table, vec![row(1, &"x".repeat(51))])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
        assert!(session.staging_tables().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keys_last_write_wins() {
        let mut session = MemorySession::new();
        let table = users(true);

        loader()
            .process_batch(
                &mut session,
                &table,
                vec![row(1, "a"), row(2, "b"), row(1, "c")],
            )
            .await
            .unwrap();

        assert_eq!(
            session.table_rows(&table.name).await,
            vec![row(2, "b"), row(1, "c")]
        );
    }
}
