use std::future::Future;

use crate::error::SinkResult;
use crate::types::{ColumnSchema, ColumnType, TableName, TableRow, TableSchema};

/// Capabilities of a database session used to load record streams.
///
/// A session is a single connection handle. Every operation borrows it mutably, so a caller
/// processes one statement at a time and a batch never interleaves with another batch of the
/// same session.
///
/// Staging tables are session-scoped tables named by [`TableName::staging_table`]. They are
/// created as zero-row copies of a target table's columns and carry no constraints.
pub trait Session {
    /// Returns the name of the session implementation.
    fn name() -> &'static str;

    /// Returns whether `table` exists.
    fn table_exists(&mut self, table: &TableName) -> impl Future<Output = SinkResult<bool>> + Send;

    /// Returns the live columns of `table` in their physical order.
    fn table_columns(
        &mut self,
        table: &TableName,
    ) -> impl Future<Output = SinkResult<Vec<ColumnSchema>>> + Send;

    /// Returns the live type of `column`, or `None` if the column does not exist.
    fn get_column_type(
        &mut self,
        table: &TableName,
        column: &str,
    ) -> impl Future<Output = SinkResult<Option<ColumnType>>> + Send;

    /// Creates `schema` unless it already exists.
    fn create_schema_if_missing(
        &mut self,
        schema: &str,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Creates a table with the given columns, key columns forming the primary key.
    fn create_table(&mut self, table: &TableSchema) -> impl Future<Output = SinkResult<()>> + Send;

    /// Adds a nullable column to `table`.
    fn add_column(
        &mut self,
        table: &TableName,
        column: &ColumnSchema,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Changes an existing column to the type of `column`, keeping it nullable unless it is a key.
    fn alter_column(
        &mut self,
        table: &TableName,
        column: &ColumnSchema,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Creates `staging` as an empty copy of `table`, dropping any previous table of that name.
    fn create_staging_table(
        &mut self,
        table: &TableName,
        staging: &TableName,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Drops `staging` if it exists.
    fn drop_staging_table(
        &mut self,
        staging: &TableName,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Inserts rows into `table`, binding each row's cells to `columns` in order.
    ///
    /// Returns the number of inserted rows.
    fn insert_rows(
        &mut self,
        table: &TableName,
        columns: &[ColumnSchema],
        rows: &[TableRow],
    ) -> impl Future<Output = SinkResult<u64>> + Send;

    /// Merges every row of `staging` into the target table of `table` in one atomic operation.
    ///
    /// Rows are matched on all key columns of `table`. Matched rows get every non-key column
    /// updated and unmatched rows are inserted. Returns the number of affected rows.
    fn merge_from_staging(
        &mut self,
        table: &TableSchema,
        staging: &TableName,
    ) -> impl Future<Output = SinkResult<u64>> + Send;
}
