use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ErrorKind, SinkResult};
use crate::session::Session;
use crate::types::{Cell, ColumnSchema, ColumnType, TableName, TableRow, TableSchema};
use crate::{bail, sink_error};

/// Schema used for tables created without an explicit schema.
const DEFAULT_SCHEMA: &str = "dbo";

/// An operation applied by a [`MemorySession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOperation {
    CreateSchema(String),
    CreateTable(TableName),
    AddColumn {
        table: TableName,
        column: String,
        column_type: ColumnType,
    },
    AlterColumn {
        table: TableName,
        column: String,
        column_type: ColumnType,
    },
    CreateStagingTable {
        table: TableName,
        staging: TableName,
    },
    DropStagingTable(TableName),
    InsertRows {
        table: TableName,
        rows: u64,
    },
    Merge {
        table: TableName,
        staging: TableName,
        rows: u64,
    },
}

/// Kinds of [`SessionOperation`], used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateSchema,
    CreateTable,
    AddColumn,
    AlterColumn,
    CreateStagingTable,
    DropStagingTable,
    InsertRows,
    Merge,
}

impl SessionOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            SessionOperation::CreateSchema(_) => OperationKind::CreateSchema,
            SessionOperation::CreateTable(_) => OperationKind::CreateTable,
            SessionOperation::AddColumn { .. } => OperationKind::AddColumn,
            SessionOperation::AlterColumn { .. } => OperationKind::AlterColumn,
            SessionOperation::CreateStagingTable { .. } => OperationKind::CreateStagingTable,
            SessionOperation::DropStagingTable(_) => OperationKind::DropStagingTable,
            SessionOperation::InsertRows { .. } => OperationKind::InsertRows,
            SessionOperation::Merge { .. } => OperationKind::Merge,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<ColumnSchema>,
    rows: Vec<Vec<Cell>>,
}

impl MemoryTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    fn key_indexes(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(index, _)| index)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    schemas: BTreeSet<String>,
    tables: BTreeMap<TableName, MemoryTable>,
    operations: Vec<SessionOperation>,
    failures: HashSet<OperationKind>,
}

impl Inner {
    fn fail_if_requested(&mut self, kind: OperationKind) -> SinkResult<()> {
        if self.failures.remove(&kind) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Injected session failure",
                format!("{kind:?}")
            );
        }

        Ok(())
    }

    fn table(&self, table: &TableName) -> SinkResult<&MemoryTable> {
        match self.tables.get(&catalog_key(table)) {
            Some(memory_table) => Ok(memory_table),
            None => bail!(
                ErrorKind::DestinationQueryFailed,
                "Invalid object name",
                table.to_string()
            ),
        }
    }

    fn table_mut(&mut self, table: &TableName) -> SinkResult<&mut MemoryTable> {
        match self.tables.get_mut(&catalog_key(table)) {
            Some(memory_table) => Ok(memory_table),
            None => bail!(
                ErrorKind::DestinationQueryFailed,
                "Invalid object name",
                table.to_string()
            ),
        }
    }
}

/// In-memory session for tests and dry runs.
///
/// [`MemorySession`] keeps a catalog of schemas and tables and enforces the constraints a SQL
/// Server connection would: primary keys, bounded character lengths, and merges whose source
/// matches a target row at most once. Every applied operation is logged, and failures can be
/// injected per operation kind.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySession {
    /// Creates a session with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rows of `table`, or an empty list if the table does not exist.
    pub async fn table_rows(&self, table: &TableName) -> Vec<TableRow> {
        let inner = self.inner.lock().await;

        inner
            .tables
            .get(&catalog_key(table))
            .map(|memory_table| {
                memory_table
                    .rows
                    .iter()
                    .cloned()
                    .map(TableRow::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the columns of `table`, or `None` if the table does not exist.
    pub async fn column_schemas(&self, table: &TableName) -> Option<Vec<ColumnSchema>> {
        let inner = self.inner.lock().await;

        inner
            .tables
            .get(&catalog_key(table))
            .map(|memory_table| memory_table.columns.clone())
    }

    /// Returns every regular table of the catalog.
    pub async fn tables(&self) -> Vec<TableName> {
        let inner = self.inner.lock().await;

        inner
            .tables
            .keys()
            .filter(|table| !table.is_staging())
            .cloned()
            .collect()
    }

    /// Returns the staging tables that currently exist.
    pub async fn staging_tables(&self) -> Vec<TableName> {
        let inner = self.inner.lock().await;

        inner
            .tables
            .keys()
            .filter(|table| table.is_staging())
            .cloned()
            .collect()
    }

    /// Returns the operations applied so far, in order.
    pub async fn operations(&self) -> Vec<SessionOperation> {
        let inner = self.inner.lock().await;
        inner.operations.clone()
    }

    /// Clears the operation log.
    pub async fn clear_operations(&self) {
        let mut inner = self.inner.lock().await;
        inner.operations.clear();
    }

    /// Makes the next operation of `kind` fail with [`ErrorKind::DestinationQueryFailed`].
    pub async fn fail_next(&self, kind: OperationKind) {
        let mut inner = self.inner.lock().await;
        inner.failures.insert(kind);
    }
}

impl Session for MemorySession {
    fn name() -> &'static str {
        "memory"
    }

    async fn table_exists(&mut self, table: &TableName) -> SinkResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.tables.contains_key(&catalog_key(table)))
    }

    async fn table_columns(&mut self, table: &TableName) -> SinkResult<Vec<ColumnSchema>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .get(&catalog_key(table))
            .map(|memory_table| memory_table.columns.clone())
            .unwrap_or_default())
    }

    async fn get_column_type(
        &mut self,
        table: &TableName,
        column: &str,
    ) -> SinkResult<Option<ColumnType>> {
        let inner = self.inner.lock().await;

        Ok(inner.tables.get(&catalog_key(table)).and_then(|memory_table| {
            memory_table
                .columns
                .iter()
                .find(|existing| existing.name == column)
                .map(|existing| existing.column_type.clone())
        }))
    }

    async fn create_schema_if_missing(&mut self, schema: &str) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::CreateSchema)?;

        if schema == DEFAULT_SCHEMA || !inner.schemas.insert(schema.to_string()) {
            return Ok(());
        }

        info!(schema, "created schema");
        inner
            .operations
            .push(SessionOperation::CreateSchema(schema.to_string()));

        Ok(())
    }

    async fn create_table(&mut self, table: &TableSchema) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::CreateTable)?;

        let key = catalog_key(&table.name);
        if inner.tables.contains_key(&key) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "There is already an object with this name",
                table.name.to_string()
            );
        }
        if let Some(schema) = &key.schema
            && schema != DEFAULT_SCHEMA
            && !inner.schemas.contains(schema)
        {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Schema does not exist",
                schema
            );
        }
        if table.columns.is_empty() {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "A table must have at least one column",
                table.name.to_string()
            );
        }

        info!(table = %table.name, columns = table.columns.len(), "created table");
        inner.tables.insert(
            key,
            MemoryTable {
                columns: table.columns.clone(),
                rows: Vec::new(),
            },
        );
        inner
            .operations
            .push(SessionOperation::CreateTable(table.name.clone()));

        Ok(())
    }

    async fn add_column(&mut self, table: &TableName, column: &ColumnSchema) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::AddColumn)?;

        let memory_table = inner.table_mut(table)?;
        if memory_table.column_index(&column.name).is_some() {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Column names in each table must be unique",
                format!("column `{}` of table `{table}`", column.name)
            );
        }

        memory_table.columns.push(ColumnSchema::new(
            column.name.clone(),
            column.column_type.clone(),
            false,
        ));
        for row in &mut memory_table.rows {
            row.push(Cell::Null);
        }

        inner.operations.push(SessionOperation::AddColumn {
            table: table.clone(),
            column: column.name.clone(),
            column_type: column.column_type.clone(),
        });

        Ok(())
    }

    async fn alter_column(&mut self, table: &TableName, column: &ColumnSchema) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::AlterColumn)?;

        let memory_table = inner.table_mut(table)?;
        let Some(index) = memory_table.column_index(&column.name) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Invalid column name",
                format!("column `{}` of table `{table}`", column.name)
            );
        };

        for row in &memory_table.rows {
            check_fits(&row[index], &column.column_type, &column.name)?;
        }
        memory_table.columns[index].column_type = column.column_type.clone();

        inner.operations.push(SessionOperation::AlterColumn {
            table: table.clone(),
            column: column.name.clone(),
            column_type: column.column_type.clone(),
        });

        Ok(())
    }

    async fn create_staging_table(
        &mut self,
        table: &TableName,
        staging: &TableName,
    ) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::CreateStagingTable)?;

        let columns = inner
            .table(table)?
            .columns
            .iter()
            .map(|column| ColumnSchema::new(column.name.clone(), column.column_type.clone(), false))
            .collect();

        inner.tables.insert(
            catalog_key(staging),
            MemoryTable {
                columns,
                rows: Vec::new(),
            },
        );
        inner.operations.push(SessionOperation::CreateStagingTable {
            table: table.clone(),
            staging: staging.clone(),
        });

        Ok(())
    }

    async fn drop_staging_table(&mut self, staging: &TableName) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::DropStagingTable)?;

        inner.tables.remove(&catalog_key(staging));
        inner
            .operations
            .push(SessionOperation::DropStagingTable(staging.clone()));

        Ok(())
    }

    async fn insert_rows(
        &mut self,
        table: &TableName,
        columns: &[ColumnSchema],
        rows: &[TableRow],
    ) -> SinkResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::InsertRows)?;

        let memory_table = inner.table_mut(table)?;
        let indexes = resolve_columns(memory_table, columns, table)?;
        let key_indexes = memory_table.key_indexes();

        let mut new_rows = Vec::with_capacity(rows.len());
        for row in rows {
            if row.values().len() != indexes.len() {
                bail!(
                    ErrorKind::InvalidState,
                    "Row width does not match the column list",
                    format!("{} values for {} columns", row.values().len(), indexes.len())
                );
            }

            let mut full_row = vec![Cell::Null; memory_table.columns.len()];
            for (cell, &index) in row.values().iter().zip(&indexes) {
                let column = &memory_table.columns[index];
                check_fits(cell, &column.column_type, &column.name)?;
                full_row[index] = cell.clone();
            }
            new_rows.push(full_row);
        }

        check_primary_key(&memory_table.rows, &new_rows, &key_indexes, table)?;

        let inserted = new_rows.len() as u64;
        debug!(table = %table, rows = inserted, "inserted rows");
        memory_table.rows.extend(new_rows);
        inner.operations.push(SessionOperation::InsertRows {
            table: table.clone(),
            rows: inserted,
        });

        Ok(inserted)
    }

    async fn merge_from_staging(
        &mut self,
        table: &TableSchema,
        staging: &TableName,
    ) -> SinkResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.fail_if_requested(OperationKind::Merge)?;

        let key_columns: Vec<&ColumnSchema> = table.key_columns().collect();
        if key_columns.is_empty() {
            bail!(
                ErrorKind::InvalidState,
                "Merging requires key columns",
                table.name.to_string()
            );
        }

        let staged = inner.table(staging)?;
        let staged_indexes = resolve_columns(staged, &table.columns, staging)?;
        let staged_rows: Vec<Vec<Cell>> = staged
            .rows
            .iter()
            .map(|row| staged_indexes.iter().map(|&index| row[index].clone()).collect())
            .collect();

        let target = inner.table_mut(&table.name)?;
        let target_indexes = resolve_columns(target, &table.columns, &table.name)?;
        let key_positions: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(position, _)| position)
            .collect();

        // Plan the whole merge first so a failure leaves the target untouched.
        let mut matched_targets = HashSet::new();
        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        for staged_row in staged_rows {
            for (position, cell) in staged_row.iter().enumerate() {
                let column = &target.columns[target_indexes[position]];
                check_fits(cell, &column.column_type, &column.name)?;
            }

            let matched = target.rows.iter().position(|target_row| {
                key_positions
                    .iter()
                    .all(|&position| {
                        target_row[target_indexes[position]].key_text()
                            == staged_row[position].key_text()
                    })
            });

            match matched {
                Some(target_index) => {
                    if !matched_targets.insert(target_index) {
                        bail!(
                            ErrorKind::DestinationQueryFailed,
                            "The MERGE statement attempted to UPDATE the same row more than once",
                            format!("table `{}`", table.name)
                        );
                    }
                    updates.push((target_index, staged_row));
                }
                None => {
                    let mut full_row = vec![Cell::Null; target.columns.len()];
                    for (position, cell) in staged_row.into_iter().enumerate() {
                        full_row[target_indexes[position]] = cell;
                    }
                    inserts.push(full_row);
                }
            }
        }

        check_primary_key(&target.rows, &inserts, &target.key_indexes(), &table.name)?;

        let affected = (updates.len() + inserts.len()) as u64;
        for (target_index, staged_row) in updates {
            for (position, cell) in staged_row.into_iter().enumerate() {
                if !table.columns[position].primary_key {
                    target.rows[target_index][target_indexes[position]] = cell;
                }
            }
        }
        target.rows.extend(inserts);

        debug!(table = %table.name, rows = affected, "merged staging table");
        inner.operations.push(SessionOperation::Merge {
            table: table.name.clone(),
            staging: staging.clone(),
            rows: affected,
        });

        Ok(affected)
    }
}

/// Returns the catalog key of a table, resolving the default schema.
fn catalog_key(table: &TableName) -> TableName {
    if table.is_staging() || table.schema.is_some() {
        return table.clone();
    }

    TableName::new(Some(DEFAULT_SCHEMA.to_string()), table.name.clone())
}

fn resolve_columns(
    memory_table: &MemoryTable,
    columns: &[ColumnSchema],
    table: &TableName,
) -> SinkResult<Vec<usize>> {
    columns
        .iter()
        .map(|column| {
            memory_table.column_index(&column.name).ok_or_else(|| {
                sink_error!(
                    ErrorKind::DestinationQueryFailed,
                    "Invalid column name",
                    format!("column `{}` of table `{table}`", column.name)
                )
            })
        })
        .collect()
}

fn check_fits(cell: &Cell, column_type: &ColumnType, column: &str) -> SinkResult<()> {
    if let (Cell::I64(value), Some(range)) = (cell, integer_range(column_type))
        && !range.contains(value)
    {
        bail!(
            ErrorKind::DestinationQueryFailed,
            "Arithmetic overflow error converting expression to data type",
            format!("column `{column}` ({column_type}) received {value}")
        );
    }

    let limit = match column_type {
        ColumnType::Varchar(Some(length)) | ColumnType::NVarchar(Some(length)) => {
            *length as usize
        }
        ColumnType::Boolean => 1,
        _ => return Ok(()),
    };

    if let Some(length) = cell.text_len()
        && length > limit
    {
        bail!(
            ErrorKind::DestinationQueryFailed,
            "String or binary data would be truncated",
            format!("column `{column}` ({column_type}) received {length} characters")
        );
    }

    Ok(())
}

fn integer_range(column_type: &ColumnType) -> Option<std::ops::RangeInclusive<i64>> {
    match column_type {
        ColumnType::TinyInt => Some(0..=i64::from(u8::MAX)),
        ColumnType::SmallInt => Some(i64::from(i16::MIN)..=i64::from(i16::MAX)),
        ColumnType::Int => Some(i64::from(i32::MIN)..=i64::from(i32::MAX)),
        _ => None,
    }
}

fn check_primary_key(
    existing: &[Vec<Cell>],
    new_rows: &[Vec<Cell>],
    key_indexes: &[usize],
    table: &TableName,
) -> SinkResult<()> {
    if key_indexes.is_empty() {
        return Ok(());
    }

    let key_of = |row: &Vec<Cell>| -> Vec<String> {
        key_indexes
            .iter()
            .map(|&index| row[index].key_text())
            .collect()
    };

    let mut keys: HashSet<Vec<String>> = existing.iter().map(key_of).collect();
    for row in new_rows {
        if key_indexes.iter().any(|&index| row[index].is_null()) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Cannot insert NULL into a primary key column",
                format!("table `{table}`")
            );
        }

        if !keys.insert(key_of(row)) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Violation of PRIMARY KEY constraint",
                format!("duplicate key in table `{table}`")
            );
        }
    }

    Ok(())
}
