//! Schema/DDL reconciliation.
//!
//! The [`Reconciler`] brings a live table in line with the desired shape of a stream: it creates
//! missing tables, adds missing columns, and widens columns whose type no longer fits. It never
//! drops or narrows anything, and columns missing from a later schema are left in place.

use sqlsink_config::shared::SinkConfig;
use tracing::info;

use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::schema::merge_types;
use crate::session::Session;
use crate::types::{ColumnSchema, ColumnType, TableName, TableSchema};
use crate::{bail, sink_error};

/// Applies add-column and widen-column DDL, gated by configuration.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    allow_column_add: bool,
    allow_column_alter: bool,
}

impl Reconciler {
    pub fn new(allow_column_add: bool, allow_column_alter: bool) -> Self {
        Self {
            allow_column_add,
            allow_column_alter,
        }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(config.allow_column_add, config.allow_column_alter)
    }

    /// Makes sure `table` exists with at least the columns of the desired schema.
    ///
    /// Creates the table (and its schema) when absent. Otherwise adds missing columns and widens
    /// existing ones. Fails with [`ErrorKind::InvalidSchema`] before touching the database when
    /// the schema has no columns.
    pub async fn ensure_table<S: Session>(
        &self,
        session: &mut S,
        table: &TableSchema,
    ) -> SinkResult<()> {
        if table.columns.is_empty() {
            bail!(
                ErrorKind::InvalidSchema,
                "Stream schema has no properties",
                format!("table `{}` cannot be created without columns", table.name)
            );
        }

        if !session.table_exists(&table.name).await? {
            if let Some(schema) = &table.name.schema {
                session
                    .create_schema_if_missing(schema)
                    .await
                    .map_err(|err| ddl_error("Failed to create schema", &table.name, err))?;
            }

            info!(table = %table.name, columns = table.columns.len(), "creating table");
            session
                .create_table(table)
                .await
                .map_err(|err| ddl_error("Failed to create table", &table.name, err))?;

            return Ok(());
        }

        let live_columns = session.table_columns(&table.name).await?;
        for column in &table.columns {
            match live_columns.iter().find(|live| live.name == column.name) {
                Some(live) => {
                    self.widen_column(session, &table.name, column, &live.column_type)
                        .await?
                }
                None => self.add_column(session, &table.name, column).await?,
            }
        }

        Ok(())
    }

    /// Adds `column` to `table` unless it already exists.
    pub async fn ensure_column<S: Session>(
        &self,
        session: &mut S,
        table: &TableName,
        column: &ColumnSchema,
    ) -> SinkResult<()> {
        if session.get_column_type(table, &column.name).await?.is_some() {
            return Ok(());
        }

        self.add_column(session, table, column).await
    }

    /// Widens the live type of `column` so it can hold values of the column's desired type.
    pub async fn reconcile_column_type<S: Session>(
        &self,
        session: &mut S,
        table: &TableName,
        column: &ColumnSchema,
    ) -> SinkResult<()> {
        let Some(current) = session.get_column_type(table, &column.name).await? else {
            bail!(
                ErrorKind::InvalidState,
                "Column does not exist",
                format!("column `{}` of table `{table}`", column.name)
            );
        };

        self.widen_column(session, table, column, &current).await
    }

    async fn add_column<S: Session>(
        &self,
        session: &mut S,
        table: &TableName,
        column: &ColumnSchema,
    ) -> SinkResult<()> {
        if !self.allow_column_add {
            bail!(
                ErrorKind::UnsupportedOperation,
                "Adding columns is disabled",
                format!(
                    "column `{}` ({}) is missing from table `{table}`",
                    column.name, column.column_type
                )
            );
        }

        info!(table = %table, column = %column.name, column_type = %column.column_type, "adding column");
        session
            .add_column(table, column)
            .await
            .map_err(|err| ddl_error("Failed to add column", table, err))
    }

    async fn widen_column<S: Session>(
        &self,
        session: &mut S,
        table: &TableName,
        column: &ColumnSchema,
        current: &ColumnType,
    ) -> SinkResult<()> {
        let incoming = &column.column_type;
        if current.sql() == incoming.sql() {
            return Ok(());
        }

        let merged = merge_types(&[current.clone(), incoming.clone()]).map_err(|err| {
            sink_error!(
                ErrorKind::IncompatibleTypes,
                "Column type cannot be reconciled",
                format!(
                    "column `{}` of table `{table}`: {}",
                    column.name,
                    err.detail().unwrap_or(err.description())
                ),
                source: err
            )
        })?;

        if merged.sql() == current.sql() {
            return Ok(());
        }

        if !self.allow_column_alter {
            bail!(
                ErrorKind::UnsupportedOperation,
                "Altering columns is disabled",
                format!(
                    "column `{}` of table `{table}` needs {current} -> {merged}",
                    column.name
                )
            );
        }

        info!(table = %table, column = %column.name, from = %current, to = %merged, "altering column");
        let altered = ColumnSchema::new(column.name.clone(), merged, column.primary_key);
        session
            .alter_column(table, &altered)
            .await
            .map_err(|err| ddl_error("Failed to alter column", table, err))
    }
}

fn ddl_error(description: &'static str, table: &TableName, err: SinkError) -> SinkError {
    sink_error!(
        ErrorKind::DdlExecutionFailed,
        description,
        format!("table `{table}`: {}", err.detail().unwrap_or(err.description())),
        source: err
    )
}
