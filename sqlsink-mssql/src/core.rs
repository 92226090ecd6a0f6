use sqlsink::error::{ErrorKind, SinkResult};
use sqlsink::session::Session;
use sqlsink::sink_error;
use sqlsink::types::{ColumnSchema, ColumnType, TableName, TableRow, TableSchema};
use sqlsink_config::shared::MssqlConnectionConfig;
use tiberius::{Query, Row};
use tracing::{debug, info, warn};

use crate::catalog::parse_column_type;
use crate::client::{MssqlClient, connect, driver_error};
use crate::encoding::{bind_param, encode_cell};
use crate::sql;

/// A [`Session`] over a single SQL Server connection.
///
/// DDL and staging statements run as plain batches so that staging tables live as long as the
/// connection. Row data is always sent as parameters.
pub struct MssqlSession {
    client: MssqlClient,
}

impl MssqlSession {
    /// Connects to the server described by `config`.
    pub async fn connect(config: &MssqlConnectionConfig) -> SinkResult<Self> {
        let client = connect(config).await?;

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: MssqlClient) -> Self {
        Self { client }
    }

    pub fn into_client(self) -> MssqlClient {
        self.client
    }

    /// Runs a DDL batch.
    async fn execute_ddl(&mut self, statement: String) -> SinkResult<()> {
        info!(%statement, "executing ddl");
        self.execute_batch(statement).await
    }

    async fn execute_batch(&mut self, statement: String) -> SinkResult<()> {
        self.client
            .simple_query(statement)
            .await
            .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Statement failed", err))?
            .into_results()
            .await
            .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Statement failed", err))?;

        Ok(())
    }

    async fn query_rows(&mut self, query: Query<'static>) -> SinkResult<Vec<Row>> {
        query
            .query(&mut self.client)
            .await
            .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Catalog query failed", err))?
            .into_first_result()
            .await
            .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Catalog query failed", err))
    }
}

impl Session for MssqlSession {
    fn name() -> &'static str {
        "mssql"
    }

    async fn table_exists(&mut self, table: &TableName) -> SinkResult<bool> {
        let mut query = Query::new(sql::TABLE_EXISTS_QUERY);
        query.bind(sql::object_id_name(table));

        let rows = self.query_rows(query).await?;
        let object_id = match rows.first() {
            Some(row) => row
                .try_get::<i32, _>(0)
                .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Unexpected catalog row", err))?,
            None => None,
        };

        Ok(object_id.is_some())
    }

    async fn table_columns(&mut self, table: &TableName) -> SinkResult<Vec<ColumnSchema>> {
        let mut query = Query::new(sql::TABLE_COLUMNS_QUERY);
        query.bind(sql::object_id_name(table));

        self.query_rows(query)
            .await?
            .iter()
            .map(|row| -> SinkResult<ColumnSchema> {
                let name = text_column(row, 0)?;
                let column_type = column_type_from_row(row, 1)?;
                let primary_key = row
                    .try_get::<bool, _>(5)
                    .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Unexpected catalog row", err))?
                    .unwrap_or(false);

                Ok(ColumnSchema::new(name, column_type, primary_key))
            })
            .collect()
    }

    async fn get_column_type(
        &mut self,
        table: &TableName,
        column: &str,
    ) -> SinkResult<Option<ColumnType>> {
        let mut query = Query::new(sql::COLUMN_TYPE_QUERY);
        query.bind(sql::object_id_name(table));
        query.bind(column.to_string());

        let rows = self.query_rows(query).await?;
        rows.first()
            .map(|row| column_type_from_row(row, 0))
            .transpose()
    }

    async fn create_schema_if_missing(&mut self, schema: &str) -> SinkResult<()> {
        self.execute_ddl(sql::create_schema(schema)).await
    }

    async fn create_table(&mut self, table: &TableSchema) -> SinkResult<()> {
        self.execute_ddl(sql::create_table(table)).await
    }

    async fn add_column(&mut self, table: &TableName, column: &ColumnSchema) -> SinkResult<()> {
        self.execute_ddl(sql::add_column(table, column)).await
    }

    async fn alter_column(&mut self, table: &TableName, column: &ColumnSchema) -> SinkResult<()> {
        self.execute_ddl(sql::alter_column(table, column)).await
    }

    async fn create_staging_table(
        &mut self,
        table: &TableName,
        staging: &TableName,
    ) -> SinkResult<()> {
        self.execute_ddl(sql::create_staging_table(table, staging))
            .await
    }

    async fn drop_staging_table(&mut self, staging: &TableName) -> SinkResult<()> {
        self.execute_ddl(sql::drop_staging_table(staging)).await
    }

    async fn insert_rows(
        &mut self,
        table: &TableName,
        columns: &[ColumnSchema],
        rows: &[TableRow],
    ) -> SinkResult<u64> {
        let mut inserted = 0;

        for chunk in rows.chunks(sql::insert_chunk_rows(columns.len())) {
            let statement = sql::insert_rows(table, columns, chunk.len());
            debug!(%table, rows = chunk.len(), "inserting rows");

            let mut query = Query::new(statement);
            for row in chunk {
                if row.values().len() != columns.len() {
                    return Err(sink_error!(
                        ErrorKind::InvalidState,
                        "Row width does not match the column list",
                        format!("{} values for {} columns", row.values().len(), columns.len())
                    ));
                }

                for cell in row.values() {
                    bind_param(&mut query, encode_cell(cell)?);
                }
            }

            let result = query.execute(&mut self.client).await.map_err(|err| {
                driver_error(ErrorKind::DestinationQueryFailed, "Failed to insert rows", err)
            })?;
            inserted += result.total();
        }

        Ok(inserted)
    }

    async fn merge_from_staging(
        &mut self,
        table: &TableSchema,
        staging: &TableName,
    ) -> SinkResult<u64> {
        let statement = sql::merge_in_transaction(table, staging);
        debug!(table = %table.name, %statement, "merging staging table");

        match Query::new(statement).execute(&mut self.client).await {
            Ok(result) => Ok(result.total()),
            Err(err) => {
                // A batch aborted outside the TRY block leaves the transaction open.
                if let Err(rollback_err) = self
                    .execute_batch(sql::ROLLBACK_OPEN_TRANSACTION.to_string())
                    .await
                {
                    warn!(table = %table.name, error = %rollback_err, "failed to roll back merge");
                }

                Err(driver_error(
                    ErrorKind::DestinationQueryFailed,
                    "Merge statement failed",
                    err,
                ))
            }
        }
    }
}

fn text_column(row: &Row, index: usize) -> SinkResult<String> {
    match row.try_get::<&str, _>(index) {
        Ok(Some(value)) => Ok(value.to_string()),
        Ok(None) => Err(sink_error!(
            ErrorKind::InvalidState,
            "Unexpected null in catalog row",
            format!("column {index}")
        )),
        Err(err) => Err(driver_error(
            ErrorKind::DestinationQueryFailed,
            "Unexpected catalog row",
            err,
        )),
    }
}

/// Reads the type name, max length, precision and scale starting at column `start`.
fn column_type_from_row(row: &Row, start: usize) -> SinkResult<ColumnType> {
    let type_name = text_column(row, start)?;
    let max_length = row
        .try_get::<i16, _>(start + 1)
        .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Unexpected catalog row", err))?
        .unwrap_or_default();
    let precision = row
        .try_get::<u8, _>(start + 2)
        .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Unexpected catalog row", err))?
        .unwrap_or_default();
    let scale = row
        .try_get::<u8, _>(start + 3)
        .map_err(|err| driver_error(ErrorKind::DestinationQueryFailed, "Unexpected catalog row", err))?
        .unwrap_or_default();

    Ok(parse_column_type(&type_name, max_length, precision, scale))
}
