//! T-SQL statement builders.
//!
//! Identifiers are always bracket-quoted and values are bound as parameters, except for the
//! catalog names embedded in `OBJECT_ID`/`SCHEMA_ID` literals, which are escaped.

use sqlsink::types::{ColumnSchema, TableName, TableSchema};

/// Maximum number of parameters of a single request.
pub const MAX_PARAMETERS: usize = 2100;

/// Maximum number of rows of a single `VALUES` clause.
pub const MAX_VALUES_ROWS: usize = 1000;

/// Quotes an identifier with brackets, doubling closing brackets.
pub fn quote_identifier(identifier: &str) -> String {
    format!("[{}]", identifier.replace(']', "]]"))
}

/// Quotes a string literal, doubling single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Returns the bracket-quoted, schema-qualified name of a table.
pub fn qualified_name(table: &TableName) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&table.name)),
        None => quote_identifier(&table.name),
    }
}

/// Returns the name `OBJECT_ID` resolves `table` with, looking staging tables up in `tempdb`.
pub fn object_id_name(table: &TableName) -> String {
    if table.is_staging() {
        format!("tempdb..{}", quote_identifier(&table.name))
    } else {
        qualified_name(table)
    }
}

pub fn create_schema(schema: &str) -> String {
    let create = format!("CREATE SCHEMA {}", quote_identifier(schema));

    format!(
        "IF SCHEMA_ID({}) IS NULL EXEC({})",
        quote_literal(schema),
        quote_literal(&create)
    )
}

pub fn create_table(table: &TableSchema) -> String {
    let mut definitions: Vec<String> = table.columns.iter().map(column_definition).collect();

    let keys: Vec<String> = table
        .key_columns()
        .map(|column| quote_identifier(&column.name))
        .collect();
    if !keys.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!(
        "CREATE TABLE {} ({})",
        qualified_name(&table.name),
        definitions.join(", ")
    )
}

pub fn add_column(table: &TableName, column: &ColumnSchema) -> String {
    format!(
        "ALTER TABLE {} ADD {} {} NULL",
        qualified_name(table),
        quote_identifier(&column.name),
        column.column_type
    )
}

/// Changes the type of `column`, restating its nullability so the server default never applies.
pub fn alter_column(table: &TableName, column: &ColumnSchema) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {}",
        qualified_name(table),
        column_definition(column)
    )
}

fn column_definition(column: &ColumnSchema) -> String {
    let nullability = if column.primary_key { "NOT NULL" } else { "NULL" };

    format!(
        "{} {} {nullability}",
        quote_identifier(&column.name),
        column.column_type
    )
}

pub fn create_staging_table(table: &TableName, staging: &TableName) -> String {
    format!(
        "{}; SELECT TOP 0 * INTO {} FROM {}",
        drop_staging_table(staging),
        qualified_name(staging),
        qualified_name(table)
    )
}

pub fn drop_staging_table(staging: &TableName) -> String {
    format!(
        "IF OBJECT_ID({}) IS NOT NULL DROP TABLE {}",
        quote_literal(&object_id_name(staging)),
        qualified_name(staging)
    )
}

/// Returns how many rows fit in one `INSERT` of `column_count` parameters per row.
pub fn insert_chunk_rows(column_count: usize) -> usize {
    if column_count == 0 {
        return MAX_VALUES_ROWS;
    }

    ((MAX_PARAMETERS - 1) / column_count).clamp(1, MAX_VALUES_ROWS)
}

/// Builds a multi-row `INSERT` with `@P1`-style placeholders for `row_count` rows.
pub fn insert_rows(table: &TableName, columns: &[ColumnSchema], row_count: usize) -> String {
    let column_list = columns
        .iter()
        .map(|column| quote_identifier(&column.name))
        .collect::<Vec<_>>()
        .join(", ");

    let rows = (0..row_count)
        .map(|row| {
            let placeholders = (0..columns.len())
                .map(|column| format!("@P{}", row * columns.len() + column + 1))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({column_list}) VALUES {rows}",
        qualified_name(table)
    )
}

/// Builds the `MERGE` applying `staging` to the target table on its key columns.
///
/// The update clause is left out when every column is a key column.
pub fn merge(table: &TableSchema, staging: &TableName) -> String {
    let on = table
        .key_columns()
        .map(|column| {
            let name = quote_identifier(&column.name);
            format!("target.{name} = source.{name}")
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let updates = table
        .columns
        .iter()
        .filter(|column| !column.primary_key)
        .map(|column| {
            let name = quote_identifier(&column.name);
            format!("target.{name} = source.{name}")
        })
        .collect::<Vec<_>>();

    let columns = table
        .columns
        .iter()
        .map(|column| quote_identifier(&column.name))
        .collect::<Vec<_>>();
    let values = columns
        .iter()
        .map(|name| format!("source.{name}"))
        .collect::<Vec<_>>();

    let mut statement = format!(
        "MERGE INTO {} AS target USING {} AS source ON {on}",
        qualified_name(&table.name),
        qualified_name(staging)
    );
    if !updates.is_empty() {
        statement.push_str(&format!(
            " WHEN MATCHED THEN UPDATE SET {}",
            updates.join(", ")
        ));
    }
    statement.push_str(&format!(
        " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
        columns.join(", "),
        values.join(", ")
    ));

    statement
}

/// Rolls back a transaction left open on the connection.
pub const ROLLBACK_OPEN_TRANSACTION: &str = "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION";

/// Wraps [`merge`] in a transaction that is committed, or rolled back and re-raised when either
/// the merge or the commit fails.
pub fn merge_in_transaction(table: &TableSchema, staging: &TableName) -> String {
    format!(
        "BEGIN TRY BEGIN TRANSACTION; {} COMMIT TRANSACTION; END TRY \
         BEGIN CATCH {ROLLBACK_OPEN_TRANSACTION}; THROW; END CATCH",
        merge(table, staging)
    )
}

/// Selects one row per column of the table named by `@P1`, in column order.
pub const TABLE_COLUMNS_QUERY: &str = "SELECT c.name, t.name, c.max_length, c.precision, c.scale, \
     CAST(CASE WHEN k.column_id IS NULL THEN 0 ELSE 1 END AS BIT) \
     FROM sys.columns c \
     JOIN sys.types t ON t.user_type_id = c.user_type_id \
     LEFT JOIN (SELECT ic.object_id, ic.column_id FROM sys.index_columns ic \
     JOIN sys.indexes i ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
     WHERE i.is_primary_key = 1) k ON k.object_id = c.object_id AND k.column_id = c.column_id \
     WHERE c.object_id = OBJECT_ID(@P1) \
     ORDER BY c.column_id";

/// Selects the type of the column named by `@P2` of the table named by `@P1`.
pub const COLUMN_TYPE_QUERY: &str = "SELECT t.name, c.max_length, c.precision, c.scale \
     FROM sys.columns c \
     JOIN sys.types t ON t.user_type_id = c.user_type_id \
     WHERE c.object_id = OBJECT_ID(@P1) AND c.name = @P2";

/// Selects the object id of the user table named by `@P1`, `NULL` when it does not exist.
pub const TABLE_EXISTS_QUERY: &str = "SELECT OBJECT_ID(@P1, N'U')";
