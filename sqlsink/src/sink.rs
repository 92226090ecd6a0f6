//! Per-stream record buffering.

use sqlsink_config::shared::SinkConfig;
use tracing::{debug, warn};

use crate::conversions::name::table_name_for_stream;
use crate::conversions::record::conform_record;
use crate::error::SinkResult;
use crate::loader::StagedLoader;
use crate::schema::{StreamTable, TypeMapper};
use crate::session::Session;
use crate::types::{Record, StreamSchema, TableName, TableRow};

/// Buffers the records of one stream and loads them in batches.
///
/// The key properties are fixed by the first schema of the stream.
#[derive(Debug)]
pub struct StreamSink {
    stream: String,
    table: StreamTable,
    key_properties: Vec<String>,
    pending: Vec<TableRow>,
}

impl StreamSink {
    pub fn new(
        stream: impl Into<String>,
        stream_schema: &StreamSchema,
        key_properties: Vec<String>,
        config: &SinkConfig,
        mapper: &TypeMapper,
    ) -> SinkResult<Self> {
        let stream = stream.into();
        let name = table_name_for_stream(&stream, config)?;
        let table = StreamTable::build(name, stream_schema, &key_properties, mapper)?;

        Ok(Self {
            stream,
            table,
            key_properties,
            pending: Vec::new(),
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn table_name(&self) -> &TableName {
        self.table.name()
    }

    pub fn table(&self) -> &StreamTable {
        &self.table
    }

    pub fn key_properties(&self) -> &[String] {
        &self.key_properties
    }

    /// Replaces the schema of the stream.
    ///
    /// Pending records were conformed against the previous schema, so callers flush before
    /// updating. Changed key properties are ignored with a warning.
    pub fn update_schema(
        &mut self,
        stream_schema: &StreamSchema,
        key_properties: &[String],
        mapper: &TypeMapper,
    ) -> SinkResult<()> {
        if key_properties != self.key_properties.as_slice() {
            warn!(
                stream = %self.stream,
                keys = ?self.key_properties,
                ignored = ?key_properties,
                "key properties of a stream cannot change, keeping the original ones"
            );
        }

        self.table = StreamTable::build(
            self.table.name().clone(),
            stream_schema,
            &self.key_properties,
            mapper,
        )?;

        Ok(())
    }

    /// Conforms `record` and adds it to the pending batch.
    pub fn push(&mut self, record: &Record) -> SinkResult<()> {
        let row = conform_record(record, &self.table)?;
        self.pending.push(row);

        Ok(())
    }

    /// Returns the number of buffered records.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Loads every buffered record and returns how many were loaded.
    pub async fn flush<S: Session>(
        &mut self,
        session: &mut S,
        loader: &StagedLoader,
    ) -> SinkResult<u64> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let rows = std::mem::take(&mut self.pending);
        let count = rows.len() as u64;
        debug!(stream = %self.stream, table = %self.table.name(), rows = count, "flushing stream");

        let loaded = loader
            .process_batch(session, self.table.schema(), rows)
            .await?;

        Ok(loaded.unwrap_or(count))
    }
}
