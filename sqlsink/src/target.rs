//! Multi-stream orchestration of a record stream.

use std::collections::BTreeMap;

use serde_json::Value;
use sqlsink_config::shared::{BatchConfig, SinkConfig};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::loader::StagedLoader;
use crate::reconcile::Reconciler;
use crate::schema::TypeMapper;
use crate::session::Session;
use crate::sink::StreamSink;
use crate::stream::{Message, MessageReader, RecordMessage, SchemaMessage, StateMessage};

/// Counters of a completed [`Target::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetSummary {
    /// Messages read from the input.
    pub messages: u64,
    /// Records loaded into the destination.
    pub records: u64,
    /// Batches handed to the loader.
    pub batches: u64,
    /// State messages written to the output.
    pub states_emitted: u64,
}

/// Routes the messages of a record stream to one [`StreamSink`] per stream.
///
/// Every sink shares the same session, and batches are loaded one at a time. A state message is
/// written to the output once every record that preceded it has been loaded.
#[derive(Debug)]
pub struct Target<S> {
    session: S,
    sink_config: SinkConfig,
    batch_config: BatchConfig,
    mapper: TypeMapper,
    loader: StagedLoader,
    sinks: BTreeMap<String, StreamSink>,
    latest_state: Option<Value>,
    summary: TargetSummary,
}

impl<S> Target<S>
where
    S: Session,
{
    pub fn new(session: S, sink_config: SinkConfig, batch_config: BatchConfig) -> Self {
        let mapper = TypeMapper::from_config(&sink_config);
        let loader = StagedLoader::new(Reconciler::from_config(&sink_config));

        Self {
            session,
            sink_config,
            batch_config,
            mapper,
            loader,
            sinks: BTreeMap::new(),
            latest_state: None,
            summary: TargetSummary::default(),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Consumes every message of `input` and writes state messages to `output`.
    ///
    /// Remaining records are loaded and the latest state is written when the input ends. The first
    /// error aborts the run; states of records that were not loaded are never written.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> SinkResult<TargetSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(session = S::name(), "starting target");

        let mut reader = MessageReader::new(input);
        while let Some(message) = reader.next_message().await? {
            self.summary.messages += 1;

            match message {
                Message::Schema(schema) => self.handle_schema(schema).await?,
                Message::Record(record) => self.handle_record(record, output).await?,
                Message::State(state) => self.handle_state(state, output).await?,
                Message::ActivateVersion(activate) => {
                    debug!(stream = %activate.stream, version = activate.version, "ignoring activate version message");
                }
            }
        }

        self.drain(output).await?;

        info!(
            messages = self.summary.messages,
            records = self.summary.records,
            batches = self.summary.batches,
            states = self.summary.states_emitted,
            "target finished"
        );

        Ok(self.summary)
    }

    async fn handle_schema(&mut self, message: SchemaMessage) -> SinkResult<()> {
        let stream_schema = message.stream_schema()?;

        match self.sinks.get_mut(&message.stream) {
            Some(sink) => {
                let loaded = sink.flush(&mut self.session, &self.loader).await?;
                if loaded > 0 {
                    self.summary.records += loaded;
                    self.summary.batches += 1;
                }

                sink.update_schema(&stream_schema, &message.key_properties, &self.mapper)?;
                info!(stream = %message.stream, table = %sink.table_name(), "stream schema updated");
            }
            None => {
                let sink = StreamSink::new(
                    message.stream.clone(),
                    &stream_schema,
                    message.key_properties,
                    &self.sink_config,
                    &self.mapper,
                )?;
                info!(stream = %message.stream, table = %sink.table_name(), "stream registered");
                self.sinks.insert(message.stream, sink);
            }
        }

        Ok(())
    }

    async fn handle_record<W>(&mut self, message: RecordMessage, output: &mut W) -> SinkResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(sink) = self.sinks.get_mut(&message.stream) else {
            bail!(
                ErrorKind::MissingStreamSchema,
                "Record received before the schema of its stream",
                format!("stream `{}`", message.stream)
            );
        };

        sink.push(&message.record)?;
        if sink.pending() >= self.batch_config.max_size {
            debug!(stream = %message.stream, pending = sink.pending(), "batch is full, draining all streams");
            self.drain(output).await?;
        }

        Ok(())
    }

    async fn handle_state<W>(&mut self, message: StateMessage, output: &mut W) -> SinkResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.latest_state = Some(message.value);

        if self.sinks.values().all(|sink| sink.pending() == 0) {
            self.emit_state(output).await?;
        }

        Ok(())
    }

    /// Loads the pending records of every stream, then writes the latest state.
    async fn drain<W>(&mut self, output: &mut W) -> SinkResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        for sink in self.sinks.values_mut() {
            let loaded = sink.flush(&mut self.session, &self.loader).await?;
            if loaded > 0 {
                self.summary.records += loaded;
                self.summary.batches += 1;
            }
        }

        self.emit_state(output).await
    }

    async fn emit_state<W>(&mut self, output: &mut W) -> SinkResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(value) = self.latest_state.take() else {
            return Ok(());
        };

        let mut line = StateMessage { value }.to_line()?;
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;

        self.summary.states_emitted += 1;
        debug!("state emitted");

        Ok(())
    }
}
