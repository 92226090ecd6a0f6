use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;
use crate::stream::Message;

/// Reads [`Message`]s from line-delimited JSON input.
#[derive(Debug)]
pub struct MessageReader<R> {
    lines: Lines<R>,
    line_number: u64,
}

impl<R> MessageReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Returns the next message, or `None` at the end of the input.
    ///
    /// Blank lines are skipped. A line that is not a valid message fails with
    /// [`ErrorKind::DeserializationError`] naming the line number.
    pub async fn next_message(&mut self) -> SinkResult<Option<Message>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let message = serde_json::from_str(&line).map_err(|err| {
                sink_error!(
                    ErrorKind::DeserializationError,
                    "Malformed record stream message",
                    format!("line {}: {err}", self.line_number),
                    source: err
                )
            })?;

            return Ok(Some(message));
        }

        Ok(None)
    }

    /// Returns the number of lines read so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_messages_and_skips_blank_lines() {
        let input = concat!(
            r#"{"type": "STATE", "value": 1}"#,
            "\n\n   \n",
            r#"{"type": "STATE", "value": 2}"#,
            "\n"
        );
        let mut reader = MessageReader::new(input.as_bytes());

        assert!(matches!(reader.next_message().await.unwrap(), Some(Message::State(_))));
        assert!(matches!(reader.next_message().await.unwrap(), Some(Message::State(_))));
        assert!(reader.next_message().await.unwrap().is_none());
        assert_eq!(reader.line_number(), 4);
    }

    #[tokio::test]
    async fn test_malformed_line_names_its_number() {
        let input = "{\"type\": \"STATE\", \"value\": 1}\n{not json\n";
        let mut reader = MessageReader::new(input.as_bytes());

        reader.next_message().await.unwrap();
        let err = reader.next_message().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
        assert!(err.detail().unwrap().starts_with("line 2:"));
    }
}
