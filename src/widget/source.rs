//! Widget event sources

use crate::widget::events::WidgetEvent;
use crate::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Split};
use tracing::warn;

/// Reads newline-delimited JSON widget events
///
/// The embedding page forwards each widget callback as one JSON object per
/// line. Blank lines are skipped. Lines that are not UTF-8 or not a widget
/// event are logged and skipped.
pub struct JsonLinesSource<R> {
    lines: Split<R>,
    line_number: usize,
    skipped: usize,
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            line_number: 0,
            skipped: 0,
        }
    }

    /// Next well-formed event, or `None` at end of input
    pub async fn next_event(&mut self) -> Result<Option<WidgetEvent>> {
        while let Some(raw) = self.lines.next_segment().await? {
            self.line_number += 1;

            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    self.skipped += 1;
                    warn!("Skipping non UTF-8 widget event on line {}: {}", self.line_number, e);
                    continue;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<WidgetEvent>(line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped += 1;
                    warn!("Skipping malformed widget event on line {}: {}", self.line_number, e);
                }
            }
        }

        Ok(None)
    }

    /// Number of undecodable lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_reads_events_and_skips_garbage() {
        let input = concat!(
            r#"{"type":"message_received","detail":{"type":"SEND_MESSAGE","payload":{"text":"one"}}}"#,
            "\n",
            "\n",
            "not json\n",
            r#"{"type":"widget_opened"}"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()));

        let first = source.next_event().await.unwrap().unwrap();
        assert_eq!(first.message_text(), Some("one"));

        let second = source.next_event().await.unwrap().unwrap();
        assert_eq!(second.kind, "widget_opened");
        assert_eq!(source.skipped(), 1);

        assert!(source.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut input: Vec<u8> = b"\xff\xfe garbage\r\n".to_vec();
        input.extend_from_slice(
            br#"{"type":"message_received","detail":{"type":"SEND_MESSAGE","payload":{"text":"after"}}}"#,
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_slice()));

        let event = source.next_event().await.unwrap().unwrap();
        assert_eq!(event.message_text(), Some("after"));
        assert_eq!(source.skipped(), 1);

        assert!(source.next_event().await.unwrap().is_none());
    }
}
