//! Streaming Support
//!
//! Server-Sent Events decoding for streamed chat completions.

use crate::error::{ChatError, Result};
use bytes::{Buf, BytesMut};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "data: [DONE]";

/// A streaming chunk from the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub created: Option<u64>,

    #[serde(default)]
    pub object: Option<String>,

    /// Empty on Azure's leading content-filter chunk
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,

    #[serde(default)]
    pub delta: Option<StreamDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content in a streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Text carried by the first choice, if any and non-empty
    pub fn fragment(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

/// Classification of one line of an event stream
#[derive(Debug)]
pub enum SseFrame {
    /// `data: {...}` decoded into a chunk
    Data(StreamChunk),

    /// `data: [DONE]`
    Done,

    /// Anything else (blank lines, comments, `event:`/`id:` fields)
    Skip,
}

/// Parse one SSE line.
///
/// Only an exact `data: ` prefix counts; a payload that fails to decode is a
/// [`ChatError::Stream`].
pub fn parse_sse_line(line: &str) -> Result<SseFrame> {
    if line.starts_with(DONE_SENTINEL) {
        return Ok(SseFrame::Done);
    }

    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(SseFrame::Skip);
    };

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        ChatError::Stream(format!("Failed to parse SSE chunk: {}. Data: {}", e, data))
    })?;

    Ok(SseFrame::Data(chunk))
}

/// Split a byte stream into text lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. A final line without a
/// terminator is yielded at end of input. The first read error ends the
/// stream after being yielded.
pub fn sse_lines<S, B, E>(body: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
{
    async_stream::stream! {
        let mut body = std::pin::pin!(body);
        let mut buffer = BytesMut::new();
        // bytes before this offset hold no newline
        let mut scanned = 0;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => buffer.extend_from_slice(bytes.as_ref()),
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }

            while let Some(pos) = buffer[scanned..].iter().position(|&b| b == b'\n') {
                let line = buffer.split_to(scanned + pos);
                buffer.advance(1);
                scanned = 0;
                yield Ok(decode_line(&line));
            }
            scanned = buffer.len();
        }

        if !buffer.is_empty() {
            yield Ok(decode_line(&buffer));
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_parse_sse_line() {
        let line = r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1677652288,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;

        match parse_sse_line(line).unwrap() {
            SseFrame::Data(chunk) => {
                assert_eq!(chunk.id.as_deref(), Some("chatcmpl-123"));
                assert_eq!(chunk.fragment(), Some("Hello"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sse_done() {
        assert!(matches!(parse_sse_line("data: [DONE]").unwrap(), SseFrame::Done));
    }

    #[test]
    fn test_parse_sse_ignores_other_lines() {
        for line in ["", ": keep-alive", "event: message", "id: 7", "data:{}"] {
            assert!(matches!(parse_sse_line(line).unwrap(), SseFrame::Skip), "{line}");
        }
    }

    #[test]
    fn test_parse_sse_malformed() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            Err(ChatError::Stream(_))
        ));
    }

    #[test]
    fn test_fragment_suppresses_empty_and_missing() {
        let empty = r#"{"choices":[{"delta":{"content":""}}]}"#;
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        let filter_only = r#"{"choices":[],"prompt_filter_results":[{"prompt_index":0}]}"#;

        for json in [empty, role_only, filter_only] {
            let chunk: StreamChunk = serde_json::from_str(json).unwrap();
            assert_eq!(chunk.fragment(), None, "{json}");
        }
    }

    #[tokio::test]
    async fn test_sse_lines_across_chunk_boundaries() {
        let parts: Vec<std::result::Result<&[u8], ChatError>> = vec![
            Ok(b"data: a\r\nda".as_slice()),
            Ok(b"ta: b\n\ndata: ".as_slice()),
            Ok(b"tail".as_slice()),
        ];

        let lines: Vec<String> = sse_lines(stream::iter(parts))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["data: a", "data: b", "", "data: tail"]);
    }

    #[tokio::test]
    async fn test_sse_lines_byte_at_a_time() {
        let long = format!("data: {}", "x".repeat(64 * 1024));
        let body = format!("{long}\r\nshort\n{long}");
        let parts = body
            .bytes()
            .map(|b| Ok::<_, ChatError>([b]))
            .collect::<Vec<_>>();

        let lines: Vec<String> = sse_lines(stream::iter(parts))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec![long.clone(), "short".to_string(), long]);
    }

    #[tokio::test]
    async fn test_sse_lines_stops_on_error() {
        let parts: Vec<std::result::Result<&[u8], ChatError>> = vec![
            Ok(b"one\n".as_slice()),
            Err(ChatError::Stream("reset".into())),
            Ok(b"two\n".as_slice()),
        ];

        let items: Vec<Result<String>> = sse_lines(stream::iter(parts)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "one");
        assert!(items[1].is_err());
    }
}
