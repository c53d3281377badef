use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None if the line is a keep-alive or non-data line.
pub fn parse_sse_line(line: &str) -> DeskPilotResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let data = if let Some(d) = line.strip_prefix("data:") {
        d.trim()
    } else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| DeskPilotError::SseParsing(e.to_string()))?;

    if let Some(first) = json["choices"].as_array().and_then(|c| c.first()) {
        let delta = &first["delta"];

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                return Ok(Some(StreamChunk {
                    kind: StreamChunkKind::Content,
                    content: content.to_string(),
                }));
            }
        }

        if first["finish_reason"].as_str().is_some() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Done,
                content: String::new(),
            }));
        }
    }

    Ok(None)
}

/// Reassembles SSE lines from raw network chunks. Bytes are buffered until a
/// full line is available, so multi-byte characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Appends `bytes` and returns every line completed by them, trimmed, empty lines dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever is left once the stream ends without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_and_comments_are_skipped() {
        assert!(parse_sse_line("").unwrap().is_none());
        assert!(parse_sse_line(": ping").unwrap().is_none());
        assert!(parse_sse_line("event: message").unwrap().is_none());
    }

    #[test]
    fn content_delta_is_extracted() {
        let line = r#"data: {"choices":[{"delta":{"content":"Step one"},"finish_reason":null}]}"#;
        let chunk = parse_sse_line(line).unwrap().unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Content);
        assert_eq!(chunk.content, "Step one");
    }

    #[test]
    fn reasoning_only_delta_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{"reasoning_content":"hmm","content":""}}]}"#;
        assert!(parse_sse_line(line).unwrap().is_none());
    }

    #[test]
    fn done_marker_and_finish_reason_end_stream() {
        assert_eq!(
            parse_sse_line("data: [DONE]").unwrap().unwrap().kind,
            StreamChunkKind::Done
        );
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line).unwrap().unwrap().kind, StreamChunkKind::Done);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            Err(DeskPilotError::SseParsing(_))
        ));
    }

    #[test]
    fn character_split_across_chunks_survives() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buf = SseLineBuffer::default();
        assert!(buf.push(&line[..split]).is_empty());
        let lines = buf.push(&line[split..]);
        assert_eq!(lines.len(), 1);
        let chunk = parse_sse_line(&lines[0]).unwrap().unwrap();
        assert_eq!(chunk.content, "caf\u{e9}");
        assert!(!chunk.content.contains('\u{FFFD}'));
    }

    #[test]
    fn unterminated_last_line_is_flushed() {
        let mut buf = SseLineBuffer::default();
        let lines = buf.push(b"data: first\r\n\ndata: [DONE]");
        assert_eq!(lines, vec!["data: first".to_string()]);
        assert_eq!(buf.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(buf.finish(), None);
    }
}
