//! Server-sent-event plumbing for the streaming path.
//!
//! Upstream chunks are not guaranteed to land on line boundaries, so a line
//! buffer reassembles SSE lines before rewriting. Only `data: ` lines whose
//! payload parses as JSON are touched: their `model` field (top-level, or
//! `message.model` inside an Anthropic `message_start` event) is replaced by
//! the requested virtual model so the concrete upstream identity stays
//! hidden. Everything else — `data: [DONE]`, `event:` lines, comments, blank
//! separators, unparseable payloads — passes through byte-for-byte.

use bytes::Bytes;

/// SSE comment frame sent downstream whenever the upstream goes quiet.
pub const HEARTBEAT_FRAME: &[u8] = b": heartbeat\n\n";

/// Final SSE event carrying a JSON error envelope, emitted when a stream
/// fails after data already reached the client.
pub fn error_event(message: &str) -> Bytes {
    let payload = serde_json::json!({
        "error": {
            "message": message,
            "type": "upstream_error",
        }
    });
    Bytes::from(format!("data: {}\n\n", payload))
}

/// Line-buffered rewriter for one upstream SSE stream.
pub struct SseRewriter {
    virtual_model: String,
    buf: String,
}

impl SseRewriter {
    pub fn new(virtual_model: impl Into<String>) -> Self {
        Self {
            virtual_model: virtual_model.into(),
            buf: String::new(),
        }
    }

    /// Feed one upstream chunk and get back the bytes ready to forward.
    /// Incomplete trailing lines are held until the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Bytes {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut out = String::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            // Drop the terminator (and any \r) for processing, restore after.
            let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
            let ending = &line[trimmed.len()..];
            out.push_str(&self.rewrite_line(trimmed));
            out.push_str(ending);
        }
        Bytes::from(out)
    }

    /// Flush whatever partial line remains at end of stream.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(Bytes::from(self.rewrite_line(&rest)))
    }

    fn rewrite_line(&self, line: &str) -> String {
        let Some(payload) = line.strip_prefix("data: ") else {
            return line.to_string();
        };
        if payload.trim() == "[DONE]" {
            return line.to_string();
        }

        let Ok(mut data) = serde_json::from_str::<serde_json::Value>(payload) else {
            return line.to_string();
        };

        let mut changed = false;

        // OpenAI-style chunks carry a top-level model field.
        if let Some(model) = data.get_mut("model") {
            if model.is_string() {
                *model = serde_json::Value::String(self.virtual_model.clone());
                changed = true;
            }
        }

        // Anthropic message_start events nest it under the message envelope.
        if data.get("type").and_then(|t| t.as_str()) == Some("message_start") {
            if let Some(model) = data
                .get_mut("message")
                .and_then(|m| m.get_mut("model"))
            {
                if model.is_string() {
                    *model = serde_json::Value::String(self.virtual_model.clone());
                    changed = true;
                }
            }
        }

        if changed {
            format!("data: {}", data)
        } else {
            line.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(rw: &mut SseRewriter, chunk: &str) -> String {
        String::from_utf8(rw.feed(chunk.as_bytes()).to_vec()).unwrap()
    }

    #[test]
    fn test_rewrites_openai_chunk_model() {
        let mut rw = SseRewriter::new("sonnet");
        let out = feed_str(
            &mut rw,
            "data: {\"id\":\"c1\",\"model\":\"gpt-4o-mini\",\"choices\":[]}\n\n",
        );
        let payload: serde_json::Value =
            serde_json::from_str(out.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(payload["model"], "sonnet");
    }

    #[test]
    fn test_rewrites_anthropic_message_start() {
        let mut rw = SseRewriter::new("sonnet");
        let out = feed_str(
            &mut rw,
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"model\":\"claude-3-5-haiku\"}}\n\n",
        );
        assert!(out.starts_with("event: message_start\n"));
        let data_line = out.lines().find(|l| l.starts_with("data: ")).unwrap();
        let payload: serde_json::Value =
            serde_json::from_str(data_line.trim_start_matches("data: ")).unwrap();
        assert_eq!(payload["message"]["model"], "sonnet");
    }

    #[test]
    fn test_done_sentinel_passes_through() {
        let mut rw = SseRewriter::new("sonnet");
        assert_eq!(feed_str(&mut rw, "data: [DONE]\n\n"), "data: [DONE]\n\n");
    }

    #[test]
    fn test_non_json_and_comment_lines_pass_through() {
        let mut rw = SseRewriter::new("sonnet");
        assert_eq!(feed_str(&mut rw, ": ping\n\n"), ": ping\n\n");
        assert_eq!(
            feed_str(&mut rw, "data: not json at all\n"),
            "data: not json at all\n"
        );
        assert_eq!(feed_str(&mut rw, "event: ping\n"), "event: ping\n");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut rw = SseRewriter::new("sonnet");
        let first = feed_str(&mut rw, "data: {\"model\":\"gpt-4o\"}\n");
        let mut rw2 = SseRewriter::new("sonnet");
        let second = feed_str(&mut rw2, &first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_line_split_across_chunks_is_reassembled() {
        let mut rw = SseRewriter::new("sonnet");
        let first = feed_str(&mut rw, "data: {\"model\":\"gpt");
        assert!(first.is_empty());

        let rest = feed_str(&mut rw, "-4o\",\"choices\":[]}\n");
        let payload: serde_json::Value =
            serde_json::from_str(rest.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(payload["model"], "sonnet");
    }

    #[test]
    fn test_crlf_lines_keep_their_ending() {
        let mut rw = SseRewriter::new("sonnet");
        let out = feed_str(&mut rw, "data: {\"model\":\"gpt-4o\"}\r\n");
        assert!(out.ends_with("\r\n"));
        assert!(out.contains("sonnet"));
    }

    #[test]
    fn test_finish_flushes_trailing_partial_line() {
        let mut rw = SseRewriter::new("sonnet");
        feed_str(&mut rw, "data: [DO");
        let tail = rw.finish().unwrap();
        assert_eq!(&tail[..], b"data: [DO");
        assert!(rw.finish().is_none());
    }

    #[test]
    fn test_error_event_shape() {
        let frame = error_event("connection reset");
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));
        let payload: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(payload["error"]["type"], "upstream_error");
        assert_eq!(payload["error"]["message"], "connection reset");
    }
}
