//! Streaming decoder for the chat endpoint's server-sent-event wire format.
//!
//! Records are blank-line delimited, each optionally prefixed with an
//! `event: <type>` line followed by one or more `data: <json>` lines. The
//! decoder is a plain buffer/split state machine producing a finite,
//! non-restartable sequence of frames; the typed layer below it maps frames
//! to chat events and skips anything malformed.

use crate::model::{ChatEnvelope, RouteDecision, ToolCallRecord};

/// One complete `event:`/`data:` record off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Default)]
pub struct SseDecoder {
    buf: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte chunk, returning every frame completed by it. Partial
    /// trailing lines stay buffered until the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(frame) = self.flush() {
                    frames.push(frame);
                }
            } else if let Some(rest) = line.strip_prefix("event:") {
                self.event = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.trim().to_string());
            }
            // Comment lines and unknown fields are ignored per the format.
        }
        frames
    }

    /// Flushes any record still pending when the stream closes.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.flush()
    }

    fn flush(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let frame = SseFrame {
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(frame)
    }
}

/// Typed chat event decoded from a frame. Only the five named event types
/// are acted on; `message` and unknown types are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Text(String),
    Routed(RouteDecision),
    ToolStart { name: String, id: String },
    ToolResult { id: String, success: bool },
    Error(String),
    Done { cost_usd: Option<f64> },
}

impl ChatEvent {
    /// Returns `None` for ignored event types and for malformed JSON
    /// payloads; neither is fatal to the stream.
    pub fn from_frame(frame: &SseFrame) -> Option<ChatEvent> {
        let payload: serde_json::Value = serde_json::from_str(&frame.data).ok()?;
        match frame.event.as_str() {
            "text" => payload
                .get("text")
                .and_then(|v| v.as_str())
                .map(|s| ChatEvent::Text(s.to_string())),
            "routed" => {
                let category = payload.get("category")?.as_str()?.to_string();
                Some(ChatEvent::Routed(RouteDecision {
                    category,
                    tier: payload
                        .get("tier")
                        .and_then(|v| v.as_str())
                        .map(String::from),
                    tools_considered: payload
                        .get("tools_considered")
                        .and_then(|v| v.as_array())
                        .map(|a| {
                            a.iter()
                                .filter_map(|v| v.as_str().map(String::from))
                                .collect()
                        })
                        .unwrap_or_default(),
                }))
            }
            "tool_start" => {
                let name = payload.get("name")?.as_str()?.to_string();
                let id = payload.get("id")?.as_str()?.to_string();
                Some(ChatEvent::ToolStart { name, id })
            }
            "tool_result" => {
                let id = payload.get("id")?.as_str()?.to_string();
                let success = payload
                    .get("success")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                Some(ChatEvent::ToolResult { id, success })
            }
            "error" => payload
                .get("message")
                .and_then(|v| v.as_str())
                .map(|s| ChatEvent::Error(s.to_string())),
            "done" => Some(ChatEvent::Done {
                cost_usd: payload.get("cost_usd").and_then(|v| v.as_f64()),
            }),
            _ => None,
        }
    }
}

/// Folds one event into the accumulating envelope. `tool_result` marks a
/// previously started call by matching its identifier; an unmatched result
/// is dropped.
pub fn apply_event(env: &mut ChatEnvelope, event: ChatEvent) {
    match event {
        ChatEvent::Text(chunk) => env.text.push_str(&chunk),
        ChatEvent::Routed(decision) => env.route = Some(decision),
        ChatEvent::ToolStart { name, id } => env.tool_calls.push(ToolCallRecord {
            name,
            id,
            success: None,
        }),
        ChatEvent::ToolResult { id, success } => {
            if let Some(call) = env.tool_calls.iter_mut().find(|t| t.id == id) {
                call.success = Some(success);
            }
        }
        ChatEvent::Error(message) => env.error = Some(message),
        ChatEvent::Done { cost_usd } => env.cost_usd = cost_usd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_from(dec: &mut SseDecoder, s: &str) -> Vec<SseFrame> {
        dec.feed(s.as_bytes())
    }

    #[test]
    fn test_decoder_splits_records_on_blank_lines() {
        let mut dec = SseDecoder::new();
        let frames = frames_from(
            &mut dec,
            "event: text\ndata: {\"text\":\"Hi\"}\n\nevent: done\ndata: {}\n\n",
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "text");
        assert_eq!(frames[1].event, "done");
    }

    #[test]
    fn test_decoder_buffers_partial_lines_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(frames_from(&mut dec, "event: te").is_empty());
        assert!(frames_from(&mut dec, "xt\ndata: {\"text\":").is_empty());
        let frames = frames_from(&mut dec, "\"split\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"text\":\"split\"}");
    }

    #[test]
    fn test_decoder_defaults_event_type_to_message() {
        let mut dec = SseDecoder::new();
        let frames = frames_from(&mut dec, "data: {\"x\":1}\n\n");
        assert_eq!(frames[0].event, "message");
        // The typed layer ignores it.
        assert_eq!(ChatEvent::from_frame(&frames[0]), None);
    }

    #[test]
    fn test_decoder_handles_crlf() {
        let mut dec = SseDecoder::new();
        let frames = frames_from(&mut dec, "event: text\r\ndata: {\"text\":\"a\"}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "text");
    }

    #[test]
    fn test_finish_flushes_unterminated_record() {
        let mut dec = SseDecoder::new();
        assert!(frames_from(&mut dec, "event: error\ndata: {\"message\":\"boom\"}\n").is_empty());
        let frame = dec.finish().expect("pending record flushed at EOF");
        assert_eq!(frame.event, "error");
    }

    #[test]
    fn test_malformed_json_is_skipped_not_fatal() {
        let frame = SseFrame {
            event: "text".into(),
            data: "{not json".into(),
        };
        assert_eq!(ChatEvent::from_frame(&frame), None);
    }

    #[test]
    fn test_tool_result_matches_started_call_by_id() {
        let mut env = ChatEnvelope::default();
        apply_event(
            &mut env,
            ChatEvent::ToolStart {
                name: "search_listings".into(),
                id: "t1".into(),
            },
        );
        apply_event(
            &mut env,
            ChatEvent::ToolStart {
                name: "get_listing".into(),
                id: "t2".into(),
            },
        );
        apply_event(
            &mut env,
            ChatEvent::ToolResult {
                id: "t2".into(),
                success: true,
            },
        );
        assert_eq!(env.tool_calls[0].success, None);
        assert_eq!(env.tool_calls[1].success, Some(true));
    }

    #[test]
    fn test_envelope_accumulates_text_and_route() {
        let mut env = ChatEnvelope::default();
        apply_event(&mut env, ChatEvent::Text("Hello ".into()));
        apply_event(&mut env, ChatEvent::Text("world".into()));
        apply_event(
            &mut env,
            ChatEvent::Routed(RouteDecision {
                category: "search".into(),
                tier: Some("fast".into()),
                tools_considered: vec!["search_listings".into()],
            }),
        );
        apply_event(&mut env, ChatEvent::Done { cost_usd: Some(0.002) });
        assert_eq!(env.text, "Hello world");
        assert_eq!(env.route.as_ref().unwrap().category, "search");
        assert_eq!(env.cost_usd, Some(0.002));
    }
}
