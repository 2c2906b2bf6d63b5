//! Server-Sent Events decoding for the streamed Responses API
//!
//! The API sends one JSON payload per event, each preceded by an `event:`
//! line naming its type:
//!
//! ```text
//! event: response.output_text.delta
//! data: {"type":"response.output_text.delta","delta":"Hel"}
//!
//! ```

/// One complete SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the server sent one
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Incremental SSE parser
///
/// Bytes may be split anywhere, including inside a multi-byte character or
/// in the middle of a line. Frames are emitted once their terminating blank
/// line arrives; `finish()` flushes a trailing frame with no blank line.
///
/// # Example
/// ```
/// use chatdeck::llm::streaming::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"event: ping\ndata: {\"a\"").is_empty());
///
/// let frames = decoder.push(b":1}\n\n");
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].event.as_deref(), Some("ping"));
/// assert_eq!(frames[0].data, "{\"a\":1}");
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    bytes: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.bytes.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.bytes.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.bytes.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(frame) = self.take_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is buffered when the connection closes
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let rest = std::mem::take(&mut self.bytes);
        let mut frames = Vec::new();

        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if let Some(frame) = self.take_line(&line) {
                frames.push(frame);
            }
        }
        if let Some(frame) = self.dispatch() {
            frames.push(frame);
        }
        frames
    }

    fn take_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry are not used by this client
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: &str) -> SseFrame {
        SseFrame {
            event: event.map(str::to_string),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_single_complete_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: response.created\ndata: {\"x\":1}\n\n");
        assert_eq!(frames, vec![frame(Some("response.created"), "{\"x\":1}")]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(frames, vec![frame(None, "{\"a\":1}"), frame(None, "{\"b\":2}")]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: response.output_").is_empty());
        assert!(decoder.push(b"text.delta\ndata: {\"delta\":\"hel").is_empty());
        let frames = decoder.push(b"lo\"}\n\n");
        assert_eq!(
            frames,
            vec![frame(Some("response.output_text.delta"), "{\"delta\":\"hello\"}")]
        );
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: 🎨\n\n".as_bytes();
        // Split inside the four-byte emoji
        assert!(decoder.push(&bytes[..8]).is_empty());
        let frames = decoder.push(&bytes[8..]);
        assert_eq!(frames, vec![frame(None, "🎨")]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: e\r\ndata: 1\r\n\r\n");
        assert_eq!(frames, vec![frame(Some("e"), "1")]);
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: line one\ndata: line two\n\n");
        assert_eq!(frames, vec![frame(None, "line one\nline two")]);
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\nid: 7\nretry: 100\ndata: {}\n\n");
        assert_eq!(frames, vec![frame(None, "{}")]);
    }

    #[test]
    fn test_event_without_data_is_dropped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: lonely\n\ndata: x\n\n");
        // The name does not leak into the next frame
        assert_eq!(frames, vec![frame(None, "x")]);
    }

    #[test]
    fn test_finish_flushes_trailing_frame() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: {\"a\":1}\n\n").len(), 1);
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![frame(None, "[DONE]")]);
        assert!(decoder.finish().is_empty());
    }
}
