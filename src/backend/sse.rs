//! SSE (Server-Sent Events) frame decoder for OpenAI-compatible chat streams.
//!
//! Handles the `data: ` prefix, `[DONE]` termination, line buffering across
//! TCP chunk boundaries, empty keep-alive lines, and in-band error payloads.

use serde_json::Value;

/// One meaningful event from a chat-completions stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A non-empty content delta.
    Delta(String),
    /// The `data: [DONE]` terminator.
    Done,
    /// An `{"error": ...}` payload sent instead of a delta.
    Error(String),
}

/// Incremental decoder from raw response bytes to [`SseFrame`]s.
///
/// # Example
///
/// ```
/// use research_pipeline::backend::sse::{SseDecoder, SseFrame};
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let frames = decoder.decode(data);
/// assert_eq!(frames, vec![SseFrame::Delta("Hello".into()), SseFrame::Done]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    // Raw bytes, so a multi-byte character split across chunks survives.
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the frames completed by them.
    ///
    /// An incomplete trailing line stays buffered until the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            frames.extend(frame_from_line(&String::from_utf8_lossy(&line)));
        }
        frames
    }

    /// Decode whatever is left in the buffer (a final line without newline).
    pub fn flush(&mut self) -> Vec<SseFrame> {
        let remaining = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&remaining)
            .lines()
            .filter_map(frame_from_line)
            .collect()
    }
}

fn frame_from_line(line: &str) -> Option<SseFrame> {
    let line = line.trim();
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?
        .trim();

    if data == "[DONE]" {
        return Some(SseFrame::Done);
    }

    let value: Value = serde_json::from_str(data).ok()?;

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Some(SseFrame::Error(message));
    }

    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(|content| SseFrame::Delta(content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> SseFrame {
        SseFrame::Delta(text.to_string())
    }

    #[test]
    fn test_sse_basic_decode() {
        let mut decoder = SseDecoder::new();
        let chunk = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n";
        assert_eq!(decoder.decode(chunk), vec![delta("Hello")]);
    }

    #[test]
    fn test_sse_done_reported() {
        let mut decoder = SseDecoder::new();
        let chunk = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
        assert_eq!(decoder.decode(chunk), vec![delta("Hi"), SseFrame::Done]);
    }

    #[test]
    fn test_sse_keepalive_and_event_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let chunk = b"\n\n: keep-alive\nevent: message\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n";
        assert_eq!(decoder.decode(chunk), vec![delta("x")]);
    }

    #[test]
    fn test_sse_role_only_and_empty_deltas_skipped() {
        let mut decoder = SseDecoder::new();
        let chunk = b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"\"},\"finish_reason\":\"stop\"}]}\n\n";
        assert!(decoder.decode(chunk).is_empty());
    }

    #[test]
    fn test_sse_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.decode(b"data: {\"cho").is_empty());
        let frames = decoder.decode(b"ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n");
        assert_eq!(frames, vec![delta("Hi")]);
    }

    #[test]
    fn test_sse_error_payload() {
        let mut decoder = SseDecoder::new();
        let chunk = b"data: {\"error\":{\"message\":\"Rate limit reached\",\"type\":\"requests\"}}\n\n";
        assert_eq!(
            decoder.decode(chunk),
            vec![SseFrame::Error("Rate limit reached".into())]
        );
    }

    #[test]
    fn test_sse_flush_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder
            .decode(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .is_empty());
        assert_eq!(decoder.flush(), vec![delta("tail")]);
        assert!(decoder.flush().is_empty());
    }

    #[test]
    fn test_sse_multibyte_content() {
        let mut decoder = SseDecoder::new();
        let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"résumé\"}}]}\n".as_bytes();
        assert_eq!(decoder.decode(chunk), vec![delta("résumé")]);
    }

    #[test]
    fn test_sse_multibyte_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"é\"}}]}\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(decoder.decode(&line[..split]).is_empty());
        assert_eq!(decoder.decode(&line[split..]), vec![delta("é")]);
    }
}
