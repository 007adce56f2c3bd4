//! Why record decoding came up empty.
//!
//! These never escape as [`PipelineError`](crate::PipelineError)s: a failed
//! decode is a normal outcome, reported only in logs.

/// Reasons [`try_decode_records`](super::try_decode_records) found no collection.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The text was empty or whitespace-only.
    #[error("empty producer output")]
    EmptyResponse,

    /// No `[ { ... } ]` substring anywhere in the text.
    #[error("no record list found in producer output: {text}")]
    NoRecordList {
        /// A truncated copy of the text (max 200 bytes).
        text: String,
    },

    /// A record list was located but did not deserialize.
    #[error("record list failed to deserialize: {reason}")]
    DeserializationFailed {
        /// The serde error message.
        reason: String,
        /// The candidate substring, truncated.
        raw_json: String,
    },
}

/// Truncate a string to at most `max_len` bytes (on a char boundary), appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
