//! Decoding a [`RecordCollection`] from producer output.

use crate::output_parser::error::{truncate, ParseError};
use crate::output_parser::extract::find_record_array;
use crate::types::RecordCollection;

/// Decode the first record list in `text`, or `None`.
///
/// Never fails: malformed or missing lists yield `None` and the reason is
/// logged at `debug`. Pure function of its input, so repeated calls on the
/// same text agree.
///
/// # Examples
///
/// ```
/// use research_pipeline::output_parser::decode_records;
///
/// let text = r#"Found: [{"title": "A", "arxiv_url": "http://a"}] enjoy"#;
/// let records = decode_records(text).unwrap();
/// assert_eq!(records.titles(), vec!["A"]);
///
/// assert!(decode_records("No papers found for this topic.").is_none());
/// ```
pub fn decode_records(text: &str) -> Option<RecordCollection> {
    match try_decode_records(text) {
        Ok(records) => Some(records),
        Err(e) => {
            tracing::debug!(error = %e, "no record collection in producer output");
            None
        }
    }
}

/// Decode the first record list in `text`, reporting why nothing was found.
///
/// Locates the candidate with [`find_record_array`] and parses it strictly.
/// A candidate that fails to parse is final; later fragments are not tried.
pub fn try_decode_records(text: &str) -> Result<RecordCollection, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let candidate = find_record_array(text).ok_or_else(|| ParseError::NoRecordList {
        text: truncate(text.trim(), 200),
    })?;

    serde_json::from_str::<RecordCollection>(candidate).map_err(|e| {
        ParseError::DeserializationFailed {
            reason: e.to_string(),
            raw_json: truncate(candidate, 200),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PAPERS: &str = "Sure, here are the papers:\n[{\"title\":\"A\",\"authors\":[\"X\"],\"abstract\":\"...\",\"arxiv_url\":\"http://a\",\"published\":\"2024-01-01\"},{\"title\":\"B\",\"authors\":[],\"abstract\":\"\",\"arxiv_url\":\"http://b\",\"published\":\"2024-02-02\"}]\nEnjoy.";

    #[test]
    fn extracts_records_in_array_order() {
        let records = decode_records(TWO_PAPERS).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.titles(), vec!["A", "B"]);
        assert_eq!(records[0].authors, vec!["X"]);
        assert_eq!(records[0].source_url, "http://a");
        assert_eq!(records[1].published_date, "2024-02-02");
        assert!(records.iter().all(|r| !r.title.contains("Enjoy")));
    }

    #[test]
    fn decoding_is_repeatable() {
        assert_eq!(decode_records(TWO_PAPERS), decode_records(TWO_PAPERS));
        let miss = "No papers found for this topic.";
        assert_eq!(decode_records(miss), None);
        assert_eq!(decode_records(miss), decode_records(miss));
    }

    #[test]
    fn prose_only_is_not_found() {
        match try_decode_records("No papers found for this topic.") {
            Err(ParseError::NoRecordList { text }) => {
                assert!(text.starts_with("No papers"))
            }
            other => panic!("Expected NoRecordList, got {:?}", other),
        }
    }

    #[test]
    fn empty_text_is_not_found() {
        assert!(matches!(
            try_decode_records("  \n "),
            Err(ParseError::EmptyResponse)
        ));
    }

    #[test]
    fn malformed_first_candidate_does_not_fall_through() {
        let text = r#"Draft: [{title: A}] Final: [{"title": "B", "arxiv_url": "http://b"}]"#;
        assert!(matches!(
            try_decode_records(text),
            Err(ParseError::DeserializationFailed { .. })
        ));
        assert!(decode_records(text).is_none());
    }

    #[test]
    fn objects_missing_required_fields_are_not_found() {
        let text = r#"[{"name": "not a paper"}]"#;
        assert!(decode_records(text).is_none());
    }

    #[test]
    fn fenced_json_block_is_found() {
        let text = "```json\n[\n  {\"title\": \"Fenced\", \"arxiv_url\": \"http://f\"}\n]\n```\nThat's all.";
        let records = decode_records(text).unwrap();
        assert_eq!(records.titles(), vec!["Fenced"]);
        assert!(records[0].authors.is_empty());
    }

    #[test]
    fn trailing_commentary_is_ignored() {
        let text = r#"[{"title": "A", "arxiv_url": "http://a"}] Let me know if you want more [{"x": 1}]"#;
        let records = decode_records(text).unwrap();
        assert_eq!(records.len(), 1);
    }
}
