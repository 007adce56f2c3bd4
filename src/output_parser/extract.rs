//! Locating the record list inside producer output.

/// Find the first `[ { ... } ]` substring in `text`.
///
/// The match starts at the first `[` whose next non-whitespace character is
/// `{`, and ends at the *nearest* following `]` whose previous
/// non-whitespace character is a `}` lying after that `{`. Newlines are
/// ordinary characters. Only the first candidate is ever returned; callers
/// that fail to parse it do not get a second chance at later fragments.
///
/// # Examples
///
/// ```
/// use research_pipeline::output_parser::find_record_array;
///
/// let text = "Here you go:\n[{\"title\": \"A\"}]\nEnjoy.";
/// assert_eq!(find_record_array(text), Some("[{\"title\": \"A\"}]"));
/// assert_eq!(find_record_array("[1, 2, 3]"), None);
/// ```
pub fn find_record_array(text: &str) -> Option<&str> {
    for (start, _) in text.match_indices('[') {
        let rest = text[start + 1..].trim_start();
        if !rest.starts_with('{') {
            continue;
        }
        let brace = text.len() - rest.len();
        // A later opening can only search a suffix of what this one searched,
        // so if this one has no closing, none does.
        return find_close(text, brace).map(|end| &text[start..end]);
    }
    None
}

/// Byte offset just past the first `}`-then-`]` closing after the `{` at `brace`.
fn find_close(text: &str, brace: usize) -> Option<usize> {
    let body_start = brace + 1;
    text[body_start..]
        .match_indices(']')
        .map(|(offset, _)| body_start + offset)
        .find(|&bracket| text[body_start..bracket].trim_end().ends_with('}'))
        .map(|bracket| bracket + 1)
}
