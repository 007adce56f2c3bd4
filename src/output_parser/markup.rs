//! XML-style tag extraction for search feeds.
//!
//! Lightweight tag matching, NOT a full XML parser: enough to read the flat,
//! well-known element layout of an Atom feed. Nested elements with the same
//! name are not supported.

/// Bodies of every `<tag>...</tag>` element in `doc`, in document order.
///
/// Opening tags may carry attributes (`<title type="text">`). Self-closing
/// elements and elements without a closing tag are skipped.
///
/// # Examples
///
/// ```
/// use research_pipeline::output_parser::markup::tag_blocks;
///
/// let doc = "<feed><entry>one</entry><entry id=\"2\">two</entry></feed>";
/// assert_eq!(tag_blocks(doc, "entry"), vec!["one", "two"]);
/// ```
pub fn tag_blocks<'a>(doc: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut from = 0;

    while let Some(offset) = doc[from..].find(&open) {
        let name_end = from + offset + open.len();
        let rest = &doc[name_end..];

        // `<entry` must not match `<entrypoint`.
        let boundary = rest.chars().next();
        if !matches!(boundary, Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r')) {
            from = name_end;
            continue;
        }

        let Some(gt) = rest.find('>') else { break };
        let head_end = name_end + gt;
        if doc[..head_end].ends_with('/') {
            from = head_end + 1;
            continue;
        }

        let body_start = head_end + 1;
        match doc[body_start..].find(&close) {
            Some(len) => {
                blocks.push(&doc[body_start..body_start + len]);
                from = body_start + len + close.len();
            }
            None => break,
        }
    }

    blocks
}

/// Text of the first `<tag>` element in `doc`: entities decoded, whitespace collapsed.
pub fn tag_text(doc: &str, tag: &str) -> Option<String> {
    tag_blocks(doc, tag)
        .first()
        .map(|body| collapse_whitespace(&decode_entities(body)))
}

/// Replace every run of whitespace (including newlines) with one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the five predefined XML entities.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
