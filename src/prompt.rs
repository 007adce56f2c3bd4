//! Role-defining instructions for the research stages, and prompt rendering.

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// Topics offered when the caller has none in mind.
pub const DEFAULT_TOPICS: &[&str] = &[
    "Agentic AI",
    "Large Language Models",
    "Machine Learning",
    "Deep Learning",
    "Natural Language Processing",
];

/// Number of papers the producer is asked for.
pub const PAPERS_PER_TOPIC: usize = 5;

/// User-message template of the producer stage.
pub const PRODUCER_TASK_TEMPLATE: &str = "Research and summarize recent papers on '{input}'.";

/// User-message template of the consumer stage.
pub const CONSUMER_TASK_TEMPLATE: &str = "{input}";

/// System instruction of the paper-discovery stage.
pub const PRODUCER_INSTRUCTION: &str = "You are an expert academic researcher. \
When given a research topic, you must:\n\
1. Extract only the topic itself, ignoring surrounding phrasing such as 'Research and summarize'\n\
2. Decide on the best arXiv query for that topic\n\
3. Find the 5 most relevant and recent papers\n\
4. Describe each paper as a JSON object with the fields: title, authors (a list of names), abstract, arxiv_url, published (YYYY-MM-DD)\n\
5. Reply with ONLY a JSON list of those paper objects, nothing else";

/// System instruction of the literature-review stage.
pub const CONSUMER_INSTRUCTION: &str = "You are an expert researcher and technical writer. \
When you receive a JSON list of papers, write a literature review in Markdown:\n\n\
## Structure\n\
1. **Introduction** (2-3 sentences): the research area and why it matters.\n\
2. **Papers** (one section per paper):\n\
   - The title as a link to the paper\n\
   - All authors, comma separated\n\
   - The problem it addresses\n\
   - Its key contributions\n\
   - A short note on its impact\n\n\
3. **Overall Insights** (2-3 paragraphs): common themes, major research directions, and how the papers relate.\n\n\
4. **Future Directions** (2-3 bullet points): open gaps, new opportunities, emerging challenges.\n\n\
## Rules\n\
- Clear, professional language\n\
- Valid Markdown\n\
- Quality over length\n\
- Return ONLY the Markdown review, no JSON";

/// Substitute `{input}` in `template`.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use research_pipeline::prompt::render;
///
/// let result = render("Papers on {input}, as JSON: {{\"title\": ...}}", "agents");
/// assert_eq!(result, r#"Papers on agents, as JSON: {"title": ...}"#);
/// ```
pub fn render(template: &str, input: &str) -> String {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    // Pass 2: substitute the input
    rendered = rendered.replace("{input}", input);

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    rendered
}
