//! Paper-search collaborator and the producer stage built on it.
//!
//! [`PaperSearch`] is the consumed interface of an academic paper index.
//! [`SearchStage`] wraps one as a producer [`Stage`]: it emits the matching
//! papers as a JSON list in the same shape the LLM producer is asked for, so
//! the rest of the pipeline cannot tell the two apart.

pub mod arxiv;

pub use arxiv::ArxivSearch;

use crate::{
    error::Result,
    stage::{BoxFut, Stage, TextStream},
    types::Record,
    PipelineError,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Default number of papers to fetch.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Upper bound on `max_results`.
pub const MAX_RESULTS_LIMIT: usize = 20;

/// Field the index sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortCriterion {
    #[default]
    Relevance,
    SubmittedDate,
    LastUpdatedDate,
}

impl SortCriterion {
    pub fn as_str(self) -> &'static str {
        match self {
            SortCriterion::Relevance => "relevance",
            SortCriterion::SubmittedDate => "submittedDate",
            SortCriterion::LastUpdatedDate => "lastUpdatedDate",
        }
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    query: String,
    max_results: usize,
    sort_by: SortCriterion,
    sort_order: SortOrder,
}

impl SearchQuery {
    /// A relevance-sorted query for [`DEFAULT_MAX_RESULTS`] papers.
    ///
    /// Fails with [`PipelineError::InvalidInput`] when `query` is blank.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into().trim().to_string();
        if query.is_empty() {
            return Err(PipelineError::InvalidInput(
                "search query must not be empty".to_string(),
            ));
        }
        Ok(Self {
            query,
            max_results: DEFAULT_MAX_RESULTS,
            sort_by: SortCriterion::default(),
            sort_order: SortOrder::default(),
        })
    }

    /// Clamped to `1..=MAX_RESULTS_LIMIT`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    pub fn with_sort(mut self, sort_by: SortCriterion, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn sort_by(&self) -> SortCriterion {
        self.sort_by
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }
}

/// An academic paper index.
#[async_trait]
pub trait PaperSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Producer stage that answers a topic with search results.
pub struct SearchStage {
    name: String,
    search: Arc<dyn PaperSearch>,
    max_results: usize,
    sort_by: SortCriterion,
    sort_order: SortOrder,
}

impl fmt::Debug for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchStage")
            .field("name", &self.name)
            .field("search", &self.search.name())
            .field("max_results", &self.max_results)
            .field("sort_by", &self.sort_by)
            .field("sort_order", &self.sort_order)
            .finish()
    }
}

impl SearchStage {
    pub fn new(name: impl Into<String>, search: Arc<dyn PaperSearch>) -> Self {
        Self {
            name: name.into(),
            search,
            max_results: DEFAULT_MAX_RESULTS,
            sort_by: SortCriterion::default(),
            sort_order: SortOrder::default(),
        }
    }

    /// Clamped to `1..=MAX_RESULTS_LIMIT`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    pub fn with_sort(mut self, sort_by: SortCriterion, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }
}

impl Stage for SearchStage {
    fn kind(&self) -> &'static str {
        "search"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, input: String) -> BoxFut<'static, Result<TextStream>> {
        let search = Arc::clone(&self.search);
        let query = SearchQuery::new(input).map(|q| {
            q.with_max_results(self.max_results)
                .with_sort(self.sort_by, self.sort_order)
        });

        Box::pin(async move {
            let query = query?;
            tracing::debug!(
                search = search.name(),
                query = %query.query(),
                max_results = query.max_results(),
                "searching papers"
            );
            let records = search.search(&query).await?;
            tracing::info!(search = search.name(), found = records.len(), "search complete");
            let json = records_json(&records)?;
            let stream: TextStream = futures::stream::iter(vec![Ok(json)]).boxed();
            Ok(stream)
        })
    }
}

/// Compact JSON with every `]` inside a string written as `\u005d`.
///
/// The record decoder ends the list at the first `}` + `]` it sees, so no
/// string value may contain a raw `]`.
struct BracketEscaping;

impl serde_json::ser::Formatter for BracketEscaping {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut parts = fragment.split(']');
        if let Some(first) = parts.next() {
            writer.write_all(first.as_bytes())?;
        }
        for part in parts {
            writer.write_all(b"\\u005d")?;
            writer.write_all(part.as_bytes())?;
        }
        Ok(())
    }
}

fn records_json(records: &[Record]) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, BracketEscaping);
    records.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| PipelineError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_parser::decode_records;
    use std::sync::Mutex;

    struct FakeSearch {
        records: Vec<Record>,
        seen: Mutex<Vec<SearchQuery>>,
    }

    #[async_trait]
    impl PaperSearch for FakeSearch {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(self.records.iter().take(query.max_results()).cloned().collect())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn paper(title: &str) -> Record {
        Record {
            title: title.into(),
            authors: vec!["Ada".into(), "Alan".into()],
            summary: format!("About {}", title),
            source_url: format!("http://arxiv.org/abs/{}", title),
            published_date: "2024-05-01".into(),
        }
    }

    #[test]
    fn test_query_validation_and_clamping() {
        assert!(matches!(SearchQuery::new("   "), Err(PipelineError::InvalidInput(_))));

        let q = SearchQuery::new("  agents ").unwrap().with_max_results(100);
        assert_eq!(q.query(), "agents");
        assert_eq!(q.max_results(), MAX_RESULTS_LIMIT);
        assert_eq!(q.with_max_results(0).max_results(), 1);
    }

    #[test]
    fn test_sort_tags() {
        assert_eq!(SortCriterion::SubmittedDate.to_string(), "submittedDate");
        assert_eq!(SortCriterion::default(), SortCriterion::Relevance);
        assert_eq!(SortOrder::default().as_str(), "descending");
    }

    #[tokio::test]
    async fn test_search_stage_output_decodes_to_records() {
        let fake = Arc::new(FakeSearch {
            records: vec![paper("A"), paper("B"), paper("C")],
            seen: Mutex::new(Vec::new()),
        });
        let stage = SearchStage::new("papers", fake.clone())
            .with_max_results(2)
            .with_sort(SortCriterion::SubmittedDate, SortOrder::Ascending);

        let text: Vec<String> = stage
            .open("agents".to_string())
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        let joined = text.concat();

        let records = decode_records(&joined).unwrap();
        assert_eq!(records.titles(), vec!["A", "B"]);
        assert_eq!(records[0].authors, vec!["Ada", "Alan"]);

        let seen = fake.seen.lock().unwrap();
        assert_eq!(seen[0].query(), "agents");
        assert_eq!(seen[0].sort_by(), SortCriterion::SubmittedDate);
        assert_eq!(seen[0].sort_order(), SortOrder::Ascending);
    }

    #[tokio::test]
    async fn test_search_stage_output_survives_brackets_in_text() {
        let mut tricky = paper("Bounds on $[\\mathbf{x}]$ for agents");
        tricky.summary = "We bound {f}] and g[0]}  ] in closed form.".into();
        let fake = Arc::new(FakeSearch {
            records: vec![tricky.clone(), paper("Plain")],
            seen: Mutex::new(Vec::new()),
        });
        let stage = SearchStage::new("papers", fake);

        let text: Vec<String> = stage
            .open("bounds".to_string())
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        let joined = text.concat();

        assert!(!joined.contains("}]\""));
        assert!(joined.ends_with("}]"));

        let records = decode_records(&joined).expect("list decodes in full");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], tricky);
        assert_eq!(records[1].title, "Plain");
    }

    #[test]
    fn test_records_json_keeps_structure() {
        let json = records_json(&[paper("x]y")]).unwrap();
        assert!(json.starts_with("[{"));
        assert!(json.contains(r#""x\u005dy""#));
        assert_eq!(json.matches(']').count(), 2);

        let back: Vec<Record> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0].title, "x]y");
        assert_eq!(back[0].source_url, "http://arxiv.org/abs/x]y");
    }

    #[tokio::test]
    async fn test_search_stage_blank_input() {
        let fake = Arc::new(FakeSearch {
            records: vec![],
            seen: Mutex::new(Vec::new()),
        });
        let stage = SearchStage::new("papers", fake.clone());
        let result = stage.open(" ".to_string()).await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert!(fake.seen.lock().unwrap().is_empty());
    }
}
