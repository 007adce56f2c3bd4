use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pipeline stage produced a [`Chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The stage that gathers source material (paper discovery).
    Producer,
    /// The stage that writes narrative output from the producer's material.
    Consumer,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Producer => f.write_str("producer"),
            Origin::Consumer => f.write_str("consumer"),
        }
    }
}

/// One unit of incremental output from a stage.
///
/// Concatenating the `text` of every chunk from one stage, in arrival order,
/// reconstitutes that stage's full output. Each stage ends with exactly one
/// chunk whose `is_final` is set; that chunk carries no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub origin: Origin,
    pub text: String,
    pub is_final: bool,
}

impl Chunk {
    /// A text fragment from `origin`.
    pub fn fragment(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            is_final: false,
        }
    }

    /// The end-of-stage marker for `origin`.
    pub fn end_of_stage(origin: Origin) -> Self {
        Self {
            origin,
            text: String::new(),
            is_final: true,
        }
    }
}

/// One retrieved paper.
///
/// Field names on the wire follow the shape the producer is instructed to
/// emit (`arxiv_url`, `published`); the aliases accept the neutral spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(rename = "abstract", default)]
    pub summary: String,

    /// Opaque identifier/URI; never checked for reachability.
    #[serde(
        rename = "arxiv_url",
        alias = "source_url",
        alias = "url",
        alias = "entry_id"
    )]
    pub source_url: String,

    /// ISO-8601 date text, usually `YYYY-MM-DD`.
    #[serde(rename = "published", alias = "published_date", default)]
    pub published_date: String,
}

impl Record {
    /// The publication date, if `published_date` starts with a `YYYY-MM-DD` date.
    pub fn published_on(&self) -> Option<NaiveDate> {
        let head = self.published_date.get(..10)?;
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }

    /// First `limit` authors joined by commas, with a `+N more` suffix when truncated.
    pub fn author_line(&self, limit: usize) -> String {
        let shown = self
            .authors
            .iter()
            .take(limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > limit {
            format!("{}, +{} more", shown, self.authors.len() - limit)
        } else {
            shown
        }
    }
}

/// Ordered records, in the order the producer emitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCollection(Vec<Record>);

impl RecordCollection {
    pub fn new(records: Vec<Record>) -> Self {
        Self(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.0.iter()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.title.as_str()).collect()
    }

    pub fn into_inner(self) -> Vec<Record> {
        self.0
    }

    /// Summary figures for display.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            records: self.0.len(),
            authors: self.0.iter().map(|r| r.authors.len()).sum(),
            latest_year: self
                .0
                .iter()
                .filter_map(|r| r.published_on())
                .map(|d| d.year())
                .max(),
        }
    }
}

impl std::ops::Deref for RecordCollection {
    type Target = [Record];

    fn deref(&self) -> &[Record] {
        &self.0
    }
}

impl IntoIterator for RecordCollection {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for RecordCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No papers found.");
        }
        writeln!(f, "Research papers found:")?;
        for (idx, record) in self.0.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "{}. {}", idx + 1, record.title)?;
            writeln!(f, "   Authors: {}", record.author_line(3))?;
            writeln!(f, "   Published: {}", record.published_date)?;
            writeln!(f, "   URL: {}", record.source_url)?;
        }
        Ok(())
    }
}

/// Aggregate figures over a [`RecordCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of records.
    pub records: usize,
    /// Total author count across records (not de-duplicated).
    pub authors: usize,
    /// Most recent publication year, if any record carries a parseable date.
    pub latest_year: Option<i32>,
}

/// State of one execution of the pipeline for a single topic.
///
/// Each run owns its buffers; nothing is shared between runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineRun {
    topic: String,
    producer_text: String,
    records: Option<RecordCollection>,
    consumer_text: String,
}

impl PipelineRun {
    pub(crate) fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// The (trimmed) topic this run was started with.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Everything the producer emitted so far.
    pub fn producer_text(&self) -> &str {
        &self.producer_text
    }

    /// Records decoded from the producer's output.
    ///
    /// `None` until the producer completes, and also when its output holds no
    /// recognisable record list.
    pub fn records(&self) -> Option<&RecordCollection> {
        self.records.as_ref()
    }

    /// Everything the consumer emitted so far.
    pub fn consumer_text(&self) -> &str {
        &self.consumer_text
    }

    pub(crate) fn append(&mut self, origin: Origin, text: &str) {
        match origin {
            Origin::Producer => self.producer_text.push_str(text),
            Origin::Consumer => self.consumer_text.push_str(text),
        }
    }

    pub(crate) fn set_records(&mut self, records: Option<RecordCollection>) {
        self.records = records;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, authors: &[&str], published: &str) -> Record {
        Record {
            title: title.into(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            summary: String::new(),
            source_url: format!("http://arxiv.org/abs/{}", title),
            published_date: published.into(),
        }
    }

    #[test]
    fn record_accepts_wire_and_neutral_field_names() {
        let wire: Record = serde_json::from_str(
            r#"{"title":"A","authors":["X"],"abstract":"about","arxiv_url":"http://a","published":"2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(wire.summary, "about");
        assert_eq!(wire.source_url, "http://a");

        let neutral: Record = serde_json::from_str(
            r#"{"title":"A","source_url":"http://a","published_date":"2024-01-01"}"#,
        )
        .unwrap();
        assert!(neutral.authors.is_empty());
        assert_eq!(neutral.published_date, "2024-01-01");
    }

    #[test]
    fn record_requires_title_and_url() {
        assert!(serde_json::from_str::<Record>(r#"{"arxiv_url":"http://a"}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"{"title":"A"}"#).is_err());
    }

    #[test]
    fn published_on_reads_date_prefix() {
        let r = record("A", &[], "2023-07-15T10:00:00Z");
        assert_eq!(r.published_on(), NaiveDate::from_ymd_opt(2023, 7, 15));
        assert_eq!(record("A", &[], "Unknown Date").published_on(), None);
        assert_eq!(record("A", &[], "").published_on(), None);
    }

    #[test]
    fn author_line_truncates() {
        let r = record("A", &["a", "b", "c", "d", "e"], "");
        assert_eq!(r.author_line(3), "a, b, c, +2 more");
        assert_eq!(record("A", &["a", "b"], "").author_line(3), "a, b");
    }

    #[test]
    fn stats_aggregate() {
        let records = RecordCollection::new(vec![
            record("A", &["x", "y"], "2021-01-01"),
            record("B", &["z"], "2024-03-02"),
            record("C", &[], "n/a"),
        ]);
        let stats = records.stats();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.authors, 3);
        assert_eq!(stats.latest_year, Some(2024));

        assert_eq!(RecordCollection::default().stats().latest_year, None);
    }

    #[test]
    fn display_lists_records_in_order() {
        let records = RecordCollection::new(vec![
            record("First", &["a"], "2024-01-01"),
            record("Second", &["b", "c", "d", "e"], "2024-02-02"),
        ]);
        let text = records.to_string();
        let first = text.find("1. First").unwrap();
        let second = text.find("2. Second").unwrap();
        assert!(first < second);
        assert!(text.contains("Authors: b, c, d, +1 more"));
        assert!(text.contains("URL: http://arxiv.org/abs/Second"));
    }

    #[test]
    fn run_buffers_are_per_origin() {
        let mut run = PipelineRun::new("topic");
        run.append(Origin::Producer, "[");
        run.append(Origin::Consumer, "# Review");
        run.append(Origin::Producer, "]");
        assert_eq!(run.producer_text(), "[]");
        assert_eq!(run.consumer_text(), "# Review");
        assert!(run.records().is_none());
    }

    #[test]
    fn chunk_constructors() {
        let c = Chunk::fragment(Origin::Consumer, "hi");
        assert!(!c.is_final);
        let end = Chunk::end_of_stage(Origin::Producer);
        assert!(end.is_final);
        assert!(end.text.is_empty());
    }
}
