//! arXiv export API client.
//!
//! Queries `/api/query` and reads the Atom feed it returns. Only the fields a
//! [`Record`] carries are extracted.

use super::{PaperSearch, SearchQuery};
use crate::error::Result;
use crate::output_parser::markup::{tag_blocks, tag_text};
use crate::types::Record;
use crate::PipelineError;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;

/// Public arXiv export endpoint.
pub const DEFAULT_ARXIV_URL: &str = "http://export.arxiv.org";

/// [`PaperSearch`] over the arXiv export API.
#[derive(Debug, Clone)]
pub struct ArxivSearch {
    client: Client,
    base_url: String,
}

impl Default for ArxivSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl ArxivSearch {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_ARXIV_URL.to_string(),
        }
    }

    /// Point at a mirror or a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, query: &SearchQuery) -> reqwest::RequestBuilder {
        let url = format!("{}/api/query", self.base_url);
        self.client.get(url).query(&[
            ("search_query", format!("all:{}", query.query())),
            ("start", "0".to_string()),
            ("max_results", query.max_results().to_string()),
            ("sortBy", query.sort_by().as_str().to_string()),
            ("sortOrder", query.sort_order().as_str().to_string()),
        ])
    }
}

#[async_trait]
impl PaperSearch for ArxivSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>> {
        let resp = self.build_request(query).send().await.map_err(|e| {
            PipelineError::Search(format!("failed to reach arXiv at {}: {}", self.base_url, e))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError {
                status: status.as_u16(),
                body,
                retry_after: None,
            });
        }

        let feed = resp.text().await?;
        let records = parse_feed(&feed);
        tracing::debug!(query = %query.query(), entries = records.len(), "parsed arXiv feed");
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}

/// Extract one [`Record`] per `<entry>` of an Atom feed.
///
/// Entries without a title are skipped.
pub fn parse_feed(feed: &str) -> Vec<Record> {
    tag_blocks(feed, "entry")
        .into_iter()
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<Record> {
    let title = tag_text(entry, "title").filter(|t| !t.is_empty())?;
    let authors = tag_blocks(entry, "author")
        .into_iter()
        .filter_map(|author| tag_text(author, "name"))
        .filter(|name| !name.is_empty())
        .collect();

    Some(Record {
        title,
        authors,
        summary: tag_text(entry, "summary").unwrap_or_default(),
        source_url: tag_text(entry, "id").unwrap_or_default(),
        published_date: tag_text(entry, "published")
            .map(|p| date_only(&p))
            .unwrap_or_default(),
    })
}

fn date_only(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.date_naive().format("%Y-%m-%d").to_string(),
        Err(_) => timestamp.chars().take(10).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SortCriterion, SortOrder};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:agents</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <updated>2024-01-02T10:00:00Z</updated>
    <published>2024-01-01T18:30:00Z</published>
    <title>Planning with
      Language   Agents</title>
    <summary>  Agents plan &amp; act.
    </summary>
    <author>
      <name>Ada Lovelace</name>
    </author>
    <author>
      <name>Alan Turing</name>
      <arxiv:affiliation xmlns:arxiv="http://arxiv.org/schemas/atom">Manchester</arxiv:affiliation>
    </author>
    <link href="http://arxiv.org/abs/2401.00001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.00001v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v2</id>
    <published>2023-12-31</published>
    <title>Tool Use</title>
    <summary>Short.</summary>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/broken</id>
    <summary>No title here.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_entries() {
        let records = parse_feed(FEED);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Planning with Language Agents");
        assert_eq!(first.summary, "Agents plan & act.");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.source_url, "http://arxiv.org/abs/2401.00001v1");
        assert_eq!(first.published_date, "2024-01-01");

        let second = &records[1];
        assert_eq!(second.title, "Tool Use");
        assert!(second.authors.is_empty());
        assert_eq!(second.published_date, "2023-12-31");
    }

    #[test]
    fn test_parse_empty_feed() {
        assert!(parse_feed("<feed></feed>").is_empty());
        assert!(parse_feed("").is_empty());
    }

    #[test]
    fn test_request_url_and_params() {
        let search = ArxivSearch::new().with_base_url("http://localhost:9000/");
        let query = SearchQuery::new("graph neural networks")
            .unwrap()
            .with_max_results(3)
            .with_sort(SortCriterion::LastUpdatedDate, SortOrder::Ascending);

        let req = search.build_request(&query).build().unwrap();
        let url = req.url();
        assert_eq!(url.path(), "/api/query");
        assert_eq!(url.host_str(), Some("localhost"));

        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(params.contains(&("search_query".into(), "all:graph neural networks".into())));
        assert!(params.contains(&("max_results".into(), "3".into())));
        assert!(params.contains(&("sortBy".into(), "lastUpdatedDate".into())));
        assert!(params.contains(&("sortOrder".into(), "ascending".into())));
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(ArxivSearch::default().base_url(), DEFAULT_ARXIV_URL);
    }
}
