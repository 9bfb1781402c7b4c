//! Wikipedia client: article search (MediaWiki action API), summary fetch
//! (REST API), and the fact-check pipeline that glues them to the relevance
//! scorer.
//!
//! Failure policy mirrors the rest of the backend: search and article fetch
//! degrade to empty results / `None`, and `fact_check` always produces an
//! outcome. Callers never have to handle transport errors.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::USER_AGENT;
use tracing::{error, info, instrument};
use url::Url;

use crate::domain::{FactCheck, SearchHit, WikiArticle};
use crate::error::{QuizError, Result};
use crate::relevance::{confidence_for, extract_key_terms, relevance_score};
use crate::util::clean_snippet;

/// Default MediaWiki action API endpoint.
const DEFAULT_SEARCH_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Default REST v1 base (page summaries).
const DEFAULT_REST_URL: &str = "https://en.wikipedia.org/api/rest_v1";

/// Timeout for Wikipedia requests.
const TIMEOUT_SECS: u64 = 10;

/// User-Agent for outbound requests (Wikimedia asks clients to identify).
const WIKI_USER_AGENT: &str = concat!("quizgen-backend/", env!("CARGO_PKG_VERSION"));

/// Search queries are cleaned and capped at this many characters.
const MAX_QUERY_CHARS: usize = 100;

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

#[derive(Clone)]
pub struct Wikipedia {
    client: reqwest::Client,
    search_url: String,
    rest_url: String,
}

impl Wikipedia {
    pub fn new() -> Result<Self> {
        Self::with_endpoints(DEFAULT_SEARCH_URL, DEFAULT_REST_URL)
    }

    /// Construct against explicit endpoints. Tests point this at a mock server.
    pub fn with_endpoints(search_url: &str, rest_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| QuizError::Wikipedia(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            search_url: search_url.to_string(),
            rest_url: rest_url.trim_end_matches('/').to_string(),
        })
    }

    /// Search for articles. Network or decode failures yield an empty list.
    #[instrument(level = "info", skip(self, query), fields(query_len = query.len(), limit))]
    pub async fn search(&self, query: &str, limit: u32) -> Vec<SearchHit> {
        match self.try_search(query, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                error!(target: "wikipedia", error = %e, "Wikipedia search failed; returning no hits");
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let cleaned = clean_query(query);
        let limit_s = limit.to_string();
        let res = self
            .client
            .get(&self.search_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", cleaned.as_str()),
                ("srlimit", limit_s.as_str()),
                ("srprop", "snippet|size"),
                ("origin", "*"),
            ])
            .header(USER_AGENT, WIKI_USER_AGENT)
            .send()
            .await
            .map_err(|e| QuizError::Wikipedia(e.to_string()))?;

        if !res.status().is_success() {
            return Err(QuizError::Wikipedia(format!(
                "search HTTP {}",
                res.status()
            )));
        }

        let body: SearchEnvelope = res
            .json()
            .await
            .map_err(|e| QuizError::Wikipedia(format!("search decode: {e}")))?;

        let raw = body.query.map(|q| q.search).unwrap_or_default();
        Ok(raw
            .into_iter()
            .map(|r| SearchHit {
                url: article_url(&r.title),
                snippet: clean_snippet(&r.snippet),
                title: r.title,
                pageid: r.pageid,
            })
            .collect())
    }

    /// Fetch an article summary by title. Any failure yields `None`.
    #[instrument(level = "info", skip(self), fields(%title))]
    pub async fn article(&self, title: &str) -> Option<WikiArticle> {
        match self.try_article(title).await {
            Ok(article) => article,
            Err(e) => {
                error!(target: "wikipedia", %title, error = %e, "Wikipedia article fetch failed");
                None
            }
        }
    }

    async fn try_article(&self, title: &str) -> Result<Option<WikiArticle>> {
        let url = self.summary_url(title)?;
        let res = self
            .client
            .get(url)
            .header(USER_AGENT, WIKI_USER_AGENT)
            .send()
            .await
            .map_err(|e| QuizError::Wikipedia(e.to_string()))?;

        // Unknown titles come back as 404; treat every non-200 as "no article".
        if !res.status().is_success() {
            return Ok(None);
        }

        let data: serde_json::Value = res
            .json()
            .await
            .map_err(|e| QuizError::Wikipedia(format!("summary decode: {e}")))?;

        Ok(Some(summary_to_article(title, &data)?))
    }

    fn summary_url(&self, title: &str) -> Result<String> {
        let clean_title = title.replace(' ', "_");
        let mut url = Url::parse(&self.rest_url)
            .map_err(|e| QuizError::Wikipedia(format!("bad REST base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| QuizError::Wikipedia("REST base cannot take a path".into()))?
            .extend(["page", "summary", clean_title.as_str()]);
        Ok(url.to_string())
    }

    /// The fact-check pipeline: extract key terms, search the primary term,
    /// fetch the best match, score its relevance against the content.
    #[instrument(level = "info", skip(self, content, topic), fields(content_len = content.len(), has_topic = topic.is_some()))]
    pub async fn fact_check(&self, content: &str, topic: Option<&str>) -> FactCheck {
        let key_terms = extract_key_terms(content, topic);
        if key_terms.is_empty() {
            return FactCheck::miss(content);
        }

        let search_results = self.search(&key_terms[0], 3).await;
        let Some(best) = search_results.first() else {
            return FactCheck::miss(content);
        };

        let Some(article) = self.article(&best.title).await else {
            // We found candidates but could not fetch the page body; report
            // the hits with a floor score so callers can still inspect them.
            return FactCheck {
                query: content.to_string(),
                found: false,
                article: None,
                search_results,
                confidence: confidence_for(0.3),
                relevance_score: 0.3,
            };
        };

        let score = relevance_score(content, &article.title, &article.extract, &key_terms);
        info!(target: "wikipedia", article = %article.title, score, "fact-check scored");
        FactCheck {
            query: content.to_string(),
            found: true,
            confidence: confidence_for(score),
            relevance_score: score,
            article: Some(article),
            search_results,
        }
    }
}

/// Canonical article URL for a title.
fn article_url(title: &str) -> String {
    let mut url = Url::parse("https://en.wikipedia.org/wiki/").expect("static base URL");
    let clean_title = title.replace(' ', "_");
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(&clean_title);
    }
    url.to_string()
}

/// Strip punctuation from a search query and cap its length.
fn clean_query(query: &str) -> String {
    let cleaned = NON_WORD_RE.replace_all(query, " ");
    cleaned.trim().chars().take(MAX_QUERY_CHARS).collect()
}

/// Build a [`WikiArticle`] out of the REST summary payload. The revision id
/// hides under different keys depending on the endpoint version.
fn summary_to_article(requested_title: &str, data: &serde_json::Value) -> Result<WikiArticle> {
    let title = data
        .get("title")
        .and_then(|v| v.as_str())
        .ok_or_else(|| QuizError::Wikipedia("summary missing title".into()))?
        .to_string();
    let pageid = data
        .get("pageid")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| QuizError::Wikipedia("summary missing pageid".into()))?;

    let lastrevid = ["rev", "revision", "lastrevid"]
        .iter()
        .find_map(|k| revision_as_u64(data.get(*k)))
        .unwrap_or(0);

    let url = data
        .pointer("/content_urls/desktop/page")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| article_url(requested_title));

    let sections = data
        .get("sections")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.get("title").and_then(|t| t.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(WikiArticle {
        title,
        extract: data
            .get("extract")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        url,
        pageid,
        lastrevid,
        sections,
    })
}

/// Revision ids arrive as numbers or numeric strings.
fn revision_as_u64(value: Option<&serde_json::Value>) -> Option<u64> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// --- Search wire DTOs ---

#[derive(serde::Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(serde::Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<RawSearchHit>,
}

#[derive(serde::Deserialize)]
struct RawSearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
    pageid: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_body() -> serde_json::Value {
        serde_json::json!({
            "query": {
                "search": [
                    {
                        "title": "Rust (programming language)",
                        "snippet": "<span class=\"searchmatch\">Rust</span> is a language &amp; toolchain",
                        "pageid": 29414838u64,
                        "size": 174208
                    },
                    {
                        "title": "Rust Belt",
                        "snippet": "region of the United States",
                        "pageid": 1431447u64,
                        "size": 60000
                    }
                ]
            }
        })
    }

    fn summary_body() -> serde_json::Value {
        serde_json::json!({
            "title": "Rust (programming language)",
            "extract": "Rust is a multi-paradigm systems programming language focused on safety.",
            "pageid": 29414838u64,
            "rev": "1100200300",
            "content_urls": {
                "desktop": { "page": "https://en.wikipedia.org/wiki/Rust_(programming_language)" }
            }
        })
    }

    async fn client_for(server: &MockServer) -> Wikipedia {
        Wikipedia::with_endpoints(
            &format!("{}/w/api.php", server.uri()),
            &format!("{}/api/rest_v1", server.uri()),
        )
        .expect("build client")
    }

    #[test]
    fn query_cleaning_strips_punctuation_and_caps_length() {
        assert_eq!(clean_query("rust: the \"language\"!"), "rust  the  language");
        let long = "x".repeat(300);
        assert_eq!(clean_query(&long).chars().count(), 100);
    }

    #[test]
    fn article_url_encodes_title() {
        assert_eq!(
            article_url("Rust (programming language)"),
            "https://en.wikipedia.org/wiki/Rust_(programming_language)"
        );
        assert!(article_url("C++ [draft]").contains("C++"));
    }

    #[test]
    fn summary_parsing_handles_revision_variants() {
        let mut data = summary_body();
        let article = summary_to_article("Rust", &data).unwrap();
        assert_eq!(article.lastrevid, 1100200300);

        data["rev"] = serde_json::Value::Null;
        data["lastrevid"] = serde_json::json!(42u64);
        let article = summary_to_article("Rust", &data).unwrap();
        assert_eq!(article.lastrevid, 42);

        data["lastrevid"] = serde_json::Value::Null;
        let article = summary_to_article("Rust", &data).unwrap();
        assert_eq!(article.lastrevid, 0);
    }

    #[test]
    fn summary_parsing_requires_title_and_pageid() {
        let data = serde_json::json!({ "extract": "orphan text" });
        assert!(summary_to_article("X", &data).is_err());
    }

    #[tokio::test]
    async fn search_parses_and_cleans_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;

        let wiki = client_for(&server).await;
        let hits = wiki.search("rust language", 5).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Rust (programming language)");
        assert_eq!(hits[0].snippet, "Rust is a language & toolchain");
        assert!(hits[0].url.ends_with("/wiki/Rust_(programming_language)"));
    }

    #[tokio::test]
    async fn search_failure_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let wiki = client_for(&server).await;
        assert!(wiki.search("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn article_fetch_and_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/Rust_(programming_language)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(summary_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/No_Such_Page"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let wiki = client_for(&server).await;
        let article = wiki.article("Rust (programming language)").await;
        assert!(article.is_some());
        let article = article.unwrap();
        assert_eq!(article.pageid, 29414838);
        assert!(article.extract.contains("systems programming"));

        assert!(wiki.article("No Such Page").await.is_none());
    }

    #[tokio::test]
    async fn fact_check_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/Rust_(programming_language)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(summary_body()))
            .mount(&server)
            .await;

        let wiki = client_for(&server).await;
        let check = wiki
            .fact_check("rust systems programming safety", None)
            .await;
        assert!(check.found);
        assert!(check.relevance_score > 0.4);
        assert!(check.article.is_some());
        assert_eq!(check.search_results.len(), 2);
    }

    #[tokio::test]
    async fn fact_check_search_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"query": {"search": []}})),
            )
            .mount(&server)
            .await;

        let wiki = client_for(&server).await;
        let check = wiki.fact_check("completely unknown subject", None).await;
        assert!(!check.found);
        assert_eq!(check.relevance_score, 0.0);
    }

    #[tokio::test]
    async fn fact_check_article_fetch_failure_keeps_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(
                "/api/rest_v1/page/summary/Rust_(programming_language)",
            ))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let wiki = client_for(&server).await;
        let check = wiki.fact_check("rust language", None).await;
        assert!(!check.found);
        assert!((check.relevance_score - 0.3).abs() < 1e-6);
        assert_eq!(check.search_results.len(), 2);
    }

    #[tokio::test]
    async fn fact_check_no_terms() {
        // Only stop words and short words: no search is even attempted.
        let wiki = Wikipedia::with_endpoints("http://127.0.0.1:9/w/api.php", "http://127.0.0.1:9")
            .expect("build client");
        let check = wiki.fact_check("is a of to", None).await;
        assert!(!check.found);
        assert_eq!(check.relevance_score, 0.0);
    }
}
