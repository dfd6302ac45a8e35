//! Web search backends and a generator that lists their results.

use crate::errors::GenerationError;
use crate::stages::Generator;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{transport_error, upstream_error};

/// DuckDuckGo's script-free results page.
pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

const BROWSER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[allow(clippy::expect_used)]
static RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result").expect("valid selector"));

#[allow(clippy::expect_used)]
static RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));

#[allow(clippy::expect_used)]
static RESULT_SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("valid selector"));

/// One web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Target URL.
    pub url: String,
    /// Snippet shown under the title.
    pub description: String,
}

impl std::fmt::Display for SearchHit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Title: {}\nURL: {}\nDescription: {}",
            self.title, self.url, self.description
        )
    }
}

/// A web search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Returns at most `max_results` hits for `query`.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, GenerationError>;
}

/// Searches through DuckDuckGo's HTML endpoint.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl DuckDuckGoSearch {
    /// Creates a backend for the public endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: DUCKDUCKGO_HTML_URL.to_string(),
            timeout: None,
        }
    }

    /// Points the backend at another results page.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, GenerationError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header(USER_AGENT, BROWSER_AGENT);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Search request rejected");
            return Err(upstream_error(status.as_u16(), &body));
        }

        let hits = parse_results(&body, max_results);
        debug!(query, hits = hits.len(), "Search finished");
        Ok(hits)
    }
}

/// Extracts organic results from a DuckDuckGo HTML results page.
///
/// Ads are skipped and redirect links are unwrapped to their target.
#[must_use]
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT)
        .filter(|result| !result.value().classes().any(|c| c == "result--ad"))
        .filter_map(|result| {
            let link = result.select(&RESULT_LINK).next()?;
            let title = squash(link);
            let url = resolve_link(link.value().attr("href")?)?;
            let description = result
                .select(&RESULT_SNIPPET)
                .next()
                .map(squash)
                .unwrap_or_default();
            (!title.is_empty()).then_some(SearchHit {
                title,
                url,
                description,
            })
        })
        .take(max_results)
        .collect()
}

fn squash(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unwraps `//duckduckgo.com/l/?uddg=<target>` redirects.
fn resolve_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if url.path().starts_with("/l/") {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }
    Some(absolute)
}

/// A [`Generator`] that searches the web and lists the hits as text.
///
/// Each hit becomes a `Title:`/`URL:`/`Description:` block; blocks are
/// separated by a blank line. No hits fails the stage rather than letting a
/// later stage write from nothing.
#[derive(Clone)]
pub struct SearchGenerator {
    backend: Arc<dyn SearchBackend>,
    max_results: usize,
    query: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl SearchGenerator {
    /// Hits kept per search.
    pub const DEFAULT_MAX_RESULTS: usize = 5;

    /// Creates a generator that searches for its input verbatim.
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            max_results: Self::DEFAULT_MAX_RESULTS,
            query: Arc::new(|input: &str| input.trim().to_string()),
        }
    }

    /// Sets how many hits are kept.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Derives the search query from the stage input.
    #[must_use]
    pub fn with_query(mut self, query: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.query = Arc::new(query);
        self
    }
}

impl std::fmt::Debug for SearchGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGenerator")
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Generator for SearchGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        let query = (self.query)(input);
        info!(%query, "Running web search");
        let hits = self.backend.search(&query, self.max_results).await?;
        if hits.is_empty() {
            return Err(GenerationError::other(format!(
                "no search results for '{query}'"
            )));
        }
        Ok(hits
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use crate::testing::{assert_completed, assert_failed_with, RecordingGenerator};
    use crate::workflows::{news_pipeline, news_query, news_request};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><body>
<div class="result results_links results_links_deep result--ad">
  <h2 class="result__title"><a class="result__a" href="https://ads.example.com/buy">Sponsored crate</a></h2>
  <a class="result__snippet">Buy now</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fblog.rust-lang.org%2F2025%2F06%2F26%2FRust-1.88.0.html&amp;rut=abc">Announcing Rust <b>1.88.0</b></a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">The Rust team is happy to announce
     a new version.</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title"><a class="result__a" href="https://lwn.net/Articles/1">Rust in the kernel</a></h2>
  <a class="result__snippet">More drivers land.</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title"><a class="result__a" href="https://example.org/third">Third</a></h2>
</div>
</body></html>"#;

    async fn search_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "rust 2025-06"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        server
    }

    fn backend(server: &MockServer) -> DuckDuckGoSearch {
        DuckDuckGoSearch::new().with_endpoint(format!("{}/html/", server.uri()))
    }

    #[test]
    fn test_parse_results_skips_ads_and_unwraps_redirects() {
        let hits = parse_results(PAGE, 5);

        assert_eq!(hits.len(), 3);
        assert_eq!(
            hits[0],
            SearchHit {
                title: "Announcing Rust 1.88.0".into(),
                url: "https://blog.rust-lang.org/2025/06/26/Rust-1.88.0.html".into(),
                description: "The Rust team is happy to announce a new version.".into(),
            }
        );
        assert_eq!(hits[1].url, "https://lwn.net/Articles/1");
        assert_eq!(hits[2].description, "");
    }

    #[test]
    fn test_parse_results_honors_limit() {
        assert_eq!(parse_results(PAGE, 1).len(), 1);
        assert!(parse_results("<html></html>", 5).is_empty());
    }

    #[tokio::test]
    async fn test_duckduckgo_sends_query() {
        let server = search_server().await;

        let hits = backend(&server).search("rust 2025-06", 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Rust in the kernel");
    }

    #[tokio::test]
    async fn test_duckduckgo_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "blocked"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = backend(&server).search("blocked", 5).await.unwrap_err();

        assert_eq!(
            err,
            GenerationError::Upstream {
                status: 403,
                body: "forbidden".into()
            }
        );
    }

    #[tokio::test]
    async fn test_generator_formats_hits() {
        let server = search_server().await;
        let generator = SearchGenerator::new(Arc::new(backend(&server)))
            .with_max_results(2)
            .with_query(news_query);

        let text = generator
            .generate(&news_request("rust", "2025-06"))
            .await
            .unwrap();

        assert_eq!(
            text,
            "Title: Announcing Rust 1.88.0\n\
             URL: https://blog.rust-lang.org/2025/06/26/Rust-1.88.0.html\n\
             Description: The Rust team is happy to announce a new version.\n\n\
             Title: Rust in the kernel\n\
             URL: https://lwn.net/Articles/1\n\
             Description: More drivers land."
        );
    }

    #[tokio::test]
    async fn test_news_pipeline_edits_search_results() {
        let server = search_server().await;
        let fetcher = SearchGenerator::new(Arc::new(backend(&server))).with_query(news_query);
        let editor = Arc::new(RecordingGenerator::new("edited"));
        let pipeline = news_pipeline(Arc::new(fetcher), editor.clone()).unwrap();

        let run = pipeline.run(&news_request("rust", "2025-06")).await.unwrap();

        assert_completed(&run);
        let raw = &editor.inputs()[0];
        assert!(raw.starts_with("Title: Announcing Rust 1.88.0\n"));
        assert_eq!(raw.matches("Title: ").count(), 3);
    }

    #[tokio::test]
    async fn test_no_hits_fails_fetch_stage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        let editor = Arc::new(RecordingGenerator::new("edited"));
        let fetcher = SearchGenerator::new(Arc::new(backend(&server))).with_query(news_query);
        let pipeline = news_pipeline(Arc::new(fetcher), editor.clone()).unwrap();

        let run = pipeline.run(&news_request("nothing", "2025-06")).await.unwrap();

        assert_failed_with(&run, FailureKind::Generation);
        assert_eq!(
            run.status().to_string(),
            "failed:generation failed: no search results for 'nothing 2025-06'"
        );
        assert_eq!(editor.call_count(), 0);
    }
}
