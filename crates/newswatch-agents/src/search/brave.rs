use std::time::Duration;

use async_trait::async_trait;
use newswatch_common::{Error, Result};
use serde::Deserialize;
use tracing::debug;

use super::SearchProvider;

const SEARCH_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const SEARCH_TIMEOUT_SECS: u64 = 15;
const MAX_COUNT: u64 = 10;

/// Web search via the Brave Search API.
pub struct BraveSearch {
    client: reqwest::Client,
    api_key: String,
    max_results: u64,
    endpoint: String,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, max_results: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            max_results: max_results.clamp(1, MAX_COUNT),
            endpoint: SEARCH_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    results: Vec<BraveWebResult>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// One result per paragraph: headline and URL on the first line, description
/// below. The downstream line parser segments on exactly this shape.
fn format_results(results: &[BraveWebResult]) -> String {
    let mut output = String::new();
    for result in results {
        output.push_str(&format!(
            "{} {}\n{}\n\n",
            result.title, result.url, result.description
        ));
    }
    output.trim_end().to_string()
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn provider_id(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str) -> Result<String> {
        debug!("brave search: {query}");

        let response = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", &self.max_results.to_string())])
            .send()
            .await
            .map_err(|e| Error::Provider(format!("web search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "search API error: HTTP {status}"
            )));
        }

        let body: BraveSearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse search response: {e}")))?;

        match body.web {
            Some(web) if !web.results.is_empty() => Ok(format_results(&web.results)),
            _ => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn formats_results_one_per_paragraph() {
        let results = vec![
            BraveWebResult {
                title: "Rust 1.89 released".into(),
                url: "https://blog.rust-lang.org/1.89".into(),
                description: "The release notes.".into(),
            },
            BraveWebResult {
                title: "Crates.io outage".into(),
                url: "https://status.crates.io".into(),
                description: "Resolved in an hour.".into(),
            },
        ];

        let blob = format_results(&results);
        let paragraphs: Vec<&str> = blob.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].starts_with("Rust 1.89 released https://blog.rust-lang.org/1.89"));
        assert!(paragraphs[1].ends_with("Resolved in an hour."));
    }

    #[test]
    fn clamps_result_count() {
        let search = BraveSearch::new("key", 50);
        assert_eq!(search.max_results, MAX_COUNT);
        let search = BraveSearch::new("key", 0);
        assert_eq!(search.max_results, 1);
    }

    #[tokio::test]
    async fn search_hits_api_and_formats_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/res/v1/web/search"))
            .and(header("X-Subscription-Token", "test-key"))
            .and(query_param("q", "rust releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "web": {
                    "results": [
                        {"title": "Rust Blog", "url": "https://blog.rust-lang.org", "description": "Official blog."}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let search = BraveSearch::new("test-key", 5)
            .with_endpoint(format!("{}/res/v1/web/search", server.uri()));
        let blob = search.search("rust releases").await.unwrap();
        assert!(blob.contains("Rust Blog https://blog.rust-lang.org"));
        assert!(blob.contains("Official blog."));
    }

    #[tokio::test]
    async fn search_error_status_is_a_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let search = BraveSearch::new("test-key", 5)
            .with_endpoint(format!("{}/res/v1/web/search", server.uri()));
        let err = search.search("anything").await.unwrap_err();
        assert!(err.is_provider());
    }

    #[tokio::test]
    async fn empty_results_return_empty_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"web": {"results": []}})),
            )
            .mount(&server)
            .await;

        let search = BraveSearch::new("test-key", 5)
            .with_endpoint(format!("{}/res/v1/web/search", server.uri()));
        assert_eq!(search.search("anything").await.unwrap(), "");
    }
}
