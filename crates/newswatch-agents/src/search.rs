use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use newswatch_common::{Error, Result};
use newswatch_config::SearchConfig;
use regex::Regex;

pub mod brave;

pub use brave::BraveSearch;

/// How long a page-content fetch may block a monitoring run.
const EXTRACT_TIMEOUT_SECS: u64 = 10;
const EXTRACT_MAX_CHARS: usize = 5000;

/// Trait for web search backends. Returns an unstructured text blob that the
/// result parser segments into articles; failures surface as
/// `Error::Provider`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn search(&self, query: &str) -> Result<String>;
}

/// Build the search backend selected by config.
pub fn build_search_provider(config: &SearchConfig) -> Result<Box<dyn SearchProvider>> {
    match config.provider.as_str() {
        "brave" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| Error::Config("search.api_key is not set".into()))?;
            Ok(Box::new(BraveSearch::new(api_key, config.max_results)))
        }
        other => Err(Error::Config(format!("unknown search provider: {other}"))),
    }
}

/// Fetch a page and reduce it to readable text: scripts, styles, and tags
/// stripped, whitespace collapsed, capped at [`EXTRACT_MAX_CHARS`] chars.
pub async fn fetch_page_text(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(EXTRACT_TIMEOUT_SECS))
        .build()
        .unwrap_or_default();

    let response = client
        .get(url)
        .header("user-agent", "Mozilla/5.0 (compatible; newswatch)")
        .send()
        .await
        .map_err(|e| Error::Provider(format!("content fetch failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Provider(format!(
            "content fetch returned HTTP {status}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Provider(format!("failed to read page body: {e}")))?;

    Ok(strip_html(&body))
}

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("static regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("static regex"));

fn strip_html(html: &str) -> String {
    let without_blocks = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    let text = without_tags
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    text.chars().take(EXTRACT_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::strip_html;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<html><body><h1>Title</h1>\n  <p>First   sentence.</p></body></html>";
        assert_eq!(strip_html(html), "Title First sentence.");
    }

    #[test]
    fn drops_script_and_style_contents() {
        let html = "<p>keep</p><script>var x = 'drop';</script><style>.a{color:red}</style><p>tail</p>";
        let text = strip_html(html);
        assert!(text.contains("keep"));
        assert!(text.contains("tail"));
        assert!(!text.contains("drop"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn output_is_capped() {
        let html = format!("<p>{}</p>", "a".repeat(10_000));
        assert_eq!(strip_html(&html).len(), super::EXTRACT_MAX_CHARS);
    }
}
