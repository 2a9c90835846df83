use std::sync::Arc;

use newswatch_common::Result;
use newswatch_store::{ContextMemory, NewArticle};
use tracing::{info, instrument, warn};

use crate::parser;
use crate::prompts;
use crate::providers::LlmProvider;
use crate::search::{self, SearchProvider};

/// Substituted for the analysis when the LLM call fails; the cycle still
/// stores and reports something.
const ANALYSIS_ERROR_TEXT: &str = "Error generating analysis.";

/// Articles with a real URL and a snippet shorter than this are candidates
/// for page-content enrichment.
const THIN_SNIPPET_CHARS: usize = 80;
const MAX_ENRICHED_ARTICLES: usize = 3;
const ENRICHED_SNIPPET_CHARS: usize = 300;

/// Outcome of one monitoring pass.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub articles: Vec<NewArticle>,
    pub analysis: String,
    /// The query actually sent to the search backend (refined or fallback).
    pub query: String,
}

/// One monitoring pass: refine query -> search -> parse -> analyze -> update
/// memory. Every provider call has a defined fallback so a run never aborts
/// the monitoring loop; only persistence failures propagate.
pub struct ResearchPipeline {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    memory: Arc<ContextMemory>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    extract_content: bool,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        memory: Arc<ContextMemory>,
    ) -> Self {
        Self {
            llm,
            search,
            memory,
            temperature: None,
            max_tokens: None,
            extract_content: false,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable fetching page text to fill in thin snippets.
    pub fn with_content_extraction(mut self, enabled: bool) -> Self {
        self.extract_content = enabled;
        self
    }

    #[instrument(skip(self), fields(prompt = %prompt))]
    pub async fn run(&self, prompt: &str) -> Result<ResearchOutcome> {
        let context = self.memory.get_context(prompt, None)?;

        let query = match self.refine_query(prompt, &context).await {
            Ok(query) if !query.trim().is_empty() => query,
            Ok(_) => prompt.to_string(),
            Err(e) => {
                warn!("query refinement failed, falling back to prompt: {e}");
                prompt.to_string()
            }
        };

        let mut articles = match self.search.search(&query).await {
            Ok(raw) => parser::parse(&raw, prompt),
            Err(e) => {
                warn!("search failed, substituting sentinel article: {e}");
                vec![NewArticle {
                    title: "Error in Search".to_string(),
                    snippet: format!("Unable to retrieve results: {e}"),
                    url: "N/A".to_string(),
                    source: "Error".to_string(),
                }]
            }
        };

        if self.extract_content {
            enrich_thin_snippets(&mut articles).await;
        }

        let analysis = match self.analyze(prompt, &articles, &context).await {
            Ok(text) => text,
            Err(e) => {
                warn!("analysis failed, substituting error report: {e}");
                ANALYSIS_ERROR_TEXT.to_string()
            }
        };

        self.memory.add_report(prompt, &analysis)?;

        info!(
            "monitoring pass found {} articles using query: {query}",
            articles.len()
        );
        Ok(ResearchOutcome {
            articles,
            analysis,
            query,
        })
    }

    async fn refine_query(&self, prompt: &str, context: &str) -> Result<String> {
        let mut request = prompts::refine_query_request(prompt, context);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let response = self.llm.complete(&request).await?;
        Ok(response.content.trim().replace('"', ""))
    }

    async fn analyze(
        &self,
        prompt: &str,
        articles: &[NewArticle],
        context: &str,
    ) -> Result<String> {
        let mut request = prompts::analysis_request(prompt, articles, context);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let response = self.llm.complete(&request).await?;
        Ok(response.content)
    }
}

/// Replace backfilled or very short snippets with extracted page text, for a
/// bounded number of articles. Fetch failures leave the snippet unchanged.
async fn enrich_thin_snippets(articles: &mut [NewArticle]) {
    let mut enriched = 0;
    for article in articles.iter_mut() {
        if enriched >= MAX_ENRICHED_ARTICLES {
            break;
        }
        if article.url == "N/A" || article.snippet.chars().count() >= THIN_SNIPPET_CHARS {
            continue;
        }

        match search::fetch_page_text(&article.url).await {
            Ok(text) if !text.is_empty() => {
                article.snippet = text.chars().take(ENRICHED_SNIPPET_CHARS).collect();
                enriched += 1;
            }
            Ok(_) => {}
            Err(e) => warn!("content extraction failed for {}: {e}", article.url),
        }
    }
}
