use newswatch_store::NewArticle;

use crate::providers::LlmRequest;

/// Build the query-refinement request: given the topic and what past reports
/// already covered, ask for the single most effective search query.
pub fn refine_query_request(prompt: &str, context: &str) -> LlmRequest {
    LlmRequest::new(
        "You are a research strategist. Your goal is to create the most effective \
         web search query to find new information about a topic.\n\
         Consider the user's prompt and the context of what we already know.\n\
         Return ONLY the search query string, nothing else.",
        format!(
            "User Prompt: {prompt}\n\n\
             Context (Previous Reports):\n{context}\n\n\
             Generate a search query to find the latest updates or missing details."
        ),
    )
}

/// Build the analysis request over freshly parsed articles, anchored to the
/// accumulated context so the model reports what is actually new.
pub fn analysis_request(prompt: &str, articles: &[NewArticle], context: &str) -> LlmRequest {
    LlmRequest::new(
        "You are a professional news analyst. Your task is to write a comprehensive update report.\n\
         1. Focus on NEW information found in the articles.\n\
         2. Reference the 'Previous Context' to show continuity or changes.\n\
         3. If the new articles just repeat the context, state that there are no significant updates.\n\
         4. Cite sources (titles/publications) in your analysis.",
        format!(
            "Topic: {prompt}\n\n\
             Previous Context:\n{context}\n\n\
             New Search Results:\n{}\n\n\
             Write the analysis report:",
            format_articles(articles)
        ),
    )
}

/// Build the cross-period synthesis request over every stored report,
/// labeled so the model can reference individual runs.
pub fn aggregate_request(reports: &[String]) -> LlmRequest {
    let combined = reports
        .iter()
        .enumerate()
        .map(|(i, report)| format!("Report {}:\n{report}", i + 1))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    LlmRequest::new(
        "You are a professional news analyst creating an aggregate report. \
         Your task is to synthesize multiple news reports into a comprehensive \
         overview, identifying trends, recurring themes, and the overall narrative \
         across the time period covered.",
        format!(
            "Please create an aggregate summary from these multiple reports:\n\n\
             {combined}\n\n\
             Provide:\n\
             1. Overview of the time period covered\n\
             2. Major trends and developments\n\
             3. Key insights across all reports\n\
             4. Conclusion and outlook"
        ),
    )
}

pub fn format_articles(articles: &[NewArticle]) -> String {
    articles
        .iter()
        .map(|a| {
            format!(
                "Title: {}\nSource: {}\nURL: {}\nContent: {}",
                a.title, a.source, a.url, a.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
