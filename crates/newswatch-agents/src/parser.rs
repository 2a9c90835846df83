use newswatch_store::NewArticle;

/// Upper bound on records produced by one parse.
pub const MAX_ARTICLES: usize = 10;

const SNIPPET_FROM_TITLE_CHARS: usize = 200;
const RAW_FALLBACK_CHARS: usize = 500;
const DEFAULT_SOURCE: &str = "Web";
const MISSING_URL: &str = "N/A";

/// Best-effort segmentation of raw search output into article records.
///
/// Search backends return unstructured text, so this walks lines: a blank
/// line closes the record in progress, a line containing "http" opens a new
/// record (text before the URL becomes its title), any other line is a title
/// if none is set yet and snippet text otherwise. Missing fields are
/// backfilled. Never fails and never returns an empty list.
pub fn parse(raw: &str, prompt: &str) -> Vec<NewArticle> {
    if raw.trim().is_empty() {
        return vec![NewArticle {
            title: "No Results".to_string(),
            snippet: format!("No results found for: {prompt}"),
            url: MISSING_URL.to_string(),
            source: "Search".to_string(),
        }];
    }

    let mut articles: Vec<Partial> = Vec::new();
    let mut current = Partial::default();

    for line in raw.lines() {
        let line = line.trim();

        if line.is_empty() {
            if current.title.is_some() {
                articles.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(url_start) = line.find("http") {
            let url = line[url_start..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            let before = line[..url_start].trim();

            if current.title.is_some() {
                articles.push(std::mem::take(&mut current));
            }

            current = Partial {
                url: Some(url),
                source: Some(DEFAULT_SOURCE.to_string()),
                title: Some(if before.is_empty() {
                    "News Article".to_string()
                } else {
                    before.to_string()
                }),
                snippet: None,
            };
        } else if current.title.is_none() {
            current.title = Some(line.to_string());
        } else {
            match &mut current.snippet {
                Some(snippet) => {
                    snippet.push(' ');
                    snippet.push_str(line);
                }
                None => current.snippet = Some(line.to_string()),
            }
        }
    }

    if current.title.is_some() {
        articles.push(current);
    }

    let mut articles: Vec<NewArticle> = articles.into_iter().map(Partial::backfill).collect();

    if articles.is_empty() {
        articles.push(NewArticle {
            title: format!("Results about: {prompt}"),
            snippet: raw.chars().take(RAW_FALLBACK_CHARS).collect(),
            url: MISSING_URL.to_string(),
            source: "Search Results".to_string(),
        });
    }

    articles.truncate(MAX_ARTICLES);
    articles
}

#[derive(Default)]
struct Partial {
    title: Option<String>,
    url: Option<String>,
    source: Option<String>,
    snippet: Option<String>,
}

impl Partial {
    fn backfill(self) -> NewArticle {
        let title = self.title.unwrap_or_else(|| "Untitled Article".to_string());
        let snippet = self
            .snippet
            .unwrap_or_else(|| title.chars().take(SNIPPET_FROM_TITLE_CHARS).collect());

        NewArticle {
            url: self.url.unwrap_or_else(|| MISSING_URL.to_string()),
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            snippet,
            title,
        }
    }
}
