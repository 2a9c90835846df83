use chrono::{DateTime, Utc};
use newswatch_store::{Article, NewArticle};

/// Which monitoring flow produced a report; affects the subject line and
/// header only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Instant,
    Scheduled,
}

impl ReportKind {
    fn heading(&self) -> &'static str {
        match self {
            Self::Instant => "News Report",
            Self::Scheduled => "Scheduled News Update",
        }
    }
}

pub fn subject_for(kind: ReportKind, prompt: &str) -> String {
    format!("{}: {prompt}", kind.heading())
}

pub fn aggregate_subject(prompt: &str) -> String {
    format!("Aggregate News Report: {prompt}")
}

/// HTML body for an instant or scheduled report.
pub fn render_html(
    articles: &[NewArticle],
    analysis: &str,
    prompt: &str,
    kind: ReportKind,
) -> String {
    let mut body = String::new();
    body.push_str("<html><body style=\"font-family: sans-serif; max-width: 720px;\">\n");
    body.push_str(&format!(
        "<h1>{} — {}</h1>\n",
        kind.heading(),
        escape_html(prompt)
    ));
    body.push_str(&format!(
        "<p><em>Generated {}</em></p>\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    body.push_str("<h2>Analysis</h2>\n");
    body.push_str(&format!("<div>{}</div>\n", paragraphs(analysis)));

    body.push_str(&format!("<h2>Articles ({})</h2>\n<ol>\n", articles.len()));
    for article in articles {
        body.push_str(&format!(
            "<li><strong>{}</strong> <em>({})</em><br>{}<br><a href=\"{}\">{}</a></li>\n",
            escape_html(&article.title),
            escape_html(&article.source),
            escape_html(&article.snippet),
            escape_html(&article.url),
            escape_html(&article.url),
        ));
    }
    body.push_str("</ol>\n</body></html>\n");
    body
}

/// Plain-text alternative body.
pub fn render_text(
    articles: &[NewArticle],
    analysis: &str,
    prompt: &str,
    kind: ReportKind,
) -> String {
    let mut body = String::new();
    body.push_str(&format!("{} — {prompt}\n", kind.heading()));
    body.push_str(&format!(
        "Generated {}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    body.push_str("ANALYSIS\n--------\n");
    body.push_str(analysis.trim());
    body.push_str(&format!("\n\nARTICLES ({})\n--------\n", articles.len()));

    for (i, article) in articles.iter().enumerate() {
        body.push_str(&format!(
            "{}. {}\n   Source: {}\n   URL: {}\n   {}\n\n",
            i + 1,
            article.title,
            article.source,
            article.url,
            article.snippet
        ));
    }
    body
}

/// HTML body for a cross-period aggregate report: one section per
/// monitoring run, synthesis on top.
pub fn render_aggregate_html(
    article_groups: &[Vec<Article>],
    synthesis: &str,
    prompt: &str,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> String {
    let mut body = String::new();
    body.push_str("<html><body style=\"font-family: sans-serif; max-width: 720px;\">\n");
    body.push_str(&format!(
        "<h1>Aggregate News Report — {}</h1>\n",
        escape_html(prompt)
    ));
    body.push_str(&format!(
        "<p><em>Covering {} to {}</em></p>\n",
        period_start.format("%Y-%m-%d %H:%M UTC"),
        period_end.format("%Y-%m-%d %H:%M UTC")
    ));

    body.push_str("<h2>Synthesis</h2>\n");
    body.push_str(&format!("<div>{}</div>\n", paragraphs(synthesis)));

    for (i, group) in article_groups.iter().enumerate() {
        let run_label = group
            .first()
            .map(|a| a.found_at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        body.push_str(&format!(
            "<h3>Run {} — {run_label}</h3>\n<ul>\n",
            i + 1
        ));
        for article in group {
            body.push_str(&format!(
                "<li><strong>{}</strong> — <a href=\"{}\">{}</a></li>\n",
                escape_html(&article.title),
                escape_html(&article.url),
                escape_html(&article.source),
            ));
        }
        body.push_str("</ul>\n");
    }

    body.push_str("</body></html>\n");
    body
}

fn paragraphs(text: &str) -> String {
    text.trim()
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
