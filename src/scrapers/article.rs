//! Article body scraper.
//!
//! Dereferences a feed entry's link and pulls the text of its `<p>`
//! elements. Many publishers (and Google News redirect pages) return little
//! or nothing useful; callers decide what counts as too short.

use crate::error::FeedError;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));

/// Fetch `url` and return its paragraph text, one paragraph per line.
///
/// The `client` carries the browser-like `User-Agent` and the short scrape
/// timeout.
#[instrument(level = "debug", skip_all, fields(%url))]
pub async fn scrape_paragraphs(client: &reqwest::Client, url: &str) -> Result<String, FeedError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::HttpStatus(status.as_u16()));
    }
    let body = resp.text().await?;
    let text = extract_paragraphs(&body);
    debug!(bytes = text.len(), "Scraped article paragraphs");
    Ok(text)
}

/// Join the non-empty `<p>` texts of an HTML document.
pub fn extract_paragraphs(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&PARAGRAPH)
        .map(|p| p.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce an HTML fragment (e.g. a feed summary) to plain text.
pub fn html_to_text(fragment: &str) -> String {
    let fragment = Html::parse_fragment(fragment);
    fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
