//! RSS/Atom feed download and parsing.
//!
//! Parsing goes through `feed-rs`, which handles RSS 0.9x/1.0/2.0, Atom and
//! JSON Feed alike. Only entries from the recency window are returned;
//! entries carrying no date at all are kept.

use crate::error::FeedError;
use crate::scrapers::article::html_to_text;
use chrono::{DateTime, TimeDelta, Utc};
use feed_rs::parser;
use tracing::{debug, instrument};

/// The parts of a feed entry the collector needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// The entry link when present, otherwise the feed's own entry id.
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    /// Summary or content, reduced to plain text.
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Download the raw feed document.
#[instrument(level = "debug", skip_all, fields(%url))]
pub async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FeedError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::HttpStatus(status.as_u16()));
    }
    let bytes = resp.bytes().await?;
    debug!(bytes = bytes.len(), "Downloaded feed");
    Ok(bytes.to_vec())
}

/// Parse a feed document and keep the entries published within
/// `recency_days` of `now`.
pub fn parse_recent(bytes: &[u8], now: DateTime<Utc>, recency_days: i64) -> Result<Vec<FeedEntry>, FeedError> {
    let feed = parser::parse(bytes)?;
    let cutoff = TimeDelta::try_days(recency_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let total = feed.entries.len();

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry.published.or(entry.updated);
            if published.is_some_and(|p| p < cutoff) {
                return None;
            }
            let link = entry.links.first().map(|l| l.href.clone());
            let title = entry
                .title
                .map(|t| html_to_text(&t.content))
                .filter(|t| !t.is_empty())?;
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|s| html_to_text(&s))
                .filter(|s| !s.is_empty());
            let id = match &link {
                Some(link) => link.clone(),
                None if !entry.id.trim().is_empty() => entry.id.trim().to_string(),
                None => return None,
            };
            Some(FeedEntry {
                id,
                title,
                link,
                summary,
                published,
            })
        })
        .collect();

    debug!(total, recent = entries.len(), "Parsed feed entries");
    Ok(entries)
}
