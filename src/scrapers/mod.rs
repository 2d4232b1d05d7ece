//! Candidate collection from news feeds.
//!
//! Collection follows a two-phase pattern per feed:
//!
//! 1. **Indexing**: download and parse the feed, keeping the last week's entries
//! 2. **Fetching**: scrape each entry's link for body paragraphs, falling back
//!    to the feed summary (or the title) when the page yields too little
//!
//! # Default Sources
//!
//! | Category | Sources |
//! |----------|---------|
//! | Tech | The Verge, TechCrunch RSS |
//! | Bio | Google News search: biotech, FDA approval, clinical trial |
//! | Patent | Google News search: patents, innovation |
//!
//! Failures are logged and skipped: a broken feed yields no candidates and a
//! broken article yields its fallback text. Nothing here aborts a run.

pub mod article;
pub mod feed;

use crate::config::Settings;
use crate::models::{CandidateItem, Category};
use crate::utils::truncate_chars;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Anything that can produce candidates for a category.
pub trait CandidateSource {
    async fn get_candidates(&self, category: Category, now: DateTime<Utc>) -> Vec<CandidateItem>;
}

impl<T: CandidateSource> CandidateSource for &T {
    async fn get_candidates(&self, category: Category, now: DateTime<Utc>) -> Vec<CandidateItem> {
        (**self).get_candidates(category, now).await
    }
}

/// Collects candidates from the configured feeds over HTTP.
#[derive(Debug, Clone)]
pub struct FeedCollector {
    feed_client: reqwest::Client,
    scrape_client: reqwest::Client,
    settings: Settings,
}

impl FeedCollector {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let feed_client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.feed_timeout_secs))
            .build()?;
        let scrape_client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.scrape_timeout_secs))
            .build()?;
        Ok(Self {
            feed_client,
            scrape_client,
            settings,
        })
    }

    /// Fetch one feed and turn its recent entries into candidates.
    ///
    /// Scrape failures fall back to the summary or title; only download and
    /// parse failures are returned as errors.
    #[instrument(level = "info", skip_all, fields(%url, %category))]
    pub async fn fetch_feed(
        &self,
        url: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateItem>, crate::error::FeedError> {
        let bytes = feed::download(&self.feed_client, url).await?;
        let entries = feed::parse_recent(&bytes, now, self.settings.recency_days)?;

        let candidates: Vec<CandidateItem> = stream::iter(entries)
            .then(|entry| async move {
                let scraped = match entry.link.as_deref() {
                    Some(link) => match article::scrape_paragraphs(&self.scrape_client, link).await {
                        Ok(text) if text.chars().count() >= self.settings.min_scraped_chars => Some(text),
                        Ok(text) => {
                            debug!(%link, chars = text.chars().count(), "Scraped text too short; using feed summary");
                            None
                        }
                        Err(e) => {
                            warn!(%link, error = %e, "Scrape failed; using feed summary");
                            None
                        }
                    },
                    None => None,
                };
                let text = scraped
                    .or(entry.summary)
                    .unwrap_or_else(|| entry.title.clone());
                CandidateItem {
                    id: entry.id,
                    title: entry.title,
                    category,
                    raw_text: truncate_chars(&text, self.settings.raw_text_cap),
                }
            })
            .collect()
            .await;

        info!(count = candidates.len(), "Collected feed candidates");
        Ok(candidates)
    }
}

impl CandidateSource for FeedCollector {
    #[instrument(level = "info", skip_all, fields(category = %category))]
    async fn get_candidates(&self, category: Category, now: DateTime<Utc>) -> Vec<CandidateItem> {
        let mut all = Vec::new();
        for source in self.settings.feeds.for_category(category) {
            let url = source.url();
            match self.fetch_feed(&url, category, now).await {
                Ok(items) => all.extend(items),
                Err(e) => warn!(%url, error = %e, "Feed failed; skipping"),
            }
        }
        let candidates: Vec<CandidateItem> = all.into_iter().unique_by(|c| c.id.clone()).collect();
        info!(count = candidates.len(), "Total candidates for category");
        candidates
    }
}
