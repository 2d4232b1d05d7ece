//! Run configuration.
//!
//! [`AppConfig`] is built once in `main` from the parsed [`Cli`] and an
//! optional YAML [`Settings`] file, then handed to each component. Nothing
//! below `main` reads the process environment.
//!
//! # Settings file
//!
//! Every key is optional; missing keys keep their defaults.
//!
//! ```yaml
//! feeds:
//!   tech:
//!     - https://www.theverge.com/rss/index.xml
//!   bio:
//!     - google_news: "biotech OR \"FDA approval\""
//! schedule:
//!   default: [bio, patent]
//!   days:
//!     mon: [tech]
//! utc_offset_hours: 9
//! raw_text_cap: 3000
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A browser-like identifier; some publishers refuse obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One feed to poll: a literal RSS/Atom URL, or a Google News search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedSource {
    Url(String),
    GoogleNews { google_news: String },
}

impl FeedSource {
    pub fn url(&self) -> String {
        match self {
            FeedSource::Url(url) => url.clone(),
            FeedSource::GoogleNews { google_news } => google_news_search_url(google_news),
        }
    }
}

/// Build an English-edition Google News RSS search URL for `query`.
pub fn google_news_search_url(query: &str) -> String {
    format!(
        "https://news.google.com/rss/search?q={}&hl=en-US&gl=US&ceid=US:en",
        urlencoding::encode(query)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub tech: Vec<FeedSource>,
    pub bio: Vec<FeedSource>,
    pub patent: Vec<FeedSource>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            tech: vec![
                FeedSource::Url("https://www.theverge.com/rss/index.xml".into()),
                FeedSource::Url("https://techcrunch.com/feed/".into()),
            ],
            bio: vec![FeedSource::GoogleNews {
                google_news: "biotech OR \"FDA approval\" OR \"clinical trial\" when:7d".into(),
            }],
            patent: vec![FeedSource::GoogleNews {
                google_news: "patent OR \"patent filing\" OR innovation technology when:7d".into(),
            }],
        }
    }
}

impl FeedSettings {
    pub fn for_category(&self, category: Category) -> &[FeedSource] {
        match category {
            Category::Tech => &self.tech,
            Category::Bio => &self.bio,
            Category::Patent => &self.patent,
        }
    }
}

/// Weekday → categories table as written in the settings file.
///
/// Day keys use chrono's weekday names (`mon`, `Monday`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub default: Vec<Category>,
    pub days: BTreeMap<String, Vec<Category>>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            default: vec![Category::Bio, Category::Patent],
            days: BTreeMap::from([("mon".to_string(), vec![Category::Tech])]),
        }
    }
}

/// Tunables loaded from the optional YAML settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feeds: FeedSettings,
    pub schedule: ScheduleSettings,
    /// Offset of the editorial calendar from UTC; decides "today".
    pub utc_offset_hours: i32,
    /// Feed entries older than this are ignored.
    pub recency_days: i64,
    /// History entries older than this are pruned.
    pub history_retention_days: i64,
    /// How many candidate titles the ranking prompt sees.
    pub max_ranked_candidates: usize,
    /// Character cap on a candidate's raw text.
    pub raw_text_cap: usize,
    /// Scraped text shorter than this falls back to the feed summary.
    pub min_scraped_chars: usize,
    pub scrape_timeout_secs: u64,
    pub feed_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub user_agent: String,
    /// Prepended to every email subject.
    pub subject_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feeds: FeedSettings::default(),
            schedule: ScheduleSettings::default(),
            utc_offset_hours: 9,
            recency_days: 7,
            history_retention_days: 30,
            max_ranked_candidates: 15,
            raw_text_cap: 3000,
            min_scraped_chars: 200,
            scrape_timeout_secs: 5,
            feed_timeout_secs: 20,
            image_timeout_secs: 5,
            llm_timeout_secs: 120,
            user_agent: BROWSER_USER_AGENT.to_string(),
            subject_prefix: "[spo draft]".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub retries: usize,
}

#[derive(Debug, Clone)]
pub struct UnsplashConfig {
    pub base_url: String,
    pub access_key: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub gemini: GeminiConfig,
    pub unsplash: UnsplashConfig,
    pub mail: MailConfig,
    pub history_file: PathBuf,
    pub dry_run: bool,
    /// Categories forced from the command line, replacing the schedule.
    pub categories_override: Option<Vec<Category>>,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let settings = match &cli.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        let categories_override = if cli.categories.is_empty() {
            None
        } else {
            Some(
                cli.categories
                    .iter()
                    .map(|c| c.parse::<Category>())
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        Ok(Self {
            settings,
            gemini: GeminiConfig {
                base_url: cli.gemini_base_url.clone(),
                model: cli.gemini_model.clone(),
                api_key: cli.gemini_api_key.clone(),
                retries: cli.llm_retries,
            },
            unsplash: UnsplashConfig {
                base_url: cli.unsplash_base_url.clone(),
                access_key: cli.unsplash_access_key.clone(),
            },
            mail: MailConfig {
                smtp_host: cli.smtp_host.clone(),
                smtp_port: cli.smtp_port,
                username: cli.mail_user.clone(),
                password: cli.mail_password.clone(),
                from: cli.mail_user.clone(),
                to: cli.mail_to.clone().unwrap_or_else(|| cli.mail_user.clone()),
            },
            history_file: cli.history_file.clone(),
            dry_run: cli.dry_run,
            categories_override,
        })
    }
}
