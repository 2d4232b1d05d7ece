//! Data models shared across the pipeline.
//!
//! - [`Category`]: the editorial beat a run covers
//! - [`HistoryEntry`]: one previously published item, persisted to disk
//! - [`CandidateItem`]: a feed entry eligible for selection
//! - [`SelectedTopic`]: a candidate chosen for drafting
//!
//! Only [`HistoryEntry`] outlives a run; everything else is transient.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The editorial beat a feed set and a draft belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tech,
    Bio,
    Patent,
}

impl Category {
    /// Human-readable label used in prompts and email subjects.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Tech => "Tech & IT",
            Category::Bio => "Bio & Healthcare",
            Category::Patent => "Patents & Innovation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Category::Tech => "tech",
            Category::Bio => "bio",
            Category::Patent => "patent",
        };
        f.write_str(slug)
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tech" => Ok(Category::Tech),
            "bio" => Ok(Category::Bio),
            "patent" => Ok(Category::Patent),
            other => Err(ConfigError::UnknownCategory(other.to_string())),
        }
    }
}

/// A previously published item.
///
/// `date` is kept as the raw `YYYY-MM-DD` string from disk so that one bad
/// value only drops its own entry during pruning. Entries are read one by
/// one (see `HistoryStore::load`), so a malformed entry never takes the rest
/// of the file with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Canonical item identifier, usually the article URL.
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub date: String,
}

/// A feed-derived item eligible for selection into a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Canonical item identifier (the entry link, or the feed's own id).
    pub id: String,
    pub title: String,
    pub category: Category,
    /// Scraped body text or feed summary, truncated to the configured cap.
    pub raw_text: String,
}

/// A candidate chosen for drafting. At most two per category per run.
pub type SelectedTopic = CandidateItem;
