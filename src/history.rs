//! Rolling history of published items, persisted as a JSON file.
//!
//! The history is read once at the start of a run for deduplication and
//! written once at the end. Reads fail soft: a missing or corrupt file is an
//! empty history. Writes go through a sibling temp file and a rename so a
//! crash mid-write leaves the previous file intact.
//!
//! # File format
//!
//! ```text
//! [
//!   { "id": "https://example.com/a", "title": "A", "date": "2025-05-06" }
//! ]
//! ```

use crate::models::{HistoryEntry, SelectedTopic};
use chrono::{NaiveDate, TimeDelta};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Date format used for `HistoryEntry::date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// JSON-file backed history of published items.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    retention_days: i64,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            path: path.into(),
            retention_days,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history, returning an empty list when the file is absent,
    /// unreadable, or not a JSON array. Array elements that are not valid
    /// entries (a `null` date, a missing id) are dropped individually.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Vec<HistoryEntry> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No history file yet; starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "History file unreadable; treating as empty");
                return Vec::new();
            }
        };

        let values = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "History file is corrupt; treating as empty");
                return Vec::new();
            }
        };

        let total = values.len();
        let entries: Vec<HistoryEntry> = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<HistoryEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed history entry");
                    None
                }
            })
            .collect();
        info!(count = entries.len(), dropped = total - entries.len(), "Loaded history");
        entries
    }

    /// Prune `previous`, append `published` stamped with `today`, and write
    /// the result atomically. Returns the entries that were written.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn save(
        &self,
        previous: &[HistoryEntry],
        published: &[SelectedTopic],
        today: NaiveDate,
    ) -> io::Result<Vec<HistoryEntry>> {
        let mut entries = prune(previous, today, self.retention_days);
        let kept = entries.len();
        let stamp = today.format(DATE_FORMAT).to_string();
        entries.extend(published.iter().map(|topic| HistoryEntry {
            id: topic.id.clone(),
            title: topic.title.clone(),
            date: stamp.clone(),
        }));

        let json = serde_json::to_string_pretty(&entries)?;
        write_atomically(&self.path, json.as_bytes()).await?;

        info!(
            pruned = previous.len() - kept,
            kept,
            added = published.len(),
            "Saved history"
        );
        Ok(entries)
    }
}

/// Keep the entries dated on or after `today - retention_days`.
///
/// Entries whose date does not parse as `YYYY-MM-DD` are dropped.
pub fn prune(entries: &[HistoryEntry], today: NaiveDate, retention_days: i64) -> Vec<HistoryEntry> {
    let cutoff = TimeDelta::try_days(retention_days)
        .and_then(|window| today.checked_sub_signed(window))
        .unwrap_or(NaiveDate::MIN);
    entries
        .iter()
        .filter(|entry| match NaiveDate::parse_from_str(&entry.date, DATE_FORMAT) {
            Ok(date) => date >= cutoff,
            Err(e) => {
                debug!(id = %entry.id, date = %entry.date, error = %e, "Dropping history entry with bad date");
                false
            }
        })
        .cloned()
        .collect()
}

async fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        let suffix: u64 = rand::random();
        std::env::temp_dir()
            .join(format!("feed_drafter_{}_{:x}", name, suffix))
            .join("history.json")
    }

    fn entry(id: &str, date: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            title: id.to_uppercase(),
            date: date.to_string(),
        }
    }

    fn topic(id: &str) -> SelectedTopic {
        SelectedTopic {
            id: id.to_string(),
            title: format!("Title of {}", id),
            category: Category::Tech,
            raw_text: String::new(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_prune_keeps_entries_on_the_cutoff() {
        let today = day("2025-06-30");
        let entries = vec![
            entry("old", "2025-05-30"),
            entry("edge", "2025-05-31"),
            entry("new", "2025-06-29"),
        ];
        let kept = prune(&entries, today, 30);
        let ids: Vec<_> = kept.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["edge", "new"]);
    }

    #[test]
    fn test_prune_drops_unparsable_dates() {
        let today = day("2025-06-30");
        let entries = vec![
            entry("a", "yesterday"),
            entry("b", "2025/06/29"),
            entry("c", ""),
            entry("d", "2025-06-29"),
        ];
        let kept = prune(&entries, today, 30);
        assert_eq!(kept, vec![entry("d", "2025-06-29")]);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let store = HistoryStore::new(temp_path("missing"), 30);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let store = HistoryStore::new(&path, 30);
        assert!(store.load().await.is_empty());

        std::fs::write(&path, r#"{"id": "object, not array"}"#).unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_entry_does_not_lose_the_rest() {
        let path = temp_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[
  {"id": "https://x.com/keep", "title": "Keep", "date": "2025-06-25"},
  {"id": "https://x.com/bad", "title": "Bad", "date": null},
  {"id": "https://x.com/untitled", "date": "2025-06-26"},
  42
]"#,
        )
        .unwrap();
        let store = HistoryStore::new(&path, 30);

        let loaded = store.load().await;
        let ids: Vec<_> = loaded.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["https://x.com/keep", "https://x.com/untitled"]);
        assert_eq!(loaded[1].title, "");

        let written = store
            .save(&loaded, &[topic("https://x.com/new")], day("2025-06-30"))
            .await
            .unwrap();
        let ids: Vec<_> = written.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["https://x.com/keep", "https://x.com/untitled", "https://x.com/new"]
        );
    }

    #[test]
    fn test_prune_with_huge_retention_keeps_everything() {
        let entries = vec![entry("ancient", "1970-01-01"), entry("new", "2025-06-29")];
        assert_eq!(prune(&entries, day("2025-06-30"), i64::MAX), entries);
    }

    #[tokio::test]
    async fn test_save_prunes_appends_and_round_trips() {
        let path = temp_path("save");
        let store = HistoryStore::new(&path, 30);
        let today = day("2025-06-30");
        let previous = vec![
            entry("https://x.com/a", "2025-05-21"),
            entry("https://x.com/keep", "2025-06-20"),
            entry("https://x.com/bad", "not-a-date"),
        ];

        let written = store
            .save(&previous, &[topic("https://x.com/b"), topic("https://x.com/c")], today)
            .await
            .unwrap();

        let ids: Vec<_> = written.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["https://x.com/keep", "https://x.com/b", "https://x.com/c"]);
        assert_eq!(written[1].date, "2025-06-30");
        assert_eq!(written[2].title, "Title of https://x.com/c");

        assert_eq!(store.load().await, written);
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
    }
}
