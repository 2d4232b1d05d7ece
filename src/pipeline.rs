//! Orchestration of one scheduled run.
//!
//! A run loads the history once, then processes each scheduled category in
//! order:
//!
//! ```text
//! collect → select two → write draft → inject images → email
//! ```
//!
//! A drafting failure aborts only its own category. Topics from every
//! category that produced a pair are written back to the history once, at
//! the end, stamped with the editorial (UTC+9) date.

use crate::api::AskAsync;
use crate::error::PipelineError;
use crate::generator::write_draft;
use crate::history::{DATE_FORMAT, HistoryStore};
use crate::images::{ImageSearch, inject_images};
use crate::models::{Category, HistoryEntry, SelectedTopic};
use crate::notifier::Notifier;
use crate::schedule::Schedule;
use crate::scrapers::CandidateSource;
use crate::selector::{Selection, select_two};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one category in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// Nothing to draft (fewer than two fresh candidates).
    Skipped { reason: String },
    /// Drafting failed; nothing was sent or recorded.
    Failed { error: String },
    /// A draft was produced. `delivered` is false when the email failed or
    /// the run is a dry run.
    Drafted {
        topics: Vec<SelectedTopic>,
        delivered: bool,
    },
}

impl CategoryOutcome {
    /// Topics the category published; empty unless a draft was produced.
    pub fn topics(&self) -> &[SelectedTopic] {
        match self {
            CategoryOutcome::Drafted { topics, .. } => topics,
            CategoryOutcome::Skipped { .. } | CategoryOutcome::Failed { .. } => &[],
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<(Category, CategoryOutcome)>,
    /// The history as written, or `None` when nothing was written.
    pub history_written: Option<Vec<HistoryEntry>>,
}

/// Run-level switches that don't belong to any one component.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_ranked_candidates: usize,
    pub dry_run: bool,
    /// Replaces the schedule when set.
    pub categories_override: Option<Vec<Category>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_ranked_candidates: 15,
            dry_run: false,
            categories_override: None,
        }
    }
}

/// The wired-up pipeline. Generic over every external seam.
pub struct Pipeline<S, L, I, N> {
    source: S,
    llm: L,
    images: I,
    notifier: N,
    schedule: Schedule,
    history: HistoryStore,
    options: PipelineOptions,
}

impl<S, L, I, N> Pipeline<S, L, I, N>
where
    S: CandidateSource,
    L: AskAsync,
    I: ImageSearch,
    N: Notifier,
{
    pub fn new(
        source: S,
        llm: L,
        images: I,
        notifier: N,
        schedule: Schedule,
        history: HistoryStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            llm,
            images,
            notifier,
            schedule,
            history,
            options,
        }
    }

    /// Process every category due at `now` and persist the history.
    #[instrument(level = "info", skip_all, fields(dry_run = self.options.dry_run))]
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let previous = self.history.load().await;
        let today = self.schedule.local_date(now);
        let stamp = today.format(DATE_FORMAT).to_string();

        let categories: Vec<Category> = match &self.options.categories_override {
            Some(categories) => categories.clone(),
            None => self.schedule.categories_for(now).to_vec(),
        };
        info!(%today, categories = ?categories, "Starting run");

        // Items drafted earlier in this run count as history for later categories.
        let mut seen = previous.clone();
        let mut published: Vec<SelectedTopic> = Vec::new();
        let mut outcomes = Vec::with_capacity(categories.len());

        for category in categories {
            let t0 = Instant::now();
            let outcome = match self.process_and_send(category, &seen, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%category, error = %e, "Category failed");
                    CategoryOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            info!(%category, elapsed_ms = t0.elapsed().as_millis(), outcome = outcome_kind(&outcome), "Category finished");

            let topics = outcome.topics();
            seen.extend(topics.iter().map(|t| HistoryEntry {
                id: t.id.clone(),
                title: t.title.clone(),
                date: stamp.clone(),
            }));
            published.extend(topics.iter().cloned());
            outcomes.push((category, outcome));
        }

        let history_written = if self.options.dry_run {
            info!(would_add = published.len(), "Dry run; history not written");
            None
        } else {
            match self.history.save(&previous, &published, today).await {
                Ok(entries) => Some(entries),
                Err(e) => {
                    error!(path = %self.history.path().display(), error = %e, "Failed to write history");
                    None
                }
            }
        };

        RunReport {
            outcomes,
            history_written,
        }
    }

    /// Collect, select, draft, illustrate and send one category.
    ///
    /// [`CategoryOutcome::topics`] is the published pair, or empty when
    /// fewer than two fresh candidates were available (nothing is sent in
    /// that case). A failed email still counts as published. Drafting
    /// failures are returned as errors.
    #[instrument(level = "info", skip_all, fields(category = %category))]
    pub async fn process_and_send(
        &self,
        category: Category,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<CategoryOutcome, PipelineError> {
        let label = category.label();
        let candidates = self.source.get_candidates(category, now).await;

        let [topic1, topic2] = match select_two(
            candidates,
            history,
            label,
            self.options.max_ranked_candidates,
            &self.llm,
        )
        .await
        {
            Selection::Ranked(pair) | Selection::Fallback(pair) => pair,
            Selection::Insufficient(left) => {
                warn!(fresh = left.len(), "Not enough fresh candidates; skipping");
                return Ok(CategoryOutcome::Skipped {
                    reason: format!("only {} fresh candidate(s)", left.len()),
                });
            }
        };
        info!(first = %topic1.title, second = %topic2.title, "Topics selected");

        let draft = write_draft(&topic1, &topic2, label, &self.llm).await?;
        let html = inject_images(&draft, &topic1, &topic2, &self.llm, &self.images).await;
        let subject = format!("{label}: {} / {}", topic1.title, topic2.title);

        let delivered = if self.options.dry_run {
            info!(%subject, chars = html.len(), "Dry run; email not sent");
            debug!(%html, "Rendered draft");
            false
        } else {
            match self.notifier.send(&subject, &html).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(%subject, error = %e, "Email failed; draft still counts as published");
                    false
                }
            }
        };

        Ok(CategoryOutcome::Drafted {
            topics: vec![topic1, topic2],
            delivered,
        })
    }
}

fn outcome_kind(outcome: &CategoryOutcome) -> &'static str {
    match outcome {
        CategoryOutcome::Skipped { .. } => "skipped",
        CategoryOutcome::Failed { .. } => "failed",
        CategoryOutcome::Drafted { delivered: true, .. } => "delivered",
        CategoryOutcome::Drafted { delivered: false, .. } => "drafted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedLlm;
    use crate::draft::has_unresolved_markers;
    use crate::error::{ImageError, MailError};
    use crate::images::Photo;
    use crate::models::CandidateItem;
    use chrono::{Duration, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    struct FakeSource {
        by_category: HashMap<Category, Vec<CandidateItem>>,
        calls: Mutex<Vec<Category>>,
    }

    impl FakeSource {
        fn new(entries: &[(Category, &[&str])]) -> Self {
            let by_category = entries
                .iter()
                .map(|(category, names)| {
                    let items = names
                        .iter()
                        .map(|name| CandidateItem {
                            id: format!("https://x.com/{name}"),
                            title: name.to_uppercase(),
                            category: *category,
                            raw_text: format!("text about {name}"),
                        })
                        .collect();
                    (*category, items)
                })
                .collect();
            Self {
                by_category,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CandidateSource for FakeSource {
        async fn get_candidates(&self, category: Category, _now: DateTime<Utc>) -> Vec<CandidateItem> {
            self.calls.lock().unwrap().push(category);
            self.by_category.get(&category).cloned().unwrap_or_default()
        }
    }

    struct FakeImages;

    impl ImageSearch for FakeImages {
        async fn search(&self, keyword: &str, count: usize) -> Result<Vec<Photo>, ImageError> {
            Ok((0..count)
                .map(|n| Photo {
                    url: format!("https://img.test/{keyword}-{n}.jpg"),
                    alt: keyword.to_string(),
                    author: "Ann".into(),
                    author_url: "https://unsplash.com/@ann".into(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for FakeNotifier {
        async fn send(&self, subject: &str, html: &str) -> Result<(), MailError> {
            self.sent.lock().unwrap().push((subject.to_string(), html.to_string()));
            if self.fail {
                Err(MailError::MissingCredentials)
            } else {
                Ok(())
            }
        }
    }

    fn llm() -> ScriptedLlm {
        ScriptedLlm::new()
            .reply("exactly two", "0, 1")
            .reply("short outline", "- outline")
            .reply("FIRST HALF", "<h1>Post</h1>[IMAGE_1]<p>one</p>[IMAGE_2]")
            .reply("SECOND HALF", "<p>two</p>[IMAGE_3]<p>end</p>[IMAGE_4]")
            .reply("stock-photo", "robot")
    }

    fn temp_history() -> PathBuf {
        std::env::temp_dir().join(format!("feed_drafter_pipeline_{}.json", rand::random::<u64>()))
    }

    /// 2025-05-05 is a Monday in UTC+9 (and a Sunday evening in UTC).
    fn monday_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 4, 16, 0, 0).unwrap()
    }

    fn tuesday_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 1, 0, 0).unwrap()
    }

    fn pipeline<'a>(
        source: &'a FakeSource,
        llm: &'a ScriptedLlm,
        notifier: &'a FakeNotifier,
        path: &Path,
        options: PipelineOptions,
    ) -> Pipeline<&'a FakeSource, &'a ScriptedLlm, FakeImages, &'a FakeNotifier> {
        Pipeline::new(
            source,
            llm,
            FakeImages,
            notifier,
            Schedule::default(),
            HistoryStore::new(path, 30),
            options,
        )
    }

    #[tokio::test]
    async fn test_end_to_end_history_example() {
        let path = temp_history();
        let today = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        let old = today - Duration::days(40);
        std::fs::write(
            &path,
            format!(r#"[{{"id":"https://x.com/a","title":"A","date":"{}"}}]"#, old.format(DATE_FORMAT)),
        )
        .unwrap();

        let source = FakeSource::new(&[(Category::Bio, &["b", "c"])]);
        let llm = llm();
        let notifier = FakeNotifier::default();
        let report = pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .run(tuesday_utc())
            .await;

        let saved: Vec<HistoryEntry> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            saved,
            vec![
                HistoryEntry {
                    id: "https://x.com/b".into(),
                    title: "B".into(),
                    date: "2025-05-06".into()
                },
                HistoryEntry {
                    id: "https://x.com/c".into(),
                    title: "C".into(),
                    date: "2025-05-06".into()
                },
            ]
        );
        assert_eq!(report.history_written, Some(saved));

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Bio & Healthcare: B / C");
        assert!(sent[0].1.contains("https://img.test/robot-3.jpg"));
        assert!(!has_unresolved_markers(&sent[0].1));
        assert!(matches!(
            report.outcomes[1],
            (Category::Patent, CategoryOutcome::Skipped { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_monday_runs_only_tech() {
        let path = temp_history();
        let source = FakeSource::new(&[(Category::Tech, &["t1", "t2"]), (Category::Bio, &["b1", "b2"])]);
        let llm = llm();
        let notifier = FakeNotifier::default();
        let report = pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .run(monday_utc())
            .await;

        assert_eq!(*source.calls.lock().unwrap(), vec![Category::Tech]);
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(
            &report.outcomes[0],
            (Category::Tech, CategoryOutcome::Drafted { delivered: true, .. })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_other_days_run_bio_then_patent() {
        let path = temp_history();
        let source = FakeSource::new(&[]);
        let llm = llm();
        let notifier = FakeNotifier::default();
        pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .run(tuesday_utc())
            .await;

        assert_eq!(*source.calls.lock().unwrap(), vec![Category::Bio, Category::Patent]);
        assert!(notifier.sent.lock().unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_short_circuit_sends_nothing() {
        let path = temp_history();
        let source = FakeSource::new(&[(Category::Bio, &["a", "b"])]);
        let llm = llm();
        let notifier = FakeNotifier::default();
        let history = vec![HistoryEntry {
            id: "https://x.com/a".into(),
            title: "A".into(),
            date: "2025-05-01".into(),
        }];

        let outcome = pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .process_and_send(Category::Bio, &history, tuesday_utc())
            .await
            .unwrap();

        assert!(outcome.topics().is_empty());
        assert!(matches!(outcome, CategoryOutcome::Skipped { .. }));
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_isolated_to_its_category() {
        let path = temp_history();
        let source = FakeSource::new(&[(Category::Bio, &["b1", "b2"]), (Category::Patent, &["p1", "p2"])]);
        let llm = ScriptedLlm::new()
            .fail("Bio & Healthcare analyst writing the FIRST HALF")
            .reply("exactly two", "0, 1")
            .reply("short outline", "- outline")
            .reply("FIRST HALF", "<p>one</p>[IMAGE_1]")
            .reply("SECOND HALF", "<p>two</p>[IMAGE_3]")
            .reply("stock-photo", "gear");
        let notifier = FakeNotifier::default();

        let report = pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .run(tuesday_utc())
            .await;

        assert!(matches!(report.outcomes[0], (Category::Bio, CategoryOutcome::Failed { .. })));
        assert!(matches!(
            report.outcomes[1],
            (Category::Patent, CategoryOutcome::Drafted { delivered: true, .. })
        ));
        let ids: Vec<String> = report.history_written.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["https://x.com/p1", "https://x.com/p2"]);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_mail_failure_still_records_topics() {
        let path = temp_history();
        let source = FakeSource::new(&[(Category::Bio, &["b1", "b2"])]);
        let llm = llm();
        let notifier = FakeNotifier {
            fail: true,
            ..Default::default()
        };

        let report = pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .run(tuesday_utc())
            .await;

        assert!(matches!(
            report.outcomes[0],
            (Category::Bio, CategoryOutcome::Drafted { delivered: false, .. })
        ));
        assert_eq!(report.history_written.map(|h| h.len()), Some(2));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_dry_run_skips_email_and_history() {
        let path = temp_history();
        let source = FakeSource::new(&[(Category::Tech, &["t1", "t2"])]);
        let llm = llm();
        let notifier = FakeNotifier::default();
        let options = PipelineOptions {
            dry_run: true,
            categories_override: Some(vec![Category::Tech]),
            ..Default::default()
        };

        let report = pipeline(&source, &llm, &notifier, &path, options)
            .run(tuesday_utc())
            .await;

        assert_eq!(*source.calls.lock().unwrap(), vec![Category::Tech]);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert_eq!(report.history_written, None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_same_item_is_not_drafted_twice_in_one_run() {
        let path = temp_history();
        let source = FakeSource::new(&[(Category::Bio, &["x", "y"]), (Category::Patent, &["x", "y", "z"])]);
        let llm = llm();
        let notifier = FakeNotifier::default();

        let report = pipeline(&source, &llm, &notifier, &path, PipelineOptions::default())
            .run(tuesday_utc())
            .await;

        assert!(matches!(report.outcomes[1], (Category::Patent, CategoryOutcome::Skipped { .. })));
        assert_eq!(report.history_written.map(|h| h.len()), Some(2));
        let _ = std::fs::remove_file(&path);
    }
}
