//! # Feed Drafter
//!
//! A scheduled content pipeline that turns the week's news into a blog post
//! draft and mails it to an editor for manual publishing.
//!
//! ## Features
//!
//! - Collects recent items from RSS/Atom feeds per category (Tech, Bio,
//!   Patents), scraping article paragraphs where the page allows
//! - Lets a hosted language model (Gemini) pick the two most newsworthy items
//!   and draft a two-part HTML post
//! - Fills the draft's image slots with Unsplash photos
//! - Emails the result as source plus live preview
//! - Skips anything already covered in the last 30 days
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... UNSPLASH_ACCESS_KEY=... GMAIL_USER=... GMAIL_APP_PASSWORD=... feed_drafter
//! ```
//!
//! ## Architecture
//!
//! Each run is strictly sequential:
//! 1. **Schedule**: Pick the day's categories (Monday → Tech, otherwise Bio then Patents, UTC+9)
//! 2. **Collection**: Fetch feeds and scrape article text
//! 3. **Selection**: Drop history items and rank the rest with the model
//! 4. **Drafting**: Outline, first half, second half
//! 5. **Enrichment & delivery**: Inject photos and send the email
//! 6. **History**: Record the published items once, at the end

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod draft;
mod error;
mod generator;
mod history;
mod images;
mod models;
mod notifier;
mod pipeline;
mod schedule;
mod scrapers;
mod selector;
mod utils;

use api::{GeminiClient, RetryAsk};
use cli::Cli;
use config::AppConfig;
use history::HistoryStore;
use images::UnsplashClient;
use notifier::EmailNotifier;
use pipeline::{CategoryOutcome, Pipeline, PipelineOptions};
use schedule::Schedule;
use scrapers::FeedCollector;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // Secrets usually live in a .env next to the binary.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: could not load .env: {e}");
        }
    }

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed_drafter starting up");

    let args = Cli::parse();
    let config = AppConfig::from_cli(&args)?;
    debug!(
        history_file = %config.history_file.display(),
        model = %config.gemini.model,
        dry_run = config.dry_run,
        "Resolved configuration"
    );

    if config.gemini.api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set; every model call will fail");
    }
    if config.unsplash.access_key.is_empty() {
        warn!("UNSPLASH_ACCESS_KEY is not set; drafts will have no photos");
    }
    if !config.dry_run && (config.mail.username.is_empty() || config.mail.password.is_empty()) {
        warn!("Mail credentials are not set; drafts will not be delivered");
    }

    let settings = &config.settings;

    let llm_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.llm_timeout_secs))
        .build()?;
    let llm = RetryAsk::new(
        GeminiClient::new(
            llm_http,
            &config.gemini.base_url,
            &config.gemini.model,
            &config.gemini.api_key,
        ),
        config.gemini.retries,
        Duration::from_secs(1),
    );

    let image_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.image_timeout_secs))
        .build()?;
    let images = UnsplashClient::new(image_http, &config.unsplash.base_url, &config.unsplash.access_key);

    let notifier = EmailNotifier::new(config.mail.clone(), &settings.subject_prefix);
    let collector = FeedCollector::new(settings.clone())?;
    let schedule = Schedule::from_settings(&settings.schedule, settings.utc_offset_hours);
    let history = HistoryStore::new(config.history_file.clone(), settings.history_retention_days);

    let pipeline = Pipeline::new(
        collector,
        llm,
        images,
        notifier,
        schedule,
        history,
        PipelineOptions {
            max_ranked_candidates: settings.max_ranked_candidates,
            dry_run: config.dry_run,
            categories_override: config.categories_override.clone(),
        },
    );

    let report = pipeline.run(Utc::now()).await;

    let drafted = report
        .outcomes
        .iter()
        .filter(|(_, o)| matches!(o, CategoryOutcome::Drafted { .. }))
        .count();
    let delivered = report
        .outcomes
        .iter()
        .filter(|(_, o)| matches!(o, CategoryOutcome::Drafted { delivered: true, .. }))
        .count();

    info!(
        categories = report.outcomes.len(),
        drafted,
        delivered,
        history_entries = report.history_written.as_ref().map(Vec::len),
        elapsed_s = start_time.elapsed().as_secs_f64(),
        "feed_drafter finished"
    );

    Ok(())
}
