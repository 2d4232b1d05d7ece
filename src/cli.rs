//! Command-line interface definitions for Feed Drafter.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets and endpoints can be provided via flags or environment variables
//! (a `.env` file in the working directory is loaded first).

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Feed Drafter application.
///
/// # Examples
///
/// ```sh
/// # Scheduled run: categories follow the day of week (UTC+9)
/// feed_drafter
///
/// # Draft only the patent post, without sending mail or touching history
/// feed_drafter --category patent --dry-run
///
/// # Custom feeds and schedule
/// feed_drafter --config settings.yaml --history-file /var/lib/feed_drafter/history.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file (feeds, schedule, limits)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file holding the rolling history of published items
    #[arg(long, env = "HISTORY_FILE", default_value = "history.json")]
    pub history_file: PathBuf,

    /// Run these categories instead of the day's schedule (tech, bio, patent)
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// Draft but do not send mail or update history
    #[arg(long)]
    pub dry_run: bool,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    pub gemini_api_key: String,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash")]
    pub gemini_model: String,

    /// Gemini API root
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_base_url: String,

    /// Extra attempts after a failed model call (0 = fail on first error)
    #[arg(long, env = "LLM_RETRIES", default_value_t = 0)]
    pub llm_retries: usize,

    /// Unsplash access key
    #[arg(long, env = "UNSPLASH_ACCESS_KEY", hide_env_values = true, default_value = "")]
    pub unsplash_access_key: String,

    /// Unsplash API root
    #[arg(long, env = "UNSPLASH_BASE_URL", default_value = "https://api.unsplash.com")]
    pub unsplash_base_url: String,

    /// Sender address, also used as the SMTP login
    #[arg(long, env = "GMAIL_USER", default_value = "")]
    pub mail_user: String,

    /// SMTP password (a Gmail app password)
    #[arg(long, env = "GMAIL_APP_PASSWORD", hide_env_values = true, default_value = "")]
    pub mail_password: String,

    /// Recipient address (defaults to the sender)
    #[arg(long, env = "MAIL_TO")]
    pub mail_to: Option<String>,

    /// SMTP relay host (implicit TLS)
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    /// SMTP relay port
    #[arg(long, env = "SMTP_PORT", default_value_t = 465)]
    pub smtp_port: u16,
}
