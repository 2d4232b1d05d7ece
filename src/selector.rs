//! Topic selection: deduplicate against history, then let the model pick two.
//!
//! The model only ever sees a numbered list of titles and is asked for two
//! 0-based indices. Its reply is free text, so every integer is pulled out
//! and the first two are used. Anything unusable (a failed call, fewer than
//! two integers, an index outside the numbered list, the same index twice)
//! falls back to the first two remaining candidates.

use crate::api::AskAsync;
use crate::models::{CandidateItem, HistoryEntry, SelectedTopic};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("static regex"));

/// Outcome of [`select_two`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Fewer than two candidates survived deduplication; nothing to draft.
    Insufficient(Vec<SelectedTopic>),
    /// The model's pick.
    Ranked([SelectedTopic; 2]),
    /// The first two candidates, because the model's answer was unusable.
    Fallback([SelectedTopic; 2]),
}

/// Pick at most two candidates not already present in `history`.
///
/// # Arguments
///
/// * `candidates` - Collected candidates, in feed order
/// * `history` - Previously published items
/// * `category_label` - Used in the ranking prompt
/// * `max_ranked` - How many titles the model is shown
#[instrument(level = "info", skip_all, fields(category = %category_label))]
pub async fn select_two<L: AskAsync>(
    candidates: Vec<CandidateItem>,
    history: &[HistoryEntry],
    category_label: &str,
    max_ranked: usize,
    llm: &L,
) -> Selection {
    let seen: HashSet<&str> = history.iter().map(|h| h.id.as_str()).collect();
    let total = candidates.len();
    let mut fresh: Vec<CandidateItem> = candidates
        .into_iter()
        .filter(|c| !seen.contains(c.id.as_str()))
        .collect();
    info!(total, fresh = fresh.len(), "Filtered candidates against history");

    if fresh.len() < 2 {
        return Selection::Insufficient(fresh);
    }

    let window = fresh.len().min(max_ranked);
    let prompt = ranking_prompt(&fresh[..window], category_label);

    let picked = match llm.ask(&prompt).await {
        Ok(reply) => match valid_pair(&parse_indices(&reply), window) {
            Some(pair) => Some(pair),
            None => {
                warn!(reply = %truncate_for_log(&reply, 200), "Unusable ranking reply; falling back to first two");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "Ranking call failed; falling back to first two");
            None
        }
    };

    match picked {
        Some((a, b)) => {
            info!(first = a, second = b, "Model picked topics");
            // Take the higher index first so the lower one stays in place.
            let (hi, lo) = if a > b { (a, b) } else { (b, a) };
            let hi_item = fresh.swap_remove(hi);
            let lo_item = fresh.swap_remove(lo);
            if a > b {
                Selection::Ranked([hi_item, lo_item])
            } else {
                Selection::Ranked([lo_item, hi_item])
            }
        }
        None => {
            let mut it = fresh.into_iter();
            match (it.next(), it.next()) {
                (Some(first), Some(second)) => Selection::Fallback([first, second]),
                // fresh.len() >= 2 was checked above
                (first, _) => Selection::Insufficient(first.into_iter().collect()),
            }
        }
    }
}

/// Every run of ASCII digits in `text`, in order.
/// Numbers too large for `usize` are skipped.
pub fn parse_indices(text: &str) -> Vec<usize> {
    INTEGER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn valid_pair(indices: &[usize], window: usize) -> Option<(usize, usize)> {
    match indices {
        [a, b, ..] if *a < window && *b < window && a != b => Some((*a, *b)),
        _ => None,
    }
}

fn ranking_prompt(candidates: &[CandidateItem], category_label: &str) -> String {
    let list = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i, c.title))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are the editor of a {category_label} blog for professional readers.\n\
         From the numbered headlines below, choose the TWO stories with the most \
         industry impact and reader interest.\n\n{list}\n\n\
         Answer with exactly two index numbers from the list, separated by a comma \
         (for example: 3, 7). Do not add any other text."
    )
}
