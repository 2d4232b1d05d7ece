//! Blog post drafting.
//!
//! A draft is produced in three sequential model calls:
//!
//! 1. **Outline** from the two titles
//! 2. **First half** covering topic 1, with `[IMAGE_1]` and `[IMAGE_2]`
//! 3. **Second half** covering topic 2, with `[IMAGE_3]` and `[IMAGE_4]`,
//!    followed by the closing sections
//!
//! Both halves follow the same section template. Failures are not retried
//! here (the client's retry setting applies) and propagate to the caller.

use crate::api::AskAsync;
use crate::draft::{Draft, Placeholder};
use crate::error::GenerateError;
use crate::models::SelectedTopic;
use crate::utils::strip_code_fences;
use tracing::{info, instrument};

const SECTION_TEMPLATE: &str = "\
1. <h2>Context</h2>: why this story matters right now.
2. <h2>Technical deep-dive</h2>: how it works, including one HTML <table> comparing it with the closest alternatives.
3. <h2>Market dynamics</h2>: concrete figures (market size, funding, pricing, adoption) where known.
4. <h2>Risk factors</h2>: regulatory, technical and competitive risks.
5. <h2>Actionable insights</h2>: what practitioners and investors should do next.";

const FORMAT_RULES: &str = "\
Write HTML only, using <h2>, <h3>, <p>, <ul>, <li>, <table> and <strong>. \
Do not include <html>, <head> or <body> tags and do not wrap the answer in markdown code fences.";

/// Draft a two-topic HTML post for `category_label`.
#[instrument(level = "info", skip_all, fields(category = %category_label))]
pub async fn write_draft<L: AskAsync>(
    topic1: &SelectedTopic,
    topic2: &SelectedTopic,
    category_label: &str,
    llm: &L,
) -> Result<Draft, GenerateError> {
    let outline = ask_stage(llm, "outline", &outline_prompt(topic1, topic2, category_label)).await?;
    info!(chars = outline.len(), "Outline ready");

    let first = ask_stage(llm, "first half", &first_half_prompt(topic1, category_label, &outline)).await?;
    info!(chars = first.len(), "First half ready");

    let second = ask_stage(llm, "second half", &second_half_prompt(topic1, topic2, category_label, &outline)).await?;
    info!(chars = second.len(), "Second half ready");

    let draft = Draft::parse(&first).join(Draft::parse(&second));
    info!(slots = draft.slots().len(), "Draft assembled");
    Ok(draft)
}

async fn ask_stage<L: AskAsync>(llm: &L, stage: &'static str, prompt: &str) -> Result<String, GenerateError> {
    llm.ask(prompt)
        .await
        .map(|reply| strip_code_fences(&reply))
        .map_err(|source| GenerateError::Llm { stage, source })
}

fn outline_prompt(topic1: &SelectedTopic, topic2: &SelectedTopic, category_label: &str) -> String {
    format!(
        "You are planning a long-form {category_label} blog post that covers two news stories.\n\
         Story 1: {}\nStory 2: {}\n\n\
         Write a short outline (at most 10 bullet points) for a post that treats each story in depth \
         and ends with a synthesis connecting them. Plain text only.",
        topic1.title, topic2.title
    )
}

fn first_half_prompt(topic: &SelectedTopic, category_label: &str, outline: &str) -> String {
    format!(
        "You are an expert {category_label} analyst writing the FIRST HALF of a blog post.\n\n\
         [OUTLINE]\n{outline}\n\n\
         [STORY]\nTitle: {}\nSource: {}\nText: {}\n\n\
         Start with an <h1> headline for the whole post and a short introduction, then cover this story \
         with these sections:\n{SECTION_TEMPLATE}\n\n\
         Put the marker {} on its own line after the Context section and the marker {} on its own line \
         after the Market dynamics section. Write each marker exactly once and exactly as shown.\n\
         {FORMAT_RULES}",
        topic.title,
        topic.id,
        topic.raw_text,
        Placeholder::Image1.marker(),
        Placeholder::Image2.marker(),
    )
}

fn second_half_prompt(
    topic1: &SelectedTopic,
    topic2: &SelectedTopic,
    category_label: &str,
    outline: &str,
) -> String {
    format!(
        "You are an expert {category_label} analyst writing the SECOND HALF of a blog post. \
         The first half already covered \"{}\"; continue the same post without repeating it.\n\n\
         [OUTLINE]\n{outline}\n\n\
         [STORY]\nTitle: {}\nSource: {}\nText: {}\n\n\
         Cover this story with these sections:\n{SECTION_TEMPLATE}\n\n\
         Put the marker {} on its own line after the Context section and the marker {} on its own line \
         after the Market dynamics section. Write each marker exactly once and exactly as shown.\n\n\
         Then close the post with:\n\
         - <h2>Connecting the dots</h2>: a synthesis of both stories.\n\
         - <h2>Glossary</h2>: at least 5 key terms, each wrapped in <strong>, with a one-line definition.\n\
         - An SEO block: <div class=\"seo\"> containing a meta description (under 160 characters) \
         and 5-10 comma-separated keywords.\n\
         {FORMAT_RULES}",
        topic1.title,
        topic2.title,
        topic2.id,
        topic2.raw_text,
        Placeholder::Image3.marker(),
        Placeholder::Image4.marker(),
    )
}
