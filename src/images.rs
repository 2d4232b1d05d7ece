//! Stock photo enrichment.
//!
//! Each topic gets up to two search keywords extracted by the model from its
//! title (falling back to a generic keyword), and each image slot in the
//! draft is filled with one landscape photo for its keyword. A keyword shared
//! by several slots is searched once for as many photos as it has slots, and
//! no photo is used twice. Slots whose lookup fails or runs out of photos
//! render as nothing.

use crate::api::AskAsync;
use crate::draft::{Draft, Placeholder, has_unresolved_markers};
use crate::error::ImageError;
use crate::models::SelectedTopic;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Keywords used when the model cannot supply any, per topic position.
pub const FALLBACK_KEYWORDS: [&str; 2] = ["technology", "business"];

/// One photo from the image service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub url: String,
    pub alt: String,
    pub author: String,
    pub author_url: String,
}

/// Anything that can find photos for a keyword.
pub trait ImageSearch {
    /// Up to `count` photos, best match first. Empty when the search
    /// succeeded but found nothing.
    async fn search(&self, keyword: &str, count: usize) -> Result<Vec<Photo>, ImageError>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    urls: PhotoUrls,
    alt_description: Option<String>,
    user: Option<PhotoUser>,
}

#[derive(Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Deserialize)]
struct PhotoUser {
    name: String,
    links: Option<UserLinks>,
}

#[derive(Deserialize)]
struct UserLinks {
    html: String,
}

/// Client for the Unsplash photo search API.
#[derive(Clone)]
pub struct UnsplashClient {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl fmt::Debug for UnsplashClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsplashClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UnsplashClient {
    /// `client` should carry the short image-search timeout.
    pub fn new(client: reqwest::Client, base_url: &str, access_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
        }
    }
}

impl ImageSearch for UnsplashClient {
    #[instrument(level = "debug", skip(self))]
    async fn search(&self, keyword: &str, count: usize) -> Result<Vec<Photo>, ImageError> {
        if self.access_key.is_empty() {
            return Err(ImageError::MissingAccessKey);
        }
        // The API caps per_page at 30.
        let per_page = count.clamp(1, 30).to_string();
        let url = Url::parse_with_params(
            &format!("{}/search/photos", self.base_url),
            &[
                ("query", keyword),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
            ],
        )?;
        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .header("Accept-Version", "v1")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageError::HttpStatus(status.as_u16()));
        }
        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .take(count)
            .map(|r| {
                let (author, author_url) = match r.user {
                    Some(user) => (
                        user.name,
                        user.links.map(|l| l.html).unwrap_or_else(|| "https://unsplash.com".into()),
                    ),
                    None => ("Unsplash".into(), "https://unsplash.com".into()),
                };
                Photo {
                    url: r.urls.regular,
                    alt: r.alt_description.unwrap_or_else(|| keyword.to_string()),
                    author,
                    author_url,
                }
            })
            .collect())
    }
}

/// Ask the model for up to two short search keywords for `title`.
///
/// Falls back to `[fallback]` on a failed call or an empty answer.
#[instrument(level = "debug", skip(llm))]
pub async fn extract_keywords<L: AskAsync>(title: &str, fallback: &str, llm: &L) -> Vec<String> {
    let prompt = format!(
        "Extract the 2 most concrete nouns or concepts from this headline that would make good \
         stock-photo search terms. Answer in English, comma-separated, 1-3 words each, nothing else.\n\n\
         Headline: {title}"
    );
    match llm.ask(&prompt).await {
        Ok(reply) => {
            let keywords = parse_keywords(&reply);
            if keywords.is_empty() {
                warn!(%title, "Model gave no keywords; using fallback");
                vec![fallback.to_string()]
            } else {
                keywords
            }
        }
        Err(e) => {
            warn!(%title, error = %e, "Keyword extraction failed; using fallback");
            vec![fallback.to_string()]
        }
    }
}

/// Split a comma/newline separated reply into at most two clean keywords.
pub fn parse_keywords(reply: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for raw in reply.split([',', '\n']) {
        let cleaned = raw
            .trim()
            .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_ascii_digit() || c == '.')
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim()
            .to_lowercase();
        if cleaned.is_empty() || cleaned.len() > 40 || keywords.contains(&cleaned) {
            continue;
        }
        keywords.push(cleaned);
        if keywords.len() == 2 {
            break;
        }
    }
    keywords
}

/// Fill every image slot of `draft` and render it to HTML.
///
/// The output never contains a placeholder marker: slots without a photo
/// render as the empty string.
#[instrument(level = "info", skip_all)]
pub async fn inject_images<L: AskAsync, I: ImageSearch>(
    draft: &Draft,
    topic1: &SelectedTopic,
    topic2: &SelectedTopic,
    llm: &L,
    images: &I,
) -> String {
    let slots = draft.slots();
    if slots.is_empty() {
        return draft.render(|_| String::new());
    }

    let keywords = [
        extract_keywords(&topic1.title, FALLBACK_KEYWORDS[0], llm).await,
        extract_keywords(&topic2.title, FALLBACK_KEYWORDS[1], llm).await,
    ];

    let plan: Vec<(Placeholder, &str)> = slots
        .iter()
        .map(|slot| (*slot, keyword_for(*slot, &keywords)))
        .collect();

    let mut found: HashMap<&str, VecDeque<Photo>> = HashMap::new();
    let mut used_urls: HashSet<String> = HashSet::new();
    let mut snippets: BTreeMap<Placeholder, String> = BTreeMap::new();

    for &(slot, keyword) in &plan {
        if !found.contains_key(keyword) {
            let wanted = plan.iter().filter(|(_, k)| *k == keyword).count();
            let photos = match images.search(keyword, wanted).await {
                Ok(photos) => photos,
                Err(e) => {
                    warn!(%keyword, error = %e, "Photo lookup failed");
                    Vec::new()
                }
            };
            debug!(%keyword, wanted, got = photos.len(), "Searched photos");
            found.insert(keyword, photos.into());
        }

        let next = found.get_mut(keyword).and_then(|queue| {
            std::iter::from_fn(|| queue.pop_front()).find(|photo| used_urls.insert(photo.url.clone()))
        });
        let snippet = match next {
            Some(photo) => {
                debug!(%slot, %keyword, url = %photo.url, "Placed photo");
                image_snippet(&photo)
            }
            None => {
                warn!(%slot, %keyword, "No unused photo for slot; leaving it empty");
                String::new()
            }
        };
        snippets.insert(slot, snippet);
    }

    let filled = snippets.values().filter(|s| !s.is_empty()).count();
    info!(slots = snippets.len(), filled, "Images injected");
    let html = draft.render(|slot| snippets.remove(&slot).unwrap_or_default());
    debug_assert!(!has_unresolved_markers(&html), "rendered draft still has a marker");
    html
}

/// First slot of a topic uses its first keyword, the second slot its second
/// keyword when there is one.
fn keyword_for(slot: Placeholder, keywords: &[Vec<String>; 2]) -> &str {
    let list = &keywords[slot.topic_index()];
    let nth = match slot {
        Placeholder::Image1 | Placeholder::Image3 => 0,
        Placeholder::Image2 | Placeholder::Image4 => 1,
    };
    list.get(nth)
        .or_else(|| list.first())
        .map(String::as_str)
        .unwrap_or(FALLBACK_KEYWORDS[slot.topic_index()])
}

fn image_snippet(photo: &Photo) -> String {
    use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
    format!(
        r#"<figure style="text-align:center; margin:20px 0;"><img src="{}" alt="{}" style="width:100%; max-width:600px; border-radius:10px;"><figcaption style="font-size:12px; color:#888;">Photo by <a href="{}">{}</a> on <a href="https://unsplash.com">Unsplash</a></figcaption></figure>"#,
        attr(&photo.url),
        attr(&photo.alt),
        attr(&photo.author_url),
        text(&photo.author),
    )
}
