//! Typed model of a generated draft.
//!
//! The generator asks the model to leave literal markers (`[IMAGE_1]` …
//! `[IMAGE_4]`) where photos belong. [`Draft::parse`] splits the reply into
//! literal HTML and [`Placeholder`] slots, so the marker text never survives
//! in an HTML segment. [`Draft::render`] needs an answer for every slot,
//! which makes "no unresolved marker in the output" hold by construction.

use std::fmt;

/// A named image slot in a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    Image1,
    Image2,
    Image3,
    Image4,
}

impl Placeholder {
    pub const ALL: [Placeholder; 4] = [
        Placeholder::Image1,
        Placeholder::Image2,
        Placeholder::Image3,
        Placeholder::Image4,
    ];

    /// The literal marker the model is told to write.
    pub fn marker(&self) -> &'static str {
        match self {
            Placeholder::Image1 => "[IMAGE_1]",
            Placeholder::Image2 => "[IMAGE_2]",
            Placeholder::Image3 => "[IMAGE_3]",
            Placeholder::Image4 => "[IMAGE_4]",
        }
    }

    /// Which of the two topics the slot illustrates (0 or 1).
    pub fn topic_index(&self) -> usize {
        match self {
            Placeholder::Image1 | Placeholder::Image2 => 0,
            Placeholder::Image3 | Placeholder::Image4 => 1,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One piece of a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Html(String),
    Image {
        slot: Placeholder,
        /// False for repeats of a marker already seen earlier in the draft.
        first: bool,
    },
}

/// Generated HTML as an ordered list of segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    segments: Vec<Segment>,
}

impl Draft {
    /// Split `html` on every placeholder marker.
    pub fn parse(html: &str) -> Self {
        let mut segments = Vec::new();
        let mut seen = Vec::new();
        let mut rest = html;

        loop {
            let next = Placeholder::ALL
                .iter()
                .filter_map(|p| rest.find(p.marker()).map(|idx| (idx, *p)))
                .min_by_key(|(idx, _)| *idx);

            match next {
                Some((idx, slot)) => {
                    if idx > 0 {
                        segments.push(Segment::Html(rest[..idx].to_string()));
                    }
                    let first = !seen.contains(&slot);
                    seen.push(slot);
                    segments.push(Segment::Image { slot, first });
                    rest = &rest[idx + slot.marker().len()..];
                }
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Html(rest.to_string()));
                    }
                    break;
                }
            }
        }

        Self { segments }
    }

    /// Concatenate two drafts (first half, second half).
    ///
    /// Repeats are recomputed across the joined draft.
    pub fn join(self, other: Draft) -> Draft {
        let mut seen = Vec::new();
        let segments = self
            .segments
            .into_iter()
            .chain(other.segments)
            .map(|segment| match segment {
                Segment::Image { slot, .. } => {
                    let first = !seen.contains(&slot);
                    seen.push(slot);
                    Segment::Image { slot, first }
                }
                html => html,
            })
            .collect();
        Draft { segments }
    }

    #[cfg(test)]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Slots that appear at least once, in first-appearance order.
    pub fn slots(&self) -> Vec<Placeholder> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Image { slot, first: true } => Some(*slot),
                _ => None,
            })
            .collect()
    }

    /// Render to HTML. `resolve` supplies the snippet for the first
    /// occurrence of each slot; repeats render as nothing.
    pub fn render<F>(&self, mut resolve: F) -> String
    where
        F: FnMut(Placeholder) -> String,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Html(html) => out.push_str(html),
                Segment::Image { slot, first: true } => out.push_str(&resolve(*slot)),
                Segment::Image { first: false, .. } => {}
            }
        }
        out
    }
}

/// True when `html` still contains any placeholder marker.
pub fn has_unresolved_markers(html: &str) -> bool {
    Placeholder::ALL.iter().any(|p| html.contains(p.marker()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_splits_markers() {
        let draft = Draft::parse("<p>a</p>[IMAGE_1]<p>b</p>[IMAGE_2]");
        assert_eq!(
            draft.segments(),
            &[
                Segment::Html("<p>a</p>".into()),
                Segment::Image { slot: Placeholder::Image1, first: true },
                Segment::Html("<p>b</p>".into()),
                Segment::Image { slot: Placeholder::Image2, first: true },
            ]
        );
        assert_eq!(draft.slots(), vec![Placeholder::Image1, Placeholder::Image2]);
    }

    #[test]
    fn test_repeated_marker_renders_once() {
        let draft = Draft::parse("[IMAGE_3]x[IMAGE_3]y");
        let html = draft.render(|slot| format!("<img {}>", slot.topic_index()));
        assert_eq!(html, "<img 1>xy");
    }

    #[test]
    fn test_join_tracks_repeats_across_halves() {
        let draft = Draft::parse("[IMAGE_1]a").join(Draft::parse("b[IMAGE_1][IMAGE_4]"));
        assert_eq!(draft.slots(), vec![Placeholder::Image1, Placeholder::Image4]);
        assert_eq!(draft.render(|_| "I".into()), "IabI");
    }

    #[test]
    fn test_render_leaves_no_markers_even_with_empty_resolution() {
        let text = "[IMAGE_2][IMAGE_1] mid [IMAGE_4][IMAGE_3][IMAGE_2] end [IMAGE_9]";
        let html = Draft::parse(text).render(|_| String::new());
        assert!(!has_unresolved_markers(&html));
        assert_eq!(html, " mid  end [IMAGE_9]");
    }

    #[test]
    fn test_draft_without_markers() {
        let draft = Draft::parse("<p>plain</p>");
        assert!(draft.slots().is_empty());
        assert_eq!(draft.render(|_| unreachable!()), "<p>plain</p>");
    }
}
