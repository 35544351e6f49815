//! Tolerant markup scanning for the comparison page.
//!
//! The page is split into match blocks on the event marker, and each block
//! is scanned locally for the team, return, kickoff, odds and bookmaker
//! markers. No full DOM is built: elements are located by marker text,
//! their inner text is read up to the matching close tag of the same name,
//! and tags and common entities are stripped.

use serde::Deserialize;

use crate::types::MatchFragment;

/// Marker strings identifying the parts of a match block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageMarkers {
    /// Opens each match block.
    pub event_block: String,
    pub team: String,
    /// Marks the return percentage. Its absence means the page has not
    /// finished loading.
    pub return_value: String,
    pub date: String,
    pub time: String,
    pub odd: String,
    /// Class token prefix carrying a bookmaker id (`bookmaker-12`).
    pub bookmaker_prefix: String,
}

impl Default for PageMarkers {
    fn default() -> Self {
        Self {
            event_block: r#"class="events "#.to_string(),
            team: r#"class="event-team""#.to_string(),
            return_value: r#"data-controller="retour""#.to_string(),
            date: r#"class="event-date""#.to_string(),
            time: r#"class="event-hour""#.to_string(),
            odd: r#"data-controller="odd""#.to_string(),
            bookmaker_prefix: "bookmaker-".to_string(),
        }
    }
}

/// Whether the page carries the content we wait for: at least one return
/// element with its percentage filled in.
pub fn is_loaded(body: &str, markers: &PageMarkers) -> bool {
    !element_texts(body, &markers.return_value).is_empty()
}

/// Read every match block of the page.
pub fn extract_fragments(body: &str, markers: &PageMarkers) -> Vec<MatchFragment> {
    split_blocks(body, &markers.event_block)
        .into_iter()
        .map(|block| MatchFragment {
            teams: element_texts(block, &markers.team),
            return_text: element_texts(block, &markers.return_value).into_iter().next(),
            date_text: element_texts(block, &markers.date).into_iter().next(),
            time_text: element_texts(block, &markers.time).into_iter().next(),
            odds: element_texts(block, &markers.odd),
            bookmaker_class: bookmaker_classes(block, &markers.bookmaker_prefix),
        })
        .collect()
}

/// Slices from each occurrence of `marker` to the next one (or the end).
fn split_blocks<'a>(body: &'a str, marker: &str) -> Vec<&'a str> {
    let starts: Vec<usize> = body.match_indices(marker).map(|(i, _)| i).collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(body.len());
            &body[start..end]
        })
        .collect()
}

/// Inner text of every element whose opening tag contains `marker`.
fn element_texts(block: &str, marker: &str) -> Vec<String> {
    let mut texts = Vec::new();
    let mut from = 0;

    while let Some(found) = block[from..].find(marker) {
        let at = from + found;
        from = at + marker.len();

        let Some(tag_start) = block[..at].rfind('<') else { continue };
        let tag_name: String = block[tag_start + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let Some(open_end) = block[at..].find('>').map(|i| at + i + 1) else { continue };
        if tag_name.is_empty() {
            continue;
        }

        let close = format!("</{tag_name}");
        let inner_end = block[open_end..]
            .find(&close)
            .map(|i| open_end + i)
            .unwrap_or(block.len());

        let text = clean_text(&block[open_end..inner_end]);
        if !text.is_empty() {
            texts.push(text);
        }
        from = from.max(open_end);
    }

    texts
}

/// Class attribute values in the block that carry bookmaker tokens.
fn bookmaker_classes(block: &str, prefix: &str) -> Option<String> {
    let tokens: Vec<&str> = block
        .match_indices("class=\"")
        .filter_map(|(i, attr)| {
            let value_start = i + attr.len();
            block[value_start..]
                .find('"')
                .map(|end| &block[value_start..value_start + end])
        })
        .flat_map(str::split_whitespace)
        .filter(|token| token.starts_with(prefix))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Strip tags, decode common entities and collapse whitespace.
fn clean_text(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
