//! Detail-page extraction: article body and publish time.
//!
//! Both halves walk an ordered list of selectors and stop at the first one
//! that produces something.

use crate::extract::listing::collapsed_text;
use crate::models::RECENT;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Paragraph fragments shorter than this are bylines, captions or buttons.
pub const MIN_FRAGMENT_CHARS: usize = 10;

const BOILERPLATE: &[&str] = &["Read the original article"];

fn selectors(sources: &[&str]) -> Vec<Selector> {
    sources.iter().map(|s| Selector::parse(s).unwrap()).collect()
}

static CONTENT_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        r#"div[data-testid="caas-body"]"#,
        ".caas-body",
        "div.caas-body",
        r#"div[class*="body"]"#,
    ])
});

static TIMESTAMPS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "time[datetime]",
        r#"[data-testid="timestamp"]"#,
        r#"div[data-testid="caas-attr-time-style"]"#,
        ".caas-attr-time-style",
    ])
});

/// Paragraphs rendered with the site's generated `yf-*` class.
static CONTENT_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"p[class*="yf-"]"#).unwrap());
static READ_MORE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.read-more-wrapper").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Content and publish time parsed from one detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    /// Paragraphs separated by a blank line; empty if nothing qualified.
    pub content: String,
    /// Machine-readable datetime or visible time text; `"Recent"` if absent.
    pub raw_publish_time: String,
}

impl DetailFields {
    /// The result recorded for a page that could not be fetched or parsed.
    pub fn empty() -> Self {
        Self::default()
    }
}

fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE.iter().any(|phrase| text.contains(phrase))
}

fn assemble_content(document: &Html) -> String {
    let Some(container) = CONTENT_CONTAINERS
        .iter()
        .find_map(|selector| document.select(selector).next())
    else {
        debug!("No content container matched");
        return String::new();
    };

    let mut taken = HashSet::new();
    let mut fragments = Vec::new();
    let mut push = |p: ElementRef<'_>, fragments: &mut Vec<String>, skip_boilerplate: bool| {
        if !taken.insert(p.id()) {
            return;
        }
        let text = collapsed_text(&p);
        if text.chars().count() < MIN_FRAGMENT_CHARS {
            return;
        }
        if skip_boilerplate && is_boilerplate(&text) {
            return;
        }
        fragments.push(text);
    };

    for p in container.select(&CONTENT_PARAGRAPH) {
        push(p, &mut fragments, false);
    }

    if let Some(wrapper) = container.select(&READ_MORE).next() {
        for p in wrapper.select(&PARAGRAPH) {
            push(p, &mut fragments, true);
        }
    }

    fragments.into_iter().join("\n\n")
}

fn resolve_time(document: &Html) -> String {
    TIMESTAMPS
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(|element| {
            element
                .value()
                .attr("datetime")
                .map(|dt| dt.trim().to_string())
                .filter(|dt| !dt.is_empty())
                .unwrap_or_else(|| collapsed_text(&element))
        })
        .find(|time| !time.is_empty())
        .unwrap_or_else(|| RECENT.to_string())
}

/// Extract the article body and publish time from a detail page.
///
/// Never fails: a page without a recognizable body yields empty content,
/// and a page without a timestamp yields `"Recent"`.
#[instrument(level = "debug", skip_all, fields(bytes = markup.len()))]
pub fn extract_details(markup: &str) -> DetailFields {
    let document = Html::parse_document(markup);
    let content = assemble_content(&document);
    let raw_publish_time = resolve_time(&document);
    debug!(content_chars = content.chars().count(), %raw_publish_time, "Parsed detail page");
    DetailFields {
        content,
        raw_publish_time,
    }
}
