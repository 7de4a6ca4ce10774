//! Listing-page extraction.
//!
//! A listing page is a stream of `<li>` items, some of them articles, some
//! ads or navigation. Article items are found with a tiered policy: each
//! tier in [`ITEM_TIERS`] is tried in order and the first one that matches
//! anything wins. Every matched item is then turned into a
//! [`CandidateArticle`] or skipped.

use crate::error::{Error, Result};
use crate::models::CandidateArticle;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Titles shorter than this are navigation or noise, not headlines.
pub const MIN_TITLE_CHARS: usize = 10;

static LIST_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static LABELLED_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[aria-label]").unwrap());
static HREF_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// One way of picking article items out of a listing document.
struct ItemTier {
    name: &'static str,
    select: fn(&Html) -> Vec<ElementRef<'_>>,
}

const ITEM_TIERS: &[ItemTier] = &[
    ItemTier {
        name: "strict",
        select: strict_story_items,
    },
    ItemTier {
        name: "loose",
        select: loose_items,
    },
    ItemTier {
        name: "any-link",
        select: items_with_links,
    },
];

fn class_attr<'a>(item: &ElementRef<'a>) -> &'a str {
    item.value().attr("class").unwrap_or("")
}

/// `true` for class tokens such as `ad`, `ads`, `ad-item`, `stream-ad`.
fn is_ad_token(token: &str) -> bool {
    token
        .split(['-', '_'])
        .any(|part| part.eq_ignore_ascii_case("ad") || part.eq_ignore_ascii_case("ads"))
}

/// Items marked as both a stream item and a story item, never an ad item.
fn strict_story_items(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .select(&LIST_ITEM)
        .filter(|li| {
            let class = class_attr(li);
            class.contains("stream-item") && class.contains("story-item") && !class.contains("ad-item")
        })
        .collect()
}

/// Items with any `item` class marker and no ad marker.
fn loose_items(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .select(&LIST_ITEM)
        .filter(|li| {
            let element = li.value();
            element.classes().any(|c| c.contains("item")) && !element.classes().any(is_ad_token)
        })
        .collect()
}

/// Any list item that carries a hyperlink.
fn items_with_links(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .select(&LIST_ITEM)
        .filter(|li| li.select(&HREF_LINK).next().is_some())
        .collect()
}

/// Visible text of an element with runs of whitespace collapsed.
pub(crate) fn collapsed_text(element: &ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Parse the page URL that site-relative links are resolved against.
fn page_origin(page_url: &str) -> Result<Url> {
    let url = Url::parse(page_url).map_err(|e| Error::Parse(format!("listing URL {page_url:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Parse(format!("listing URL {page_url:?} cannot resolve links")));
    }
    Ok(url)
}

/// Resolve an item href: site-relative paths join the page origin, absolute
/// `http(s)` links pass through, anything else (fragments, `javascript:`,
/// bare relative paths) is rejected.
fn resolve_href(origin: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with('/') {
        origin.join(href).ok().map(|u| u.to_string())
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else {
        None
    }
}

/// Build a candidate from one matched item, or `None` if it is not usable.
fn candidate_from_item(item: ElementRef<'_>, origin: &Url, source: &str) -> Option<CandidateArticle> {
    let title_link = item
        .select(&LABELLED_LINK)
        .next()
        .or_else(|| item.select(&HREF_LINK).next())?;

    let title = title_link
        .value()
        .attr("aria-label")
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| collapsed_text(&title_link));

    if title.chars().count() < MIN_TITLE_CHARS {
        return None;
    }

    let href = title_link.value().attr("href")?;
    let link = resolve_href(origin, href)?;

    Some(CandidateArticle::new(title, link, source))
}

/// Extract candidate articles from a listing page, in document order.
///
/// `page_url` is the URL the markup was fetched from; its origin resolves
/// site-relative links. `source` labels every candidate. Items repeating a
/// link or a title already taken from this page are dropped. This never
/// fails: an unusable item is skipped and an unusable page yields nothing.
#[instrument(level = "info", skip_all, fields(%page_url))]
pub fn extract_candidates(markup: &str, page_url: &str, source: &str) -> Vec<CandidateArticle> {
    let origin = match page_origin(page_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Skipping page");
            return Vec::new();
        }
    };

    let document = Html::parse_document(markup);

    let Some((tier, items)) = ITEM_TIERS
        .iter()
        .map(|tier| (tier.name, (tier.select)(&document)))
        .find(|(_, items)| !items.is_empty())
    else {
        info!("No article items matched any tier");
        return Vec::new();
    };
    debug!(tier, matched = items.len(), "Selected listing item tier");

    let mut seen_links = HashSet::new();
    let mut seen_titles = HashSet::new();
    let mut candidates = Vec::new();
    let mut skipped = 0usize;

    for item in items {
        let Some(candidate) = candidate_from_item(item, &origin, source) else {
            skipped += 1;
            continue;
        };
        if seen_links.contains(&candidate.link) || seen_titles.contains(&candidate.title) {
            skipped += 1;
            continue;
        }
        seen_links.insert(candidate.link.clone());
        seen_titles.insert(candidate.title.clone());
        debug!(
            index = candidates.len() + 1,
            title = %truncate_for_log(&candidate.title, 60),
            "Found candidate"
        );
        candidates.push(candidate);
    }

    info!(tier, found = candidates.len(), skipped, "Parsed listing page");
    candidates
}
