//! HTML extraction of event identifiers
//!
//! Listing pages expose event identifiers in two ways:
//! - Links to event pages whose path ends in `/e/<slug>-<digits>`
//! - A `data-event-id` attribute carrying the bare identifier
//!
//! Both are collected into one set per page.

use crate::crawler::EventId;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use url::Url;

/// `/e/` segment, a slug, then the trailing digit run that ends the segment
static EVENT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/e/[^/]*-(\d+)(?:/|$)").unwrap());

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static EVENT_ID_ATTR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-event-id]").unwrap());

/// Extracts every event identifier on a listing page
///
/// # Arguments
///
/// * `html` - The page content
/// * `page_url` - The URL the content was served from, used to resolve
///   relative links
///
/// # Returns
///
/// The identifiers found, deduplicated. A page without any is not an error.
///
/// # Example
///
/// ```
/// use event_sweep::crawler::extract_event_ids;
/// use url::Url;
///
/// let html = r#"<a href="/e/jazz-night-12345">Jazz</a><div data-event-id="67890"></div>"#;
/// let page_url = Url::parse("https://events.example.com/d/all/").unwrap();
/// let ids: Vec<String> = extract_event_ids(html, &page_url)
///     .into_iter()
///     .map(|id| id.to_string())
///     .collect();
/// assert_eq!(ids, vec!["12345", "67890"]);
/// ```
pub fn extract_event_ids(html: &str, page_url: &Url) -> BTreeSet<EventId> {
    let document = Html::parse_document(html);
    let mut ids = BTreeSet::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        if let Some(id) = element
            .value()
            .attr("href")
            .and_then(|href| event_id_from_href(href, page_url))
        {
            ids.insert(id);
        }
    }

    for element in document.select(&EVENT_ID_ATTR_SELECTOR) {
        if let Some(id) = element.value().attr("data-event-id").and_then(EventId::parse) {
            ids.insert(id);
        }
    }

    ids
}

/// Resolves `href` against the page and matches its path against the
/// event link pattern
fn event_id_from_href(href: &str, page_url: &Url) -> Option<EventId> {
    let resolved = page_url.join(href.trim()).ok()?;
    event_id_from_path(resolved.path())
}

fn event_id_from_path(path: &str) -> Option<EventId> {
    let captures = EVENT_PATH_RE.captures(path)?;
    EventId::parse(captures.get(1)?.as_str())
}
