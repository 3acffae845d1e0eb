// src/services/news.rs
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::models::NewsItem;

pub const TITLE_DISPLAY_CHARS: usize = 70;
pub const FALLBACK_TITLE: &str = "News";
pub const FALLBACK_PUBLISHER: &str = "Financial news";
pub const FALLBACK_LINK: &str = "#";

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{00A0}\x{202F}\p{Cc}\s]+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayNews {
    pub title: String,
    pub publisher: String,
    pub link: String,
    /// "publisher: title" shortened for a collapsed list row.
    pub headline: String,
}

type NewsField = fn(&NewsItem) -> Option<&str>;

fn top_title(item: &NewsItem) -> Option<&str> {
    item.title.as_deref()
}

fn content_title(item: &NewsItem) -> Option<&str> {
    item.content.as_ref().and_then(|c| c.title.as_deref())
}

fn top_summary(item: &NewsItem) -> Option<&str> {
    item.summary.as_deref()
}

fn content_summary(item: &NewsItem) -> Option<&str> {
    item.content.as_ref().and_then(|c| c.summary.as_deref())
}

fn top_publisher(item: &NewsItem) -> Option<&str> {
    item.publisher.as_deref()
}

fn content_provider(item: &NewsItem) -> Option<&str> {
    item.content
        .as_ref()
        .and_then(|c| c.provider.as_ref())
        .and_then(|p| p.display_name.as_deref())
}

fn content_publisher(item: &NewsItem) -> Option<&str> {
    item.content.as_ref().and_then(|c| c.publisher.as_deref())
}

fn top_link(item: &NewsItem) -> Option<&str> {
    item.link.as_deref()
}

fn content_canonical_url(item: &NewsItem) -> Option<&str> {
    item.content
        .as_ref()
        .and_then(|c| c.canonical_url.as_ref())
        .and_then(|u| u.url.as_deref())
}

fn content_click_through_url(item: &NewsItem) -> Option<&str> {
    item.content
        .as_ref()
        .and_then(|c| c.click_through_url.as_ref())
        .and_then(|u| u.url.as_deref())
}

const TITLE_CANDIDATES: [NewsField; 2] = [top_title, content_title];
const SUMMARY_CANDIDATES: [NewsField; 2] = [top_summary, content_summary];
const PUBLISHER_CANDIDATES: [NewsField; 3] = [top_publisher, content_provider, content_publisher];
const LINK_CANDIDATES: [NewsField; 3] = [top_link, content_canonical_url, content_click_through_url];

/// Folds non-breaking spaces, control characters and whitespace runs into
/// single plain spaces.
pub fn normalize_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn first_text(item: &NewsItem, candidates: &[NewsField]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|field| field(item))
        .map(normalize_text)
        .find(|text| !text.is_empty())
}

pub fn resolve_title(item: &NewsItem) -> String {
    first_text(item, &TITLE_CANDIDATES)
        .or_else(|| {
            first_text(item, &SUMMARY_CANDIDATES)
                .map(|summary| truncate_chars(&summary, TITLE_DISPLAY_CHARS))
        })
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

pub fn resolve_publisher(item: &NewsItem) -> String {
    first_text(item, &PUBLISHER_CANDIDATES).unwrap_or_else(|| FALLBACK_PUBLISHER.to_string())
}

pub fn resolve_link(item: &NewsItem) -> String {
    first_text(item, &LINK_CANDIDATES).unwrap_or_else(|| FALLBACK_LINK.to_string())
}

pub fn display_news(item: &NewsItem) -> DisplayNews {
    let title = resolve_title(item);
    let publisher = resolve_publisher(item);
    let link = resolve_link(item);

    let short = truncate_chars(&title, TITLE_DISPLAY_CHARS);
    let headline = if short.len() < title.len() {
        format!("{}: {}...", publisher, short)
    } else {
        format!("{}: {}", publisher, short)
    };

    DisplayNews {
        title,
        publisher,
        link,
        headline,
    }
}

pub fn extract_news(items: &[NewsItem], limit: usize) -> Vec<DisplayNews> {
    items.iter().take(limit).map(display_news).collect()
}
