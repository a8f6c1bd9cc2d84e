//! Torrent listing (browse/torrents page) parser.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{IntelSiteProfile, ParsedTorrentRow};
use crate::parsers::table::{self, DataTable};
use crate::utils::parse::contains_datetime;
use crate::utils::{clean_title, extract_query_id, parse_datetime, parse_size_bytes};

const TABLE_KEYWORDS: &[&str] = &["torrent", "种子", "title", "标题", "size", "大小"];
const SEEDERS: &[&str] = &["seeder", "做种数", "种子数"];
const LEECHERS: &[&str] = &["leecher", "下载数"];
const COMPLETED: &[&str] = &["snatched", "completed", "完成"];
const MAX_CATEGORY_LEN: usize = 50;

static HR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bh\s*&\s*r\b|\bhr\b|hit\s*(?:&|and)\s*run|hitandrun").expect("static regex")
});
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d[\d,]*$").expect("static regex"));
static MARKED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class], [alt], [title]").expect("static selector"));

/// NexusPHP-style listing: one row per torrent with a `details.php?id=` link.
pub fn parse_generic(profile: &IntelSiteProfile, html: &str) -> Vec<ParsedTorrentRow> {
    let document = Html::parse_document(html);
    let Some(data) = table::data_tables(&document, 3)
        .into_iter()
        .find(|t| t.header_mentions(TABLE_KEYWORDS))
    else {
        log::debug!("[{}] no torrent table on listing page", profile.site);
        return Vec::new();
    };

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for row in &data.rows {
        match parse_row(&data, *row) {
            Some(parsed) if seen.insert(parsed.torrent_id.clone()) => rows.push(parsed),
            Some(_) => {}
            None => log::trace!("[{}] skipped non-torrent row", profile.site),
        }
    }
    log::debug!("[{}] parsed {} listing rows", profile.site, rows.len());
    rows
}

/// HDSky runs stock NexusPHP; kept as its own entry so it can diverge.
pub fn parse_hdsky(profile: &IntelSiteProfile, html: &str) -> Vec<ParsedTorrentRow> {
    parse_generic(profile, html)
}

fn parse_row(data: &DataTable<'_>, row: ElementRef<'_>) -> Option<ParsedTorrentRow> {
    let cells = table::row_cells(row);
    if cells.len() < 3 {
        return None;
    }

    let (torrent_id, title_raw, link) = title_link(row)?;
    let title_index = cells
        .iter()
        .position(|cell| cell.select(&table::LINK).any(|l| l.id() == link.id()));

    let labels: Vec<String> = cells.iter().map(|c| table::cell_label(*c)).collect();
    let texts: Vec<String> = cells.iter().map(|c| table::cell_text(*c)).collect();

    let category = labels
        .first()
        .filter(|_| title_index != Some(0))
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty() && label.chars().count() < MAX_CATEGORY_LEN);

    let size_index = texts
        .iter()
        .enumerate()
        .position(|(i, text)| Some(i) != title_index && parse_size_bytes(text).is_some());
    let size_bytes = size_index.and_then(|i| parse_size_bytes(&texts[i]));

    let (seeders, leechers, completed) = peer_counts(data, &texts, title_index, size_index);

    let published_at = labels
        .iter()
        .enumerate()
        .filter(|(i, label)| Some(*i) != title_index && contains_datetime(label))
        .find_map(|(_, label)| parse_datetime(label));

    let badges = badge_text(row, link);
    let is_hr = HR_MARKER.is_match(&badges);
    let is_half_free = ["50%", "50pct", "半"].iter().any(|m| badges.contains(m));
    let is_free = !is_half_free && ["free", "免费"].iter().any(|m| badges.contains(m));

    Some(ParsedTorrentRow {
        title_clean: clean_title(&title_raw),
        torrent_id,
        title_raw,
        category,
        is_hr,
        is_free,
        is_half_free,
        size_bytes,
        seeders,
        leechers,
        completed,
        published_at,
    })
}

/// Torrent id and title from the details link, else the first `id=` link.
fn title_link(row: ElementRef<'_>) -> Option<(String, String, ElementRef<'_>)> {
    let links: Vec<(String, ElementRef<'_>)> = row
        .select(&table::LINK)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            extract_query_id(href, &["id"]).map(|id| (href.to_string(), link))
        })
        .collect();

    let (href, link) = links
        .iter()
        .find(|(href, _)| href.contains("details"))
        .or_else(|| links.first())?;

    let text = table::cell_text(*link);
    let title = if text.is_empty() {
        link.value().attr("title").unwrap_or_default().trim().to_string()
    } else {
        text
    };
    if title.is_empty() {
        return None;
    }
    Some((extract_query_id(href, &["id"])?, title, *link))
}

fn parse_count(text: &str) -> Option<u32> {
    text.replace(',', "").trim().parse().ok()
}

/// Seeders, leechers and completed counts: by header column when the header
/// names them, otherwise the integer-only cells after the size column.
fn peer_counts(
    data: &DataTable<'_>,
    texts: &[String],
    title_index: Option<usize>,
    size_index: Option<usize>,
) -> (u32, u32, Option<u32>) {
    let by_header = |keywords: &[&str]| {
        data.column(keywords, &[title_index])
            .and_then(|i| texts.get(i))
            .and_then(|t| parse_count(t))
    };
    let seeders = by_header(SEEDERS);
    let leechers = by_header(LEECHERS);
    let completed = by_header(COMPLETED);
    if seeders.is_some() || leechers.is_some() {
        return (seeders.unwrap_or(0), leechers.unwrap_or(0), completed);
    }

    let start = size_index.or(title_index).map_or(0, |i| i + 1);
    let mut numbers = texts
        .iter()
        .skip(start)
        .filter(|t| INTEGER.is_match(t))
        .filter_map(|t| parse_count(t));
    (
        numbers.next().unwrap_or(0),
        numbers.next().unwrap_or(0),
        numbers.next(),
    )
}

/// Lowercased class/alt/title attributes of the row's elements, where
/// promotion and HR badges live. The title link is left out: its `title`
/// attribute repeats the torrent name.
fn badge_text(row: ElementRef<'_>, title_link: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for element in row.select(&MARKED).filter(|e| e.id() != title_link.id()) {
        for attr in ["class", "alt", "title"] {
            if let Some(value) = element.value().attr(attr) {
                parts.push(value.to_string());
            }
        }
    }
    parts.join(" ").to_lowercase()
}
