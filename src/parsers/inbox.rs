//! Inbox (private message) page parsers.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{InboxMessage, IntelSiteProfile};
use crate::parsers::table;
use crate::utils::parse::{contains_datetime, is_datetime};
use crate::utils::{extract_query_id, fingerprint, parse_datetime, truncate_graphemes};

/// Maximum body preview length in grapheme clusters.
pub const BODY_PREVIEW_LEN: usize = 200;

const NO_SUBJECT: &str = "(no subject)";
const TABLE_KEYWORDS: &[&str] = &[
    "消息", "站内信", "pm", "message", "inbox", "subject", "主题", "标题",
];
const MESSAGE_ID_KEYS: &[&str] = &["id", "pmid", "mid"];

static NUMERIC_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?(\d+)$").expect("static regex"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));
static ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr[class], div[class]").expect("static selector"));
static ITEM_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)message|pm|inbox").expect("static regex"));

/// NexusPHP-style message table: one row per message, newest first.
pub fn parse_generic(profile: &IntelSiteProfile, html: &str) -> Vec<InboxMessage> {
    let document = Html::parse_document(html);
    let Some(data) = table::data_tables(&document, 2)
        .into_iter()
        .find(|t| t.header_mentions(TABLE_KEYWORDS))
    else {
        log::debug!("[{}] no message table on inbox page", profile.site);
        return Vec::new();
    };

    let mut messages = Vec::new();
    let mut seen = HashSet::new();
    for row in data.rows {
        if let Some(message) = parse_row(row) {
            if seen.insert(message.message_id.clone()) {
                messages.push(message);
            }
        }
    }
    log::debug!("[{}] parsed {} inbox messages", profile.site, messages.len());
    messages
}

fn parse_row(row: ElementRef<'_>) -> Option<InboxMessage> {
    let cells = table::row_cells(row);
    if cells.len() < 2 {
        return None;
    }
    let texts: Vec<String> = cells.iter().map(|c| table::cell_text(*c)).collect();

    let mut message_id = None;
    let mut subject = None;
    let mut url = None;
    for link in row.select(&table::LINK) {
        let href = link.value().attr("href").unwrap_or_default();
        if let Some(id) = extract_query_id(href, MESSAGE_ID_KEYS) {
            message_id = Some(id);
            subject = Some(table::cell_text(link)).filter(|s| !s.is_empty());
            url = Some(href.to_string());
            break;
        }
    }

    let subject = subject
        .or_else(|| texts.iter().find(|t| t.chars().count() > 3).cloned())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let date_text = cells
        .iter()
        .rev()
        .map(|c| table::cell_label(*c))
        .find(|t| contains_datetime(t));
    let created_at = date_text.as_deref().and_then(parse_datetime);

    let body = texts
        .iter()
        .find(|t| **t != subject && t.chars().count() > 10 && !is_datetime(t))
        .map(|t| truncate_graphemes(t, BODY_PREVIEW_LEN))
        .unwrap_or_default();

    let message_id = message_id
        .or_else(|| {
            NUMERIC_CELL
                .captures(&texts[0])
                .map(|caps| caps[1].to_string())
        })
        .unwrap_or_else(|| fingerprint(&[&subject, date_text.as_deref().unwrap_or("")]));

    Some(InboxMessage {
        message_id,
        subject,
        body,
        created_at,
        url,
    })
}

/// TTG renders messages as classed items and may omit subjects; deletion
/// notices are recognised from the body. Falls back to the generic table parser.
pub fn parse_ttg(profile: &IntelSiteProfile, html: &str) -> Vec<InboxMessage> {
    let document = Html::parse_document(html);
    let items: Vec<ElementRef<'_>> = document
        .select(&ITEM)
        .filter(|item| {
            item.value()
                .attr("class")
                .is_some_and(|class| ITEM_CLASS.is_match(class))
        })
        .collect();

    if items.is_empty() {
        return parse_generic(profile, html);
    }

    let mut messages = Vec::new();
    let mut seen = HashSet::new();
    for item in items {
        let message = parse_ttg_item(item);
        if seen.insert(message.message_id.clone()) {
            messages.push(message);
        }
    }
    log::debug!("[{}] parsed {} TTG inbox messages", profile.site, messages.len());
    messages
}

fn parse_ttg_item(item: ElementRef<'_>) -> InboxMessage {
    let link = item.select(&table::LINK).find_map(|link| {
        let href = link.value().attr("href")?;
        extract_query_id(href, MESSAGE_ID_KEYS).map(|id| (id, href.to_string()))
    });

    let lines: Vec<String> = item
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    let mut subject = None;
    let mut body = String::new();
    let mut created_at = None;
    if let Some((first, rest)) = lines.split_first() {
        created_at = parse_datetime(first);
        if created_at.is_none() {
            subject = Some(first.clone());
        }
        body = if rest.is_empty() && created_at.is_some() {
            first.clone()
        } else {
            rest.join("\n")
        };
    }

    let subject = match subject {
        Some(subject) => subject,
        None if ["删除", "刪除", "deleted"].iter().any(|k| body.contains(k)) => {
            "种子删除通知".to_string()
        }
        None => NO_SUBJECT.to_string(),
    };

    let attr_id = || {
        ["data-id", "id"]
            .iter()
            .filter_map(|attr| item.value().attr(attr))
            .find_map(|value| DIGITS.find(value).map(|m| m.as_str().to_string()))
    };
    let (message_id, url) = match link {
        Some((id, href)) => (id, Some(href)),
        None => (
            attr_id().unwrap_or_else(|| fingerprint(&[&subject, &body])),
            None,
        ),
    };

    InboxMessage {
        message_id,
        subject,
        body: truncate_graphemes(&body, BODY_PREVIEW_LEN),
        created_at,
        url,
    }
}
