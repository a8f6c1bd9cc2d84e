//! Table helpers shared by the heuristic page parsers.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::utils::normalize_whitespace;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("static selector"));
static LABELLED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[alt], [title]").expect("static selector"));
pub(crate) static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Visible text of an element with whitespace collapsed.
pub fn cell_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Visible text plus `alt`/`title` attributes of descendants.
///
/// Trackers often render column headers, categories and timestamps as icons
/// or tooltips, so the text alone is not enough.
pub fn cell_label(element: ElementRef<'_>) -> String {
    let mut parts = vec![cell_text(element)];
    for labelled in element.select(&LABELLED) {
        for attr in ["alt", "title"] {
            if let Some(value) = labelled.value().attr(attr) {
                parts.push(value.to_string());
            }
        }
    }
    normalize_whitespace(&parts.join(" "))
}

/// Rows that belong to this table, not to tables nested in its cells.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

/// Direct `td`/`th` cells of a row.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

/// A data table: its header labels (lowercased) and the rows after the header.
pub struct DataTable<'a> {
    pub headers: Vec<String>,
    pub rows: Vec<ElementRef<'a>>,
}

impl DataTable<'_> {
    /// Index of the first header containing any keyword, skipping `exclude`.
    pub fn column(&self, keywords: &[&str], exclude: &[Option<usize>]) -> Option<usize> {
        self.headers.iter().enumerate().position(|(i, header)| {
            !exclude.contains(&Some(i)) && keywords.iter().any(|k| header.contains(k))
        })
    }

    /// Whether the header row mentions any keyword.
    pub fn header_mentions(&self, keywords: &[&str]) -> bool {
        let joined = self.headers.join(" ");
        keywords.iter().any(|k| joined.contains(k))
    }
}

/// Every table in the document whose first row could be a header.
///
/// Layout tables, whose first row wraps another table, are skipped.
pub fn data_tables(document: &Html, min_columns: usize) -> Vec<DataTable<'_>> {
    let mut tables = Vec::new();
    for table in document.select(&TABLE) {
        let rows = table_rows(table);
        let Some((header, body)) = rows.split_first() else {
            continue;
        };
        if header.select(&TABLE).next().is_some() {
            continue;
        }
        let headers: Vec<String> = row_cells(*header)
            .into_iter()
            .map(|cell| cell_label(cell).to_lowercase())
            .collect();
        if headers.len() < min_columns {
            continue;
        }
        tables.push(DataTable {
            headers,
            rows: body.to_vec(),
        });
    }
    tables
}
