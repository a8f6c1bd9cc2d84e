//! HR listing page parser.

use scraper::Html;

use crate::models::{IntelSiteProfile, ParsedHrPage, ParsedHrRow};
use crate::parsers::table::{self, DataTable};
use crate::utils::{extract_query_id, parse_datetime, parse_hours};

const REQUIRED: &[&str] = &["required", "require", "要求", "需要", "需做种"];
const SEEDED: &[&str] = &["seeded", "seed time", "seeding", "已做种", "做种时间", "已做"];
const DEADLINE: &[&str] = &["deadline", "expire", "截止", "到期", "期限"];
const ID: &[&str] = &["torrent id", "id", "种子"];

/// Locate the HR table by its column headers and read one row per torrent.
pub fn parse_generic(profile: &IntelSiteProfile, html: &str) -> ParsedHrPage {
    let document = Html::parse_document(html);

    for data in table::data_tables(&document, 2) {
        let required = data.column(REQUIRED, &[]);
        let seeded = data.column(SEEDED, &[required]);
        if required.is_none() && seeded.is_none() {
            continue;
        }
        let deadline = data.column(DEADLINE, &[required, seeded]);
        let id_column = data.column(ID, &[required, seeded, deadline]);

        let rows = read_rows(profile, &data, required, seeded, deadline, id_column);
        log::debug!("[{}] HR table with {} rows", profile.site, rows.len());
        return ParsedHrPage {
            recognized: true,
            rows,
        };
    }

    log::debug!("[{}] no HR table recognised", profile.site);
    ParsedHrPage::default()
}

fn read_rows(
    profile: &IntelSiteProfile,
    data: &DataTable<'_>,
    required: Option<usize>,
    seeded: Option<usize>,
    deadline: Option<usize>,
    id_column: Option<usize>,
) -> Vec<ParsedHrRow> {
    let mut rows = Vec::new();
    for row in &data.rows {
        let cells = table::row_cells(*row);
        if cells.len() < 2 {
            continue;
        }
        let text_at = |index: Option<usize>| {
            index
                .and_then(|i| cells.get(i))
                .map(|cell| table::cell_label(*cell))
        };

        let link_id = row.select(&table::LINK).find_map(|link| {
            link.value()
                .attr("href")
                .and_then(|href| extract_query_id(href, &["id", "torrentid", "tid"]))
        });
        let column_id = text_at(id_column)
            .filter(|text| !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()));
        let Some(torrent_id) = link_id.or(column_id) else {
            log::warn!(
                "[{}] skipping HR row without torrent id: {}",
                profile.site,
                table::cell_text(*row)
            );
            continue;
        };

        rows.push(ParsedHrRow {
            torrent_id,
            required_seed_hours: text_at(required).and_then(|t| parse_hours(&t)),
            seeded_hours: text_at(seeded).and_then(|t| parse_hours(&t)),
            deadline: text_at(deadline).and_then(|t| parse_datetime(&t)),
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn profile() -> IntelSiteProfile {
        IntelSiteProfile::new("hdsky")
    }

    #[test]
    fn test_parse_hr_table() {
        let html = r#"
<html><body>
<table class="main">
  <tr><td class="colhead">种子</td><td class="colhead">要求做种时间</td>
      <td class="colhead">已做种时间</td><td class="colhead">截止时间</td></tr>
  <tr><td><a href="details.php?id=101&hit=1">Movie A</a></td>
      <td>72h</td><td>3天</td><td>2026-05-01 12:00:00</td></tr>
  <tr><td><a href="details.php?id=102">Movie B</a></td>
      <td>72</td><td>70.5</td><td>--</td></tr>
  <tr><td>broken row</td><td>72</td><td>1</td><td></td></tr>
</table>
</body></html>"#;

        let page = parse_generic(&profile(), html);
        assert!(page.recognized);
        assert_eq!(page.rows.len(), 2);

        let first = &page.rows[0];
        assert_eq!(first.torrent_id, "101");
        assert_eq!(first.required_seed_hours, Some(72.0));
        assert_eq!(first.seeded_hours, Some(72.0));
        assert_eq!(
            first.deadline,
            Some(Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap())
        );

        let second = &page.rows[1];
        assert_eq!(second.torrent_id, "102");
        assert_eq!(second.seeded_hours, Some(70.5));
        assert_eq!(second.deadline, None);
    }

    #[test]
    fn test_empty_hr_table_is_recognised() {
        let html = "<table><tr><th>Torrent</th><th>Required</th><th>Seeded</th></tr></table>";
        let page = parse_generic(&profile(), html);
        assert!(page.recognized);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_id_column_without_links() {
        let html = "<table><tr><th>ID</th><th>Seed time</th></tr>\
                    <tr><td>555</td><td>10h</td></tr></table>";
        let page = parse_generic(&profile(), html);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].torrent_id, "555");
        assert_eq!(page.rows[0].seeded_hours, Some(10.0));
        assert_eq!(page.rows[0].required_seed_hours, None);
    }

    #[test]
    fn test_unrelated_page_not_recognised() {
        let html = "<p>login required</p><table><tr><td>News</td><td>Date</td></tr></table>";
        let page = parse_generic(&profile(), html);
        assert!(!page.recognized);
        assert!(page.rows.is_empty());
    }
}
