use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};

use super::{element_text, parse_page_date, selector, ExtractError};
use crate::settings::UrlTemplates;

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| selector("table.petitions tr"));
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| selector("a"));

/// One row of the petition index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionSummary {
    pub reference_id: String,
    pub title: String,
    pub url: String,
    pub principal: String,
    pub closed_at: NaiveDate,
}

/// Summaries from the index page, header row skipped. No page means no petitions.
pub fn extract(doc: Option<&Html>, urls: &UrlTemplates) -> Result<Vec<PetitionSummary>, ExtractError> {
    let Some(doc) = doc else {
        return Ok(Vec::new());
    };

    doc.select(&ROW_SEL)
        .skip(1)
        .enumerate()
        .map(|(i, row)| {
            let row_no = i + 1;
            let cells: Vec<_> = row.select(&CELL_SEL).collect();
            if cells.len() < 3 {
                return Err(ExtractError::MalformedRow { row: row_no, reason: "expected 3 cells" });
            }

            let link = cells[0]
                .select(&LINK_SEL)
                .next()
                .ok_or(ExtractError::MalformedRow { row: row_no, reason: "no link in first cell" })?;
            let href = link
                .value()
                .attr("href")
                .ok_or(ExtractError::MalformedRow { row: row_no, reason: "link has no href" })?;
            let reference_id = href.trim_end_matches('/').rsplit('/').next().unwrap_or_default().to_string();
            if reference_id.is_empty() {
                return Err(ExtractError::MalformedRow { row: row_no, reason: "empty reference id" });
            }

            Ok(PetitionSummary {
                url: urls.item_url(&reference_id),
                title: element_text(link).trim().to_string(),
                principal: element_text(cells[1]).trim().to_string(),
                closed_at: parse_page_date(&element_text(cells[2]))?,
                reference_id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn listing_skips_header() {
        let doc = fixture("listing");
        let items = extract(Some(&doc), &UrlTemplates::default()).unwrap();
        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(first.reference_id, "1021");
        assert_eq!(first.title, "Install pedestrian crossing on Logan Road");
        assert_eq!(first.principal, "Jane Citizen");
        assert_eq!(first.closed_at, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.url, "https://epetitions.brisbane.qld.gov.au/petition/view/pid/1021");

        let ids: Vec<&str> = items.iter().map(|s| s.reference_id.as_str()).collect();
        assert_eq!(ids, ["1021", "1022", "1023"]);
    }

    #[test]
    fn absent_listing_is_empty() {
        assert!(extract(None, &UrlTemplates::default()).unwrap().is_empty());
    }

    #[test]
    fn header_only_listing_is_empty() {
        let doc = Html::parse_document(
            r#"<table class="petitions"><tr><th>Petition</th><th>Principal</th><th>Closing</th></tr></table>"#,
        );
        assert!(extract(Some(&doc), &UrlTemplates::default()).unwrap().is_empty());
    }

    #[test]
    fn short_row_is_fatal() {
        let doc = Html::parse_document(
            r#"<table class="petitions">
                <tr><th>Petition</th><th>Principal</th><th>Closing</th></tr>
                <tr><td><a href="/petition/view/pid/9">Nine</a></td><td>Someone</td></tr>
            </table>"#,
        );
        assert_eq!(
            extract(Some(&doc), &UrlTemplates::default()),
            Err(ExtractError::MalformedRow { row: 1, reason: "expected 3 cells" })
        );
    }

    #[test]
    fn bad_date_is_fatal() {
        let doc = Html::parse_document(
            r#"<table class="petitions">
                <tr><th>Petition</th><th>Principal</th><th>Closing</th></tr>
                <tr><td><a href="/petition/view/pid/9">Nine</a></td><td>Someone</td><td>soon</td></tr>
            </table>"#,
        );
        assert_eq!(
            extract(Some(&doc), &UrlTemplates::default()),
            Err(ExtractError::BadDate("soon".into()))
        );
    }
}
