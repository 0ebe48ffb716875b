use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};

use super::{element_text, normalize_body, parse_page_date, selector, signature_snapshot, ExtractError};
use crate::settings::UrlTemplates;

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| selector("div#content > h1"));
static DETAILS_ROW_SEL: LazyLock<Selector> = LazyLock::new(|| selector("table.petition-details tr"));
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| selector("div#petition-details"));

/// Full view of one petition as seen at `retrieved_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionDetail {
    pub reference_id: String,
    pub url: String,
    pub title: String,
    pub principal: String,
    pub body: String,
    pub signatures: String,
    pub sign_uri: String,
    pub retrieved_at: NaiveDateTime,
    pub closed_at: NaiveDate,
}

pub fn extract(
    reference_id: &str,
    url: &str,
    retrieved_at: NaiveDateTime,
    doc: &Html,
    urls: &UrlTemplates,
) -> Result<PetitionDetail, ExtractError> {
    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|h1| element_text(h1).trim().to_string())
        .ok_or(ExtractError::MissingField("title"))?;

    // Rows are principal, closing date, signatures; the value sits in the second cell.
    let rows: Vec<ElementRef> = doc.select(&DETAILS_ROW_SEL).take(3).collect();
    let value_cell = |idx: usize, field: &'static str| -> Result<String, ExtractError> {
        rows.get(idx)
            .and_then(|row| row.select(&CELL_SEL).nth(1))
            .map(element_text)
            .ok_or(ExtractError::MissingField(field))
    };

    let principal = value_cell(0, "principal")?.trim().to_string();
    let closed_at = parse_page_date(&value_cell(1, "closed_at")?)?;
    let signatures = signature_snapshot(&value_cell(2, "signatures")?);

    let body = doc
        .select(&BODY_SEL)
        .next()
        .map(|div| normalize_body(&element_text(div)))
        .ok_or(ExtractError::MissingField("body"))?;

    Ok(PetitionDetail {
        reference_id: reference_id.to_string(),
        url: url.to_string(),
        title,
        principal,
        body,
        signatures,
        sign_uri: urls.sign_url(reference_id),
        retrieved_at,
        closed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        Html::parse_document(&html)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 3).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    fn run(doc: &Html) -> Result<PetitionDetail, ExtractError> {
        let urls = UrlTemplates::default();
        extract("1021", &urls.item_url("1021"), now(), doc, &urls)
    }

    #[test]
    fn detail_page_fields() {
        let d = run(&fixture("detail")).unwrap();
        assert_eq!(d.title, "Install pedestrian crossing on Logan Road");
        assert_eq!(d.principal, "Jane Citizen, Greenslopes");
        assert_eq!(d.closed_at, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(d.signatures, "1,234");
        assert_eq!(d.sign_uri, "https://www.epetitions.brisbane.qld.gov.au/petition/sign/pid/1021");
        assert_eq!(d.url, "https://epetitions.brisbane.qld.gov.au/petition/view/pid/1021");
        assert_eq!(d.retrieved_at, now());
    }

    #[test]
    fn detail_body_normalized() {
        let d = run(&fixture("detail")).unwrap();
        assert_eq!(
            d.body,
            "We the undersigned residents request a signalised crossing.\nThe intersection is dangerous. Please act now."
        );
    }

    #[test]
    fn missing_title_is_reported() {
        assert_eq!(
            run(&fixture("detail_missing_title")),
            Err(ExtractError::MissingField("title"))
        );
    }

    #[test]
    fn title_is_direct_child_of_content() {
        let doc = Html::parse_document(
            r#"<div id="content">
               <div class="sidebar"><h1>Related petitions</h1></div>
               <h1>T</h1>
               <table class="petition-details">
                 <tr><td>Principal</td><td>P</td></tr>
                 <tr><td>Closing date</td><td>Mon, 01 Jan 2024</td></tr>
                 <tr><td>Signatures</td><td>3 signatures</td></tr>
               </table>
               <div id="petition-details">Body</div></div>"#,
        );
        assert_eq!(run(&doc).unwrap().title, "T");
    }

    #[test]
    fn missing_signature_row_is_reported() {
        let doc = Html::parse_document(
            r#"<div id="content"><h1>T</h1>
               <table class="petition-details">
                 <tr><td>Principal</td><td>P</td></tr>
                 <tr><td>Closing date</td><td>Mon, 01 Jan 2024</td></tr>
               </table>
               <div id="petition-details">Body</div></div>"#,
        );
        assert_eq!(run(&doc), Err(ExtractError::MissingField("signatures")));
    }

    #[test]
    fn missing_body_is_reported() {
        let doc = Html::parse_document(
            r#"<div id="content"><h1>T</h1>
               <table class="petition-details">
                 <tr><td>Principal</td><td>P</td></tr>
                 <tr><td>Closing date</td><td>Mon, 01 Jan 2024</td></tr>
                 <tr><td>Signatures</td><td>3 signatures</td></tr>
               </table></div>"#,
        );
        assert_eq!(run(&doc), Err(ExtractError::MissingField("body")));
    }
}
