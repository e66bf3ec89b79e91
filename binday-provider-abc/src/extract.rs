//! Turns the council result page into a collection schedule.

use binday_core::model::{BinType, CollectionSchedule};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, warn};

/// Date format used on the result page.
pub const PAGE_DATE_FORMAT: &str = "%d/%m/%Y";

/// CSS class marking the section of a bin type.
#[must_use]
pub fn marker_class(bin: BinType) -> &'static str {
    match bin {
        BinType::Domestic => "bg-black",
        BinType::Recycling => "bg-green",
        BinType::GardenFood => "bg-brown",
    }
}

/// Extract every collection date listed on the page.
///
/// The result always holds all three bin types; dates keep their page order and
/// unparseable entries are dropped.
#[must_use]
pub fn extract(html: &str) -> CollectionSchedule {
    let mut schedule = CollectionSchedule::empty();
    let Ok(heading_selector) = Selector::parse("h4") else {
        error!("Invalid heading selector");
        return schedule;
    };
    let document = Html::parse_document(html);

    for bin in BinType::ALL {
        let marker = marker_class(bin);
        let Ok(marker_selector) = Selector::parse(&format!("div.{marker}")) else {
            error!(marker, "Invalid marker selector");
            continue;
        };
        for marker_div in document.select(&marker_selector) {
            let Some(section) = dates_section(marker_div) else {
                debug!(marker, "No sibling div found for marker");
                continue;
            };
            for heading in section.select(&heading_selector) {
                let text = heading.text().collect::<String>();
                let text = text.trim();
                match NaiveDate::parse_from_str(text, PAGE_DATE_FORMAT) {
                    Ok(date) => schedule.push(bin, date),
                    Err(err) => warn!(%bin, text, error = %err, "Error parsing date"),
                }
            }
        }
    }

    debug!(collections = schedule.collection_count(), "Parsed bin collection data");
    schedule
}

// First `div` following the marker's parent.
fn dates_section(marker_div: ElementRef<'_>) -> Option<ElementRef<'_>> {
    marker_div
        .parent()?
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "div")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn section(marker: &str, headings: &[&str]) -> String {
        let dates: String = headings.iter().map(|text| format!("<h4> {text} </h4>")).collect();
        format!(
            r#"<div class="row"><div class="col"><div class="icon {marker}"></div></div>
            <p>ignored</p>
            <div class="col-dates">{dates}</div></div>"#
        )
    }

    #[test]
    fn reads_dates_per_marker() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            section("bg-black", &["25/12/2025"]),
            section("bg-green", &["not a date", "32/01/2026"]),
        );
        let schedule = extract(&html);

        assert_eq!(schedule.dates(BinType::Domestic), &[date(2025, 12, 25)]);
        assert!(schedule.dates(BinType::Recycling).is_empty());
        assert!(schedule.dates(BinType::GardenFood).is_empty());
        assert_eq!(schedule.iter().count(), 3);
    }

    #[test]
    fn keeps_page_order_and_drops_bad_entries() {
        let html = section("bg-brown", &["19/01/2026", "Tuesday", "05/01/2026"]);
        let schedule = extract(&html);
        assert_eq!(
            schedule.dates(BinType::GardenFood),
            &[date(2026, 1, 19), date(2026, 1, 5)]
        );
    }

    #[test]
    fn repeated_markers_accumulate() {
        let html = format!(
            "{}{}",
            section("bg-black", &["01/01/2026"]),
            section("bg-black", &["15/01/2026"]),
        );
        assert_eq!(
            extract(&html).dates(BinType::Domestic),
            &[date(2026, 1, 1), date(2026, 1, 15)]
        );
    }

    #[test]
    fn marker_without_section_contributes_nothing() {
        let html = r#"<div><div class="bg-black"></div></div><h4>01/01/2026</h4>"#;
        assert!(extract(html).dates(BinType::Domestic).is_empty());
    }

    #[test]
    fn garbage_input_yields_three_empty_lists() {
        for html in ["", "<<<>>>", "<html><body><h4>25/12/2025</h4></body></html>"] {
            let schedule = extract(html);
            assert_eq!(schedule.iter().count(), 3);
            assert!(schedule.is_empty());
        }
    }
}
