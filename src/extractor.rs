//! Pulls the most recent news entry out of the news page.
//!
//! Everything that knows about the site's markup lives in the selectors
//! below; a redesign of the page should only touch this file.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use crate::entry::EntryRecord;
use crate::error::{AppError, Result};

static ENTRY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.ui.form").expect("Failed to parse entry selector")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.title.alf-click-acctitle").expect("Failed to parse title selector")
});

static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.ui.label").expect("Failed to parse date selector")
});

static DOC_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.item.alf-file-show").expect("Failed to parse document link selector")
});

pub fn extract_entry(html: &str) -> Result<EntryRecord> {
    let document = Html::parse_document(html);
    extract(&document)
}

pub fn extract(document: &Html) -> Result<EntryRecord> {
    let entry = document
        .select(&ENTRY_SELECTOR)
        .next()
        .ok_or_else(|| missing("entry container"))?;

    let entry_id = entry
        .value()
        .attr("data-element")
        .ok_or_else(|| missing("entry data-element attribute"))?;

    let title_block = entry
        .select(&TITLE_SELECTOR)
        .next()
        .ok_or_else(|| missing("entry title block"))?;

    let date_label = title_block
        .select(&DATE_SELECTOR)
        .next()
        .ok_or_else(|| missing("entry date label"))?;
    let entry_date = text_of(&date_label).trim().to_string();

    let entry_title = normalize_title(&text_of(&title_block), &entry_date);

    let entry_doc = entry
        .select(&DOC_SELECTOR)
        .next()
        .ok_or_else(|| missing("document link"))?
        .value()
        .attr("href")
        .ok_or_else(|| missing("document link href"))?;

    Ok(EntryRecord {
        entry_id: escape_html(entry_id),
        entry_date: escape_html(&entry_date),
        entry_title: escape_html(&entry_title),
        entry_doc: escape_html(entry_doc),
    })
}

fn missing(what: &str) -> AppError {
    AppError::Parse(format!("No {} found on the news page", what))
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect()
}

/// Collapses every whitespace run to one space and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = true;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Title text with whitespace collapsed and the date label removed.
pub fn normalize_title(raw: &str, date: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    if date.is_empty() {
        return collapsed;
    }
    collapse_whitespace(&collapsed.replace(date, ""))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
