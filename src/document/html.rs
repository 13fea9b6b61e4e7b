//! `scraper`-backed implementation of [`ParsedDocument`]

use super::{collapse_whitespace, AnchorLink, HtmlTable, ParsedDocument, TableCell, TableLocator};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// A parsed HTML page
///
/// `scraper::Html` is not `Send`, so a document should be dropped before the
/// caller awaits anything.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    /// Parses a full HTML document
    ///
    /// html5ever recovers from any malformed input, so parsing never fails.
    ///
    /// # Example
    ///
    /// ```
    /// use propgrid::document::{HtmlDocument, ParsedDocument};
    ///
    /// let doc = HtmlDocument::parse(r#"<form><input name="__VIEWSTATE" value="abc"></form>"#);
    /// assert_eq!(doc.hidden_field("__VIEWSTATE"), Some("abc".to_string()));
    /// ```
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }
}

impl ParsedDocument for HtmlDocument {
    fn hidden_field(&self, name: &str) -> Option<String> {
        let input_selector = Selector::parse("input[name]").ok()?;

        self.html
            .select(&input_selector)
            .find(|input| input.value().attr("name") == Some(name))
            .and_then(|input| input.value().attr("value"))
            .map(str::to_string)
    }

    fn find_links_matching(&self, pattern: &Regex) -> Vec<AnchorLink> {
        let Ok(a_selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        self.html
            .select(&a_selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                pattern.is_match(href).then(|| AnchorLink {
                    href: href.to_string(),
                    text: element_text(anchor),
                })
            })
            .collect()
    }

    fn find_table(&self, locator: &TableLocator) -> Option<HtmlTable> {
        let table_selector = Selector::parse("table").ok()?;

        // Identifier match wins over the header heuristic
        let by_id = self.html.select(&table_selector).find(|table| {
            table
                .value()
                .attr("id")
                .is_some_and(|id| locator.id_pattern.is_match(id))
        });

        if let Some(table) = by_id {
            return Some(lift_table(table));
        }

        self.html
            .select(&table_selector)
            .map(lift_table)
            .find(|table| {
                table
                    .headers
                    .iter()
                    .any(|header| header.contains(&locator.marker_column))
            })
    }

    fn text(&self) -> String {
        collapse_whitespace(&self.html.root_element().text().collect::<Vec<_>>().join(" "))
    }
}

/// Converts a `<table>` element into headers and body rows
fn lift_table(table: ElementRef<'_>) -> HtmlTable {
    let (Ok(th_selector), Ok(tr_selector), Ok(td_selector), Ok(a_selector)) = (
        Selector::parse("th"),
        Selector::parse("tr"),
        Selector::parse("td"),
        Selector::parse("a[href]"),
    ) else {
        return HtmlTable::default();
    };

    let headers = table
        .select(&th_selector)
        .filter(|th| nearest_ancestor_is(*th, "table", table))
        .map(element_text)
        .collect();

    let rows = table
        .select(&tr_selector)
        .filter(|tr| nearest_ancestor_is(*tr, "table", table))
        .map(|tr| {
            tr.select(&td_selector)
                .filter(|td| nearest_ancestor_is(*td, "tr", tr))
                .map(|td| TableCell {
                    text: element_text(td),
                    href: td
                        .select(&a_selector)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                        .map(str::to_string),
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    HtmlTable {
        id: table.value().attr("id").map(str::to_string),
        headers,
        rows,
    }
}

/// True if the closest `tag` ancestor of `element` is `owner`
fn nearest_ancestor_is(element: ElementRef<'_>, tag: &str, owner: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .find(|node| {
            node.value()
                .as_element()
                .is_some_and(|e| e.name().eq_ignore_ascii_case(tag))
        })
        .is_some_and(|node| node.id() == owner.id())
}

/// Text content of an element, whitespace-collapsed
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}
