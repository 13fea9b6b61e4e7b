//! Parsed document abstraction
//!
//! The crawler never touches the HTML parser directly. Everything it needs from
//! a page goes through [`ParsedDocument`]: reading a hidden form field, finding
//! anchors whose href matches a pattern, and locating a data table. The
//! `scraper`-backed [`HtmlDocument`] is the only implementation today.

mod html;

pub use html::HtmlDocument;

use regex::{Regex, RegexBuilder};

/// An anchor element whose href matched a requested pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorLink {
    /// Raw href attribute
    pub href: String,

    /// Anchor text with surrounding whitespace removed
    pub text: String,
}

/// One `<td>` of a table body row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableCell {
    /// Cell text, whitespace-collapsed
    pub text: String,

    /// href of the first anchor inside the cell, if any
    pub href: Option<String>,
}

/// A table lifted out of a document
///
/// Only rows and header cells that belong to this table are included; content
/// of nested tables is not attributed to the outer one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlTable {
    /// The table's `id` attribute
    pub id: Option<String>,

    /// Header cell texts in document order
    pub headers: Vec<String>,

    /// Rows that contain at least one `<td>`
    pub rows: Vec<Vec<TableCell>>,
}

/// How a results table is recognised
#[derive(Debug, Clone)]
pub struct TableLocator {
    /// Matched against the table's `id` attribute
    pub id_pattern: Regex,

    /// Header text that marks the table when no id matches
    pub marker_column: String,
}

impl TableLocator {
    /// Builds a locator from a case-insensitive id pattern and a marker header
    pub fn new(id_pattern: &str, marker_column: &str) -> Result<Self, regex::Error> {
        let id_pattern = RegexBuilder::new(id_pattern)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            id_pattern,
            marker_column: marker_column.to_string(),
        })
    }
}

/// Read-only view of a fetched page
pub trait ParsedDocument {
    /// Value of the first `<input name="...">` with this name
    fn hidden_field(&self, name: &str) -> Option<String>;

    /// Anchors with an href matching `pattern`, in document order
    fn find_links_matching(&self, pattern: &Regex) -> Vec<AnchorLink>;

    /// The first table whose id matches the locator, otherwise the first
    /// table whose header cells contain the marker column
    fn find_table(&self, locator: &TableLocator) -> Option<HtmlTable>;

    /// Visible text of the whole document, fragments joined by single spaces
    fn text(&self) -> String;
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
