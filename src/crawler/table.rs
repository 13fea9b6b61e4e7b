//! Results-table extraction
//!
//! Columns are bound by header text, never by position; the grid has been
//! seen to reorder them. A body row is only trusted when its cell count equals
//! the header count and its identifier cell is a plain non-negative integer.
//! Everything else (pager rows, subtotals, footers) is skipped and logged.

use crate::config::TableConfig;
use crate::document::{collapse_whitespace, HtmlTable, ParsedDocument, TableLocator};
use crate::ConfigError;
use std::collections::BTreeMap;

/// Header names of the property grid
pub mod columns {
    pub const ID: &str = "ID";
    pub const ADDRESS: &str = "Municipal Address";
    pub const REGION: &str = "Region";
    pub const CITY: &str = "City";
    pub const ACRES: &str = "Acres";
    pub const SQFT: &str = "Square Feet";
    pub const PRICE: &str = "Price";
    pub const STATUS: &str = "Status";
    pub const MLS: &str = "MLS";
    pub const POSTED: &str = "Posted";
    pub const DETAILS: &str = "Details";
    pub const IMAGE: &str = "Image";
}

/// One table row keyed by header text
///
/// Produced fresh per row; carries no identity beyond its position on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: BTreeMap<String, String>,
    links: BTreeMap<String, String>,
}

impl RawRow {
    /// Builds a row from `(header, text, href)` triples
    pub fn from_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, Option<&'a str>)>,
    {
        let mut row = Self::default();
        for (header, text, href) in cells {
            row.cells.insert(header.to_string(), text.to_string());
            if let Some(href) = href {
                row.links.insert(header.to_string(), href.to_string());
            }
        }
        row
    }

    /// Cell text under `header`; empty when the column is absent
    ///
    /// Falls back to a case-insensitive header match so minor capitalisation
    /// drift in the grid does not blank a column.
    pub fn cell(&self, header: &str) -> &str {
        lookup(&self.cells, header).unwrap_or("")
    }

    /// href of the anchor in the cell under `header`
    pub fn link(&self, header: &str) -> Option<&str> {
        lookup(&self.links, header)
    }

    /// Headers present on this row
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }
}

fn lookup<'a>(map: &'a BTreeMap<String, String>, header: &str) -> Option<&'a str> {
    map.get(header)
        .or_else(|| {
            map.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(header))
                .map(|(_, value)| value)
        })
        .map(String::as_str)
}

/// True for an unbroken run of ASCII decimal digits
pub fn is_numeric_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Locates the results table and lifts its rows
#[derive(Debug, Clone)]
pub struct TableExtractor {
    locator: TableLocator,
    id_column: String,
}

impl TableExtractor {
    pub fn new(locator: TableLocator, id_column: impl Into<String>) -> Self {
        Self {
            locator,
            id_column: id_column.into(),
        }
    }

    pub fn from_config(config: &TableConfig) -> Result<Self, ConfigError> {
        let locator = TableLocator::new(&config.id_pattern, &config.marker_column).map_err(|e| {
            ConfigError::InvalidPattern(format!("id_pattern '{}': {}", config.id_pattern, e))
        })?;
        Ok(Self::new(locator, config.id_column.clone()))
    }

    /// Extracts all valid rows from the page's results table
    ///
    /// A page without a recognisable table yields no rows; that is a normal
    /// outcome when the grid is empty or its markup has changed.
    pub fn extract<D: ParsedDocument + ?Sized>(&self, doc: &D) -> Vec<RawRow> {
        match doc.find_table(&self.locator) {
            Some(table) => self.rows_from_table(&table),
            None => {
                tracing::debug!("No results table found on page");
                Vec::new()
            }
        }
    }

    /// Converts a located table into validated rows
    pub fn rows_from_table(&self, table: &HtmlTable) -> Vec<RawRow> {
        let headers: Vec<String> = table
            .headers
            .iter()
            .map(|h| collapse_whitespace(h))
            .collect();

        if !headers.iter().any(|h| h.eq_ignore_ascii_case(&self.id_column)) {
            tracing::warn!(
                "Results table {} has no '{}' column (headers: {:?})",
                table.id.as_deref().unwrap_or("<unnamed>"),
                self.id_column,
                headers
            );
            return Vec::new();
        }

        let mut rows = Vec::with_capacity(table.rows.len());
        for (index, cells) in table.rows.iter().enumerate() {
            if cells.len() != headers.len() {
                tracing::debug!(
                    "Skipping row {}: {} cells for {} headers",
                    index,
                    cells.len(),
                    headers.len()
                );
                continue;
            }

            let row = RawRow::from_cells(
                headers
                    .iter()
                    .zip(cells)
                    .map(|(header, cell)| (header.as_str(), cell.text.as_str(), cell.href.as_deref())),
            );

            let id = row.cell(&self.id_column);
            if !is_numeric_id(id) {
                tracing::debug!("Skipping row {}: non-numeric identifier {:?}", index, id);
                continue;
            }

            rows.push(row);
        }

        tracing::debug!(
            "Extracted {} of {} body rows from results table",
            rows.len(),
            table.rows.len()
        );
        rows
    }
}
