//! Row normalization
//!
//! Turns raw header-keyed rows into typed, deduplicated listings. Each field
//! is coerced on its own; a cell that cannot be parsed becomes `None` without
//! affecting its neighbours.

mod coerce;

pub use coerce::{parse_number, parse_posted_date, parse_price};

use crate::crawler::{columns, RawRow};
use crate::url::{LinkKind, LinkResolver};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Timestamp format written for `ingested_at`
pub const INGESTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One property listing in its stable output shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedListing {
    pub property_id: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub acres_raw: String,
    pub acres: Option<f64>,
    pub sqft_raw: String,
    pub sqft: Option<f64>,
    pub price_raw: String,
    pub price: Option<f64>,
    pub status: String,
    pub mls_text: String,
    pub mls_url: Option<String>,
    pub posted: String,
    pub posted_date: Option<NaiveDate>,
    pub details_url: Option<String>,
    pub image_url: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl NormalizedListing {
    /// Key under which duplicates collapse
    pub fn dedup_key(&self) -> (&str, &str, &str) {
        (&self.property_id, &self.address, &self.posted)
    }

    /// `ingested_at` rendered as `YYYY-MM-DDTHH:MM:SSZ`
    pub fn ingested_at_string(&self) -> String {
        self.ingested_at.format(INGESTED_AT_FORMAT).to_string()
    }

    /// Projects a single raw row
    pub fn from_row(row: &RawRow, resolver: &LinkResolver, ingested_at: DateTime<Utc>) -> Self {
        let text = |header: &str| row.cell(header).trim().to_string();

        let acres_raw = text(columns::ACRES);
        let sqft_raw = text(columns::SQFT);
        let price_raw = text(columns::PRICE);
        let posted = text(columns::POSTED);

        Self {
            property_id: text(columns::ID),
            address: text(columns::ADDRESS),
            city: text(columns::CITY),
            region: text(columns::REGION),
            acres: parse_number(&acres_raw),
            acres_raw,
            sqft: parse_number(&sqft_raw),
            sqft_raw,
            price: parse_price(&price_raw),
            price_raw,
            status: text(columns::STATUS),
            mls_text: text(columns::MLS),
            mls_url: resolver.resolve(row.link(columns::MLS), LinkKind::Mls),
            posted_date: parse_posted_date(&posted),
            posted,
            details_url: resolver.resolve(row.link(columns::DETAILS), LinkKind::Details),
            image_url: resolver.resolve(row.link(columns::IMAGE), LinkKind::Image),
            ingested_at,
        }
    }
}

/// Ingestion stamp for a run: UTC, truncated to whole seconds
pub fn ingestion_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(0)
}

/// Normalizes and deduplicates rows, keeping the first occurrence of each
/// `(property_id, address, posted)` key in input order
pub fn normalize_rows(
    rows: &[RawRow],
    resolver: &LinkResolver,
    ingested_at: DateTime<Utc>,
) -> Vec<NormalizedListing> {
    let ingested_at = ingestion_timestamp(ingested_at);
    let mut seen: HashSet<(String, String, String)> = HashSet::with_capacity(rows.len());
    let mut listings = Vec::with_capacity(rows.len());

    for row in rows {
        let listing = NormalizedListing::from_row(row, resolver, ingested_at);
        let (id, address, posted) = listing.dedup_key();
        if !seen.insert((id.to_string(), address.to_string(), posted.to_string())) {
            continue;
        }
        listings.push(listing);
    }

    let dropped = rows.len() - listings.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} duplicate rows during normalization", dropped);
    }

    listings
}
