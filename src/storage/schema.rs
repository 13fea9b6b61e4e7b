//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the snapshot database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    raw_rows INTEGER NOT NULL DEFAULT 0,
    listings INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

-- One row per listing per snapshot day
CREATE TABLE IF NOT EXISTS listings (
    snapshot_date TEXT NOT NULL,
    property_id TEXT NOT NULL,
    address TEXT NOT NULL,
    posted TEXT NOT NULL,
    city TEXT NOT NULL,
    region TEXT NOT NULL,
    acres_raw TEXT NOT NULL,
    acres REAL,
    sqft_raw TEXT NOT NULL,
    sqft REAL,
    price_raw TEXT NOT NULL,
    price REAL,
    status TEXT NOT NULL,
    mls_text TEXT NOT NULL,
    mls_url TEXT,
    posted_date TEXT,
    details_url TEXT,
    image_url TEXT,
    ingested_at TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    PRIMARY KEY (snapshot_date, property_id, address, posted)
);

CREATE INDEX IF NOT EXISTS idx_listings_property ON listings(property_id);
CREATE INDEX IF NOT EXISTS idx_listings_run ON listings(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
