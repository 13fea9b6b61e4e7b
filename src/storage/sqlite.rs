//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::normalize::{NormalizedListing, INGESTED_AT_FORMAT};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, RunTotals};
use crate::PropgridError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, pages_fetched, raw_rows, listings, error";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(PropgridError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PropgridError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, PropgridError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        totals: RunTotals {
            pages_fetched: row.get::<_, i64>(5)? as u64,
            raw_rows: row.get::<_, i64>(6)? as u64,
            listings: row.get::<_, i64>(7)? as u64,
        },
        error: row.get(8)?,
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<NormalizedListing> {
    let posted_date = row
        .get::<_, Option<String>>(14)?
        .map(|value| NaiveDate::parse_from_str(&value, SNAPSHOT_DATE_FORMAT))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e)))?;

    let ingested_at = DateTime::parse_from_rfc3339(&row.get::<_, String>(17)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(17, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(NormalizedListing {
        property_id: row.get(0)?,
        address: row.get(1)?,
        posted: row.get(2)?,
        city: row.get(3)?,
        region: row.get(4)?,
        acres_raw: row.get(5)?,
        acres: row.get(6)?,
        sqft_raw: row.get(7)?,
        sqft: row.get(8)?,
        price_raw: row.get(9)?,
        price: row.get(10)?,
        status: row.get(11)?,
        mls_text: row.get(12)?,
        mls_url: row.get(13)?,
        posted_date,
        details_url: row.get(15)?,
        image_url: row.get(16)?,
        ingested_at,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs
             SET status = ?1, finished_at = ?2, pages_fetched = ?3, raw_rows = ?4,
                 listings = ?5, error = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.pages_fetched as i64,
                totals.raw_rows as i64,
                totals.listings as i64,
                error,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Listings =====

    fn insert_listings(
        &mut self,
        run_id: i64,
        snapshot_date: NaiveDate,
        listings: &[NormalizedListing],
    ) -> StorageResult<usize> {
        let snapshot = snapshot_date.format(SNAPSHOT_DATE_FORMAT).to_string();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO listings (
                    snapshot_date, property_id, address, posted, city, region,
                    acres_raw, acres, sqft_raw, sqft, price_raw, price, status,
                    mls_text, mls_url, posted_date, details_url, image_url,
                    ingested_at, run_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                           ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;

            for listing in listings {
                let posted_date = listing
                    .posted_date
                    .map(|d| d.format(SNAPSHOT_DATE_FORMAT).to_string());

                inserted += stmt.execute(params![
                    snapshot,
                    listing.property_id,
                    listing.address,
                    listing.posted,
                    listing.city,
                    listing.region,
                    listing.acres_raw,
                    listing.acres,
                    listing.sqft_raw,
                    listing.sqft,
                    listing.price_raw,
                    listing.price,
                    listing.status,
                    listing.mls_text,
                    listing.mls_url,
                    posted_date,
                    listing.details_url,
                    listing.image_url,
                    listing.ingested_at.format(INGESTED_AT_FORMAT).to_string(),
                    run_id,
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn load_snapshot(&self, snapshot_date: NaiveDate) -> StorageResult<Vec<NormalizedListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT property_id, address, posted, city, region, acres_raw, acres,
                    sqft_raw, sqft, price_raw, price, status, mls_text, mls_url,
                    posted_date, details_url, image_url, ingested_at
             FROM listings
             WHERE snapshot_date = ?1
             ORDER BY CAST(property_id AS INTEGER), address, posted",
        )?;

        let listings = stmt
            .query_map(
                params![snapshot_date.format(SNAPSHOT_DATE_FORMAT).to_string()],
                listing_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }

    // ===== Statistics =====

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn listings_per_snapshot(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT snapshot_date, COUNT(*) FROM listings
             GROUP BY snapshot_date
             ORDER BY snapshot_date DESC",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}
