//! Best-effort download of per-listing map PDFs
//!
//! Files are named `{property_id}.pdf` and never overwritten. A failed
//! download is counted and skipped; it does not stop the batch.

use crate::crawler::{HttpRequest, RequestExecutor};
use crate::normalize::NormalizedListing;
use crate::PropgridError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Outcome of a download batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Listings counted against the limit (existing files included)
    pub considered: usize,
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Downloads image artifacts through the crawl's executor
pub struct ArtifactDownloader<'a> {
    executor: &'a RequestExecutor,
    dir: PathBuf,
    limit: usize,
    delay: Duration,
}

impl<'a> ArtifactDownloader<'a> {
    /// # Arguments
    ///
    /// * `executor` - Shares the crawl's client and session cookies
    /// * `dir` - Target directory, created if missing
    /// * `limit` - Maximum listings to consider; existing files count
    /// * `delay` - Pause after every download attempt
    pub fn new(
        executor: &'a RequestExecutor,
        dir: impl Into<PathBuf>,
        limit: usize,
        delay: Duration,
    ) -> Self {
        Self {
            executor,
            dir: dir.into(),
            limit,
            delay,
        }
    }

    /// Path an artifact for `property_id` is written to
    pub fn artifact_path(&self, property_id: &str) -> PathBuf {
        self.dir.join(format!("{}.pdf", property_id))
    }

    /// Downloads artifacts for listings that carry an image URL
    ///
    /// # Returns
    ///
    /// * `Ok(DownloadSummary)` - Batch finished, individual failures counted
    /// * `Err(PropgridError)` - The target directory could not be created
    pub async fn download_all(
        &self,
        listings: &[NormalizedListing],
    ) -> Result<DownloadSummary, PropgridError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut summary = DownloadSummary::default();

        for listing in listings {
            if summary.considered >= self.limit {
                tracing::info!("Artifact limit of {} reached", self.limit);
                break;
            }

            let Some(url) = listing.image_url.as_deref() else {
                continue;
            };
            if listing.property_id.is_empty() {
                continue;
            }

            let dest = self.artifact_path(&listing.property_id);
            if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                summary.considered += 1;
                summary.skipped_existing += 1;
                tracing::debug!("Artifact exists: {}", dest.display());
                continue;
            }

            match self.fetch_to(url, &dest).await {
                Ok(true) => {
                    summary.considered += 1;
                    summary.downloaded += 1;
                    tracing::info!("Downloaded {}", dest.display());
                }
                Ok(false) => {
                    summary.considered += 1;
                    summary.skipped_existing += 1;
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Artifact for {} failed: {}", listing.property_id, e);
                }
            }

            tokio::time::sleep(self.delay).await;
        }

        tracing::info!(
            "Artifacts: {} downloaded, {} already present, {} failed",
            summary.downloaded,
            summary.skipped_existing,
            summary.failed
        );

        Ok(summary)
    }

    /// Fetches `url` into `dest`; `Ok(false)` when the file appeared meanwhile
    ///
    /// The body is written to a `.part` sibling first and linked into place
    /// only once complete, so an interrupted write never leaves a truncated
    /// artifact behind.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<bool, PropgridError> {
        let page = self.executor.execute(&HttpRequest::get(url)).await?;
        let partial = partial_path(dest);

        if let Err(e) = write_complete(&partial, &page.body).await {
            discard(&partial).await;
            return Err(e.into());
        }

        // Linking fails instead of replacing an existing file
        let linked = tokio::fs::hard_link(&partial, dest).await;
        discard(&partial).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Scratch file a download is written to before it is published
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_complete(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}
