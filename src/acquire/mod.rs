// Media acquisition
//
// Turns an uploaded file or a remote URL into a local file under the
// uploads directory:
// - Naming: sanitizer, URL check and derived artifact names
// - Locks: per-base-name serialization across concurrent requests
// - Downloader: yt-dlp metadata lookup and download

pub mod downloader;
pub mod locks;
pub mod naming;

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, debug};

pub use downloader::*;
pub use locks::*;
pub use naming::*;

use crate::config::Config;
use crate::error::{Result, RemoverError};
use crate::media::CommandRunner;

/// A local media file owned by one request
#[derive(Debug)]
pub struct AcquiredMedia {
    pub path: PathBuf,
    pub base_name: String,
    // Held until the request drops this value
    _lease: Option<BaseNameLease>,
}

impl AcquiredMedia {
    pub fn new(path: PathBuf, base_name: String, lease: Option<BaseNameLease>) -> Self {
        Self {
            path,
            base_name,
            _lease: lease,
        }
    }
}

/// Materializes user references as local files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaAcquirerTrait: Send + Sync {
    /// Store uploaded bytes under the sanitized upload name
    async fn acquire_from_upload(&self, name: &str, content: &[u8]) -> Result<AcquiredMedia>;

    /// Resolve, clean up and download a remote video
    async fn acquire_from_url(&self, url: &str) -> Result<AcquiredMedia>;
}

pub struct AcquisitionService {
    uploads_dir: PathBuf,
    fetcher: Box<dyn RemoteFetcherTrait>,
    locks: BaseNameLocks,
}

impl AcquisitionService {
    pub fn new(uploads_dir: PathBuf, fetcher: Box<dyn RemoteFetcherTrait>, locks: BaseNameLocks) -> Self {
        Self {
            uploads_dir,
            fetcher,
            locks,
        }
    }

    /// Build the service with the yt-dlp fetcher from `config`
    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>, locks: BaseNameLocks) -> Self {
        let fetcher = YtDlpFetcher::new(
            config.downloader.clone(),
            config.paths.ffmpeg_path.clone(),
            runner,
        );
        Self::new(config.paths.uploads_dir.clone(), Box::new(fetcher), locks)
    }
}

/// Write `content` to `target` through a temporary file in the same directory
fn write_atomically(dir: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl MediaAcquirerTrait for AcquisitionService {
    async fn acquire_from_upload(&self, name: &str, content: &[u8]) -> Result<AcquiredMedia> {
        let sanitized = SanitizedName::new(name);
        if sanitized.is_unusable() {
            return Err(RemoverError::InvalidReference(format!("Unusable upload name: {:?}", name)));
        }
        let base = sanitized.base_name().to_string();

        let lease = self.locks.acquire(&base).await;
        remove_stale_artifacts(&self.uploads_dir, &base).await?;

        let target = self.uploads_dir.join(sanitized.as_str());
        debug!("Writing {} bytes to {}", content.len(), target.display());

        let dir = self.uploads_dir.clone();
        let destination = target.clone();
        let bytes = content.to_vec();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &destination, &bytes))
            .await
            .map_err(|e| RemoverError::Write(format!("Upload writer stopped: {}", e)))?
            .map_err(|e| RemoverError::Write(format!("{}: {}", target.display(), e)))?;

        let path = std::path::absolute(&target)
            .map_err(|e| RemoverError::Write(format!("{}: {}", target.display(), e)))?;
        info!("Stored upload at {}", path.display());

        Ok(AcquiredMedia::new(path, base, Some(lease)))
    }

    async fn acquire_from_url(&self, url: &str) -> Result<AcquiredMedia> {
        // Metadata first: a failed lookup must not delete anything
        let metadata = self.fetcher.resolve(url).await?;
        let sanitized = SanitizedName::new(&metadata.title);
        if sanitized.is_unusable() {
            return Err(RemoverError::Resolution(format!("Unusable title: {:?}", metadata.title)));
        }
        let base = sanitized.as_str().to_string();

        let lease = self.locks.acquire(&base).await;
        remove_stale_artifacts(&self.uploads_dir, &base).await?;

        let fetched = self.fetcher.fetch(url, &self.uploads_dir, &base).await?;
        let path = std::path::absolute(&fetched)
            .map_err(|e| RemoverError::Fetch(format!("{}: {}", fetched.display(), e)))?;

        Ok(AcquiredMedia::new(path, base, Some(lease)))
    }
}
