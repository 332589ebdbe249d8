use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, debug, warn};

use crate::config::DownloaderConfig;
use crate::error::{Result, RemoverError};
use crate::media::{CommandOutput, CommandRunner, ToolCommand};

/// Metadata obtained without downloading any content
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMetadata {
    pub title: String,
    pub id: Option<String>,
    pub ext: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
}

// Subset of `yt-dlp -J` output
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    id: Option<String>,
    ext: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
}

/// Remote video download tool
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFetcherTrait: Send + Sync {
    /// Metadata-only lookup of `url`
    async fn resolve(&self, url: &str) -> Result<RemoteMetadata>;

    /// Download `url` into `uploads_dir` as `<base>.<ext>` and return the file
    async fn fetch(&self, url: &str, uploads_dir: &Path, base: &str) -> Result<PathBuf>;

    async fn check_availability(&self) -> Result<()>;
}

/// yt-dlp driven through its command line
pub struct YtDlpFetcher {
    config: DownloaderConfig,
    ffmpeg_location: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl YtDlpFetcher {
    pub fn new(
        config: DownloaderConfig,
        ffmpeg_location: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            ffmpeg_location,
            runner,
        }
    }

    pub fn resolve_command(&self, url: &str) -> ToolCommand {
        ToolCommand::new(&self.config.binary_path, "Remote metadata lookup")
            .args(["-J", "--skip-download", "--no-playlist", "--no-warnings", "--"])
            .arg(url)
            .timeout_secs(self.config.timeout_secs)
    }

    pub fn fetch_command(&self, url: &str, uploads_dir: &Path, base: &str) -> ToolCommand {
        let template = uploads_dir.join(format!("{}.%(ext)s", base));

        let mut command = ToolCommand::new(&self.config.binary_path, "Remote download")
            .arg("-f")
            .arg(&self.config.format)
            .args(["--no-playlist", "-k", "--no-warnings"])
            .arg("-N")
            .arg(self.config.concurrent_fragments.to_string())
            .args(["--print", "after_move:filepath"])
            .arg("-o")
            .path_arg(template);

        if let Some(location) = &self.ffmpeg_location {
            command = command.arg("--ffmpeg-location").path_arg(location);
        }

        command
            .arg("--")
            .arg(url)
            .timeout_secs(self.config.timeout_secs)
    }
}

fn last_stderr_line(output: &CommandOutput) -> String {
    output
        .stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("yt-dlp failed")
        .to_string()
}

/// Parse `yt-dlp -J` output into metadata; the title is required
pub fn parse_metadata(stdout: &str) -> Result<RemoteMetadata> {
    let info: YtDlpInfo = serde_json::from_str(stdout)
        .map_err(|e| RemoverError::Resolution(format!("Unreadable metadata: {}", e)))?;

    let title = info
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RemoverError::Resolution("Metadata has no title".to_string()))?;

    Ok(RemoteMetadata {
        title,
        id: info.id,
        ext: info.ext,
        duration: info.duration,
        uploader: info.uploader,
    })
}

/// Locate the downloaded file from the `after_move:filepath` lines
pub fn downloaded_path(stdout: &str, uploads_dir: &Path, base: &str) -> Option<PathBuf> {
    let printed = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| {
            let path = PathBuf::from(line);
            if path.is_absolute() { path } else { uploads_dir.join(path) }
        });

    match printed {
        Some(path) if path.is_file() => Some(path),
        Some(path) => {
            warn!("yt-dlp reported {} but it does not exist", path.display());
            None
        }
        None => {
            let fallback = uploads_dir.join(format!("{}.mp4", base));
            fallback.is_file().then_some(fallback)
        }
    }
}

#[async_trait]
impl RemoteFetcherTrait for YtDlpFetcher {
    async fn resolve(&self, url: &str) -> Result<RemoteMetadata> {
        debug!("Resolving metadata for {}", url);
        let output = self
            .runner
            .run(&self.resolve_command(url))
            .await
            .map_err(|e| RemoverError::Resolution(e.to_string()))?;

        if !output.success() {
            return Err(RemoverError::Resolution(last_stderr_line(&output)));
        }

        let metadata = parse_metadata(&output.stdout)?;
        info!(
            "Resolved '{}' (id: {}, uploader: {}, duration: {}, ext: {})",
            metadata.title,
            metadata.id.as_deref().unwrap_or("-"),
            metadata.uploader.as_deref().unwrap_or("-"),
            metadata.duration.map(|d| format!("{:.0}s", d)).unwrap_or_else(|| "-".to_string()),
            metadata.ext.as_deref().unwrap_or("-"),
        );
        Ok(metadata)
    }

    async fn fetch(&self, url: &str, uploads_dir: &Path, base: &str) -> Result<PathBuf> {
        info!("Downloading {} into {}", url, uploads_dir.display());
        let output = self
            .runner
            .run(&self.fetch_command(url, uploads_dir, base))
            .await
            .map_err(|e| RemoverError::Fetch(e.to_string()))?;

        if !output.success() {
            return Err(RemoverError::Fetch(last_stderr_line(&output)));
        }

        let path = downloaded_path(&output.stdout, uploads_dir, base).ok_or_else(|| {
            RemoverError::Fetch("Downloaded file could not be located".to_string())
        })?;
        info!("Download completed: {}", path.display());
        Ok(path)
    }

    async fn check_availability(&self) -> Result<()> {
        let command = ToolCommand::new(&self.config.binary_path, "Downloader version check")
            .arg("--version")
            .timeout_secs(Some(10));
        let output = self.runner.run(&command).await?;

        if output.success() {
            info!("Downloader is available: yt-dlp {}", output.stdout.trim());
            Ok(())
        } else {
            Err(RemoverError::Config("yt-dlp version check failed".to_string()))
        }
    }
}
