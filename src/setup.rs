use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::acquire::{RemoteFetcherTrait, YtDlpFetcher};
use crate::config::Config;
use crate::error::{Result, RemoverError};
use crate::media::{CommandRunner, MediaToolFactory, SystemCommandRunner};

/// Which external tools answered the startup check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolStatus {
    pub processor: bool,
    pub probe: bool,
    pub downloader: bool,
}

pub struct SetupManager {
    runner: Arc<dyn CommandRunner>,
}

impl SetupManager {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemCommandRunner::new()))
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Prepare the uploads directory and report tool availability.
    ///
    /// Missing tools are logged, not fatal: without the probe only metadata
    /// degrades, without the downloader only URL requests fail.
    pub async fn initialize(&self, config: &Config) -> Result<ToolStatus> {
        info!("Initializing music remover...");
        ensure_dir_exists(&config.paths.uploads_dir).await?;

        if let Some(model_dir) = &config.paths.deep_filter_path {
            if !model_dir.is_dir() {
                warn!("Audio isolation model directory not found: {}", model_dir.display());
            }
        }

        let processor = MediaToolFactory::create_processor(config, self.runner.clone());
        let probe = MediaToolFactory::create_probe(config, self.runner.clone());
        let fetcher = YtDlpFetcher::new(
            config.downloader.clone(),
            config.paths.ffmpeg_path.clone(),
            self.runner.clone(),
        );

        let status = ToolStatus {
            processor: report("media processor", processor.check_availability()),
            probe: report("ffprobe", probe.check_availability().await),
            downloader: report("yt-dlp", fetcher.check_availability().await),
        };

        info!("Initialization completed: {:?}", status);
        Ok(status)
    }
}

impl Default for SetupManager {
    fn default() -> Self {
        Self::new()
    }
}

fn report(tool: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{} unavailable: {}", tool, e);
            false
        }
    }
}

/// Create `dir` (and parents) if it does not exist yet
pub async fn ensure_dir_exists(dir: &Path) -> Result<()> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        info!("Creating directory {}", dir.display());
        fs::create_dir_all(dir)
            .await
            .map_err(|e| RemoverError::Write(format!("Cannot create {}: {}", dir.display(), e)))?;
    }
    Ok(())
}
