use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::{Result, RemoverError};
use super::{CommandRunner, MediaKind, MediaProbeTrait, ToolCommand};

/// ffprobe-based stream classification
pub struct FfprobeProbe {
    config: ProbeConfig,
    runner: Arc<dyn CommandRunner>,
}

impl FfprobeProbe {
    pub fn new(config: ProbeConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// One codec type per line, no wrapper formatting
    pub fn build_command(&self, path: &Path) -> ToolCommand {
        ToolCommand::new(&self.config.binary_path, "Stream probe")
            .args([
                "-loglevel",
                "error",
                "-show_entries",
                "stream=codec_type",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .path_arg(path)
            .timeout_secs(self.config.timeout_secs)
    }
}

/// Classify probe output; video wins over audio
pub fn classify_codec_types(stdout: &str) -> MediaKind {
    let mut kind = MediaKind::Unknown;
    for token in stdout.lines().map(str::trim) {
        match token {
            "video" => return MediaKind::Video,
            "audio" => kind = MediaKind::Audio,
            _ => {}
        }
    }
    kind
}

#[async_trait]
impl MediaProbeTrait for FfprobeProbe {
    async fn classify(&self, path: &Path) -> Result<MediaKind> {
        let command = self.build_command(path);
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| RemoverError::Introspection(e.to_string()))?;

        if !output.success() {
            return Err(RemoverError::Introspection(format!(
                "ffprobe exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let kind = classify_codec_types(&output.stdout);
        debug!("{} classified as {}", path.display(), kind);
        Ok(kind)
    }

    async fn check_availability(&self) -> Result<()> {
        let command = ToolCommand::new(&self.config.binary_path, "Probe version check")
            .arg("-version")
            .timeout_secs(Some(10));
        let output = self.runner.run(&command).await?;

        if output.success() {
            info!("Stream probe is available");
            Ok(())
        } else {
            Err(RemoverError::Introspection("ffprobe version check failed".to_string()))
        }
    }
}
