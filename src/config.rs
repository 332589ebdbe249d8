use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, RemoverError};

fn default_format() -> String {
    "bestvideo+bestaudio/best".to_string()
}

fn default_concurrent_fragments() -> u32 {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub processor: ProcessorConfig,
    pub probe: ProbeConfig,
    pub downloader: DownloaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory where uploads and downloads are materialized
    pub uploads_dir: PathBuf,
    /// Audio-isolation model directory, exported to the processor as DEEPFILTERNET_PATH
    #[serde(default)]
    pub deep_filter_path: Option<PathBuf>,
    /// ffmpeg location handed to the downloader for stream merging
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Path to the native media processor binary
    pub binary_path: String,
    /// Kill the processor after this many seconds (unset waits forever)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Working directory for the processor; relative result paths resolve against it
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Path to ffprobe
    pub binary_path: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Path to yt-dlp
    pub binary_path: String,
    /// Format selector passed to `-f`
    #[serde(default = "default_format")]
    pub format: String,
    /// Number of fragments downloaded in parallel (`-N`)
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                uploads_dir: PathBuf::from("uploads"),
                deep_filter_path: None,
                ffmpeg_path: None,
            },
            processor: ProcessorConfig {
                binary_path: "./MediaProcessor/build/MediaProcessor".to_string(),
                timeout_secs: None,
                working_dir: None,
            },
            probe: ProbeConfig {
                binary_path: "ffprobe".to_string(),
                timeout_secs: Some(60),
            },
            downloader: DownloaderConfig {
                binary_path: "yt-dlp".to_string(),
                format: default_format(),
                concurrent_fragments: default_concurrent_fragments(),
                timeout_secs: None,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RemoverError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RemoverError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RemoverError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RemoverError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Make every configured filesystem path absolute, relative to `base`.
    ///
    /// Program names without a path separator (`ffprobe`, `yt-dlp`) are left
    /// untouched so they are still looked up on `PATH`.
    pub fn resolve_paths<P: AsRef<Path>>(mut self, base: P) -> Result<Self> {
        let base = base.as_ref();
        if !base.is_absolute() {
            return Err(RemoverError::Config(format!(
                "Base directory must be absolute: {}",
                base.display()
            )));
        }

        self.paths.uploads_dir = absolutize(base, &self.paths.uploads_dir);
        self.paths.deep_filter_path = self.paths.deep_filter_path.map(|p| absolutize(base, &p));
        self.paths.ffmpeg_path = self.paths.ffmpeg_path.map(|p| absolutize(base, &p));
        self.processor.working_dir = self.processor.working_dir.map(|p| absolutize(base, &p));

        self.processor.binary_path = resolve_program(base, &self.processor.binary_path);
        self.probe.binary_path = resolve_program(base, &self.probe.binary_path);
        self.downloader.binary_path = resolve_program(base, &self.downloader.binary_path);

        Ok(self)
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        let joined = base.join(path);
        std::path::absolute(&joined).unwrap_or(joined)
    }
}

fn resolve_program(base: &Path, program: &str) -> String {
    if program.contains('/') || program.contains('\\') {
        absolutize(base, Path::new(program)).to_string_lossy().to_string()
    } else {
        program.to_string()
    }
}
