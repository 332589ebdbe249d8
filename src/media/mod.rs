// External media tools
//
// - Commands: tool invocation and the process runner seam
// - Marker: the processor's success-line protocol
// - Processor: runs the native music-removal binary
// - Probe: ffprobe stream classification

pub mod commands;
pub mod marker;
pub mod processor;
pub mod probe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commands::*;
pub use processor::*;
pub use probe::*;

use crate::config::Config;
use crate::error::Result;

/// Stream content of a media file, used for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Unknown,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Runs the external music-removal processor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Process `input_path` and return the absolute path of the result
    async fn process(&self, input_path: &Path) -> Result<PathBuf>;

    /// Check if the processor binary is present
    fn check_availability(&self) -> Result<()>;
}

/// Read-only classification of media files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProbeTrait: Send + Sync {
    async fn classify(&self, path: &Path) -> Result<MediaKind>;

    async fn check_availability(&self) -> Result<()>;
}

/// Factory for the media tool implementations
pub struct MediaToolFactory;

impl MediaToolFactory {
    pub fn create_processor(config: &Config, runner: Arc<dyn CommandRunner>) -> Box<dyn MediaProcessorTrait> {
        Box::new(MediaProcessorImpl::new(
            config.processor.clone(),
            config.paths.deep_filter_path.clone(),
            runner,
        ))
    }

    pub fn create_probe(config: &Config, runner: Arc<dyn CommandRunner>) -> Box<dyn MediaProbeTrait> {
        Box::new(FfprobeProbe::new(config.probe.clone(), runner))
    }
}
