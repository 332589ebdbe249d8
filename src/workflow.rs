use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::acquire::{
    remove_processing_outputs, AcquiredMedia, AcquisitionService, BaseNameLocks, MediaAcquirerTrait,
};
use crate::config::Config;
use crate::error::{Result, RemoverError};
use crate::media::{
    CommandRunner, MediaKind, MediaProbeTrait, MediaProcessorTrait, MediaToolFactory, SystemCommandRunner,
};
use crate::reference::MediaReference;

/// Lifecycle of one request; every request ends in exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Idle,
    Validating,
    Acquiring,
    Processing,
    Succeeded,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Succeeded | RequestState::Failed)
    }
}

/// Processed output plus the metadata shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedMedia {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: Option<u64>,
    pub kind: MediaKind,
    pub base_name: String,
    pub completed_at: DateTime<Utc>,
}

impl ProcessedMedia {
    pub fn size_mb(&self) -> Option<f64> {
        self.size_bytes.map(|bytes| bytes as f64 / (1024.0 * 1024.0))
    }
}

#[derive(Debug)]
struct Lifecycle {
    states: Vec<RequestState>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            states: vec![RequestState::Idle],
        }
    }

    fn enter(&mut self, state: RequestState) {
        info!("Request state: {:?}", state);
        self.states.push(state);
    }
}

pub struct Workflow {
    uploads_dir: PathBuf,
    acquirer: Box<dyn MediaAcquirerTrait>,
    processor: Box<dyn MediaProcessorTrait>,
    probe: Box<dyn MediaProbeTrait>,
}

impl Workflow {
    /// Build the pipeline from a resolved configuration
    pub fn new(config: Config) -> Result<Self> {
        if !config.paths.uploads_dir.is_absolute() {
            return Err(RemoverError::Config(format!(
                "Uploads directory must be absolute: {}",
                config.paths.uploads_dir.display()
            )));
        }

        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
        let acquirer = AcquisitionService::from_config(&config, runner.clone(), BaseNameLocks::new());
        let processor = MediaToolFactory::create_processor(&config, runner.clone());
        let probe = MediaToolFactory::create_probe(&config, runner);

        Ok(Self::with_components(
            config.paths.uploads_dir,
            Box::new(acquirer),
            processor,
            probe,
        ))
    }

    pub fn with_components(
        uploads_dir: PathBuf,
        acquirer: Box<dyn MediaAcquirerTrait>,
        processor: Box<dyn MediaProcessorTrait>,
        probe: Box<dyn MediaProbeTrait>,
    ) -> Self {
        Self {
            uploads_dir,
            acquirer,
            processor,
            probe,
        }
    }

    /// Validate, acquire, process and describe one reference
    pub async fn run(&self, reference: MediaReference) -> Result<ProcessedMedia> {
        self.run_traced(reference).await.0
    }

    /// Like [`Workflow::run`], also returning the visited states
    pub async fn run_traced(&self, reference: MediaReference) -> (Result<ProcessedMedia>, Vec<RequestState>) {
        let span = info_span!("request", id = %Uuid::new_v4());
        async move {
            let mut lifecycle = Lifecycle::new();
            let result = self.drive(reference, &mut lifecycle).await;
            match &result {
                Ok(media) => {
                    lifecycle.enter(RequestState::Succeeded);
                    info!("Request succeeded: {}", media.path.display());
                }
                Err(e) => {
                    lifecycle.enter(RequestState::Failed);
                    warn!("Request failed: {}", e);
                }
            }
            (result, lifecycle.states)
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, reference: MediaReference, lifecycle: &mut Lifecycle) -> Result<ProcessedMedia> {
        lifecycle.enter(RequestState::Validating);
        info!("Received {:?}", reference);
        reference.validate()?;

        lifecycle.enter(RequestState::Acquiring);
        let acquired = match &reference {
            MediaReference::Upload { name, content } => self.acquirer.acquire_from_upload(name, content).await?,
            MediaReference::RemoteUrl { url } => self.acquirer.acquire_from_url(url).await?,
        };
        info!("Acquired {} (base name '{}')", acquired.path.display(), acquired.base_name);

        lifecycle.enter(RequestState::Processing);
        let output = self.process(&acquired).await?;
        let media = self.describe(&output, &acquired.base_name).await;

        // Released only after the output has been described
        drop(acquired);
        Ok(media)
    }

    async fn process(&self, acquired: &AcquiredMedia) -> Result<PathBuf> {
        match self.processor.process(&acquired.path).await {
            Ok(path) => Ok(path),
            Err(e @ RemoverError::ProcessingTimeout { .. }) => {
                // A killed processor may leave half-written files behind
                if let Err(cleanup) = remove_processing_outputs(&self.uploads_dir, &acquired.base_name).await {
                    warn!("Failed to remove partial output: {}", cleanup);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Display metadata for `path`; probe failures degrade to unknown
    pub async fn describe(&self, path: &Path, base_name: &str) -> ProcessedMedia {
        let kind = match self.probe.classify(path).await {
            Ok(kind) => kind,
            Err(e) => {
                warn!("{}", e);
                MediaKind::Unknown
            }
        };
        let size_bytes = fs::metadata(path).await.ok().map(|m| m.len());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        ProcessedMedia {
            path: path.to_path_buf(),
            file_name,
            size_bytes,
            kind,
            base_name: base_name.to_string(),
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::MockMediaAcquirerTrait;
    use crate::media::{MockMediaProbeTrait, MockMediaProcessorTrait};
    use assert_fs::prelude::*;
    use mockall::Sequence;

    fn acquired(path: &Path, base: &str) -> AcquiredMedia {
        AcquiredMedia::new(path.to_path_buf(), base.to_string(), None)
    }

    #[tokio::test]
    async fn test_invalid_url_touches_no_collaborator() {
        let mut acquirer = MockMediaAcquirerTrait::new();
        acquirer.expect_acquire_from_url().never();
        acquirer.expect_acquire_from_upload().never();
        let mut processor = MockMediaProcessorTrait::new();
        processor.expect_process().never();
        let mut probe = MockMediaProbeTrait::new();
        probe.expect_classify().never();

        let workflow = Workflow::with_components(
            PathBuf::from("/uploads"),
            Box::new(acquirer),
            Box::new(processor),
            Box::new(probe),
        );

        let (result, states) = workflow.run_traced(MediaReference::remote("not a url")).await;

        assert!(matches!(result, Err(RemoverError::InvalidReference(_))));
        assert_eq!(
            states,
            vec![RequestState::Idle, RequestState::Validating, RequestState::Failed]
        );
    }

    #[tokio::test]
    async fn test_url_success_passes_through_every_state() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("clip.webm").touch().unwrap();
        temp.child("clip_processed_video.mp4").write_binary(&[0u8; 2048]).unwrap();
        let input = temp.child("clip.webm").path().to_path_buf();
        let output = temp.child("clip_processed_video.mp4").path().to_path_buf();

        let mut seq = Sequence::new();
        let mut acquirer = MockMediaAcquirerTrait::new();
        let acquired_input = input.clone();
        acquirer
            .expect_acquire_from_url()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(acquired(&acquired_input, "clip")));
        let mut processor = MockMediaProcessorTrait::new();
        let processed = output.clone();
        processor
            .expect_process()
            .withf(move |path| path == input.as_path())
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(processed.clone()));
        let mut probe = MockMediaProbeTrait::new();
        probe
            .expect_classify()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(MediaKind::Video));

        let workflow = Workflow::with_components(
            temp.path().to_path_buf(),
            Box::new(acquirer),
            Box::new(processor),
            Box::new(probe),
        );

        let (result, states) = workflow
            .run_traced(MediaReference::remote("https://example.com/watch?v=x"))
            .await;
        let media = result.unwrap();

        assert_eq!(media.path, output);
        assert_eq!(media.file_name, "clip_processed_video.mp4");
        assert_eq!(media.size_bytes, Some(2048));
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(
            states,
            vec![
                RequestState::Idle,
                RequestState::Validating,
                RequestState::Acquiring,
                RequestState::Processing,
                RequestState::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_demote_success() {
        let mut acquirer = MockMediaAcquirerTrait::new();
        acquirer
            .expect_acquire_from_upload()
            .times(1)
            .returning(|name, _| Ok(acquired(&Path::new("/uploads").join(name), "a")));
        let mut processor = MockMediaProcessorTrait::new();
        processor
            .expect_process()
            .times(1)
            .returning(|_| Ok(PathBuf::from("/uploads/a_processed_video.mp4")));
        let mut probe = MockMediaProbeTrait::new();
        probe
            .expect_classify()
            .returning(|_| Err(RemoverError::Introspection("ffprobe exited with 1".into())));

        let workflow = Workflow::with_components(
            PathBuf::from("/uploads"),
            Box::new(acquirer),
            Box::new(processor),
            Box::new(probe),
        );

        let media = workflow
            .run(MediaReference::upload("a.mp4", b"data".to_vec()))
            .await
            .unwrap();

        assert_eq!(media.kind, MediaKind::Unknown);
        assert_eq!(media.size_bytes, None);
    }

    #[tokio::test]
    async fn test_acquisition_failure_skips_processing() {
        let mut acquirer = MockMediaAcquirerTrait::new();
        acquirer
            .expect_acquire_from_url()
            .returning(|_| Err(RemoverError::Fetch("network".into())));
        let mut processor = MockMediaProcessorTrait::new();
        processor.expect_process().never();
        let mut probe = MockMediaProbeTrait::new();
        probe.expect_classify().never();

        let workflow = Workflow::with_components(
            PathBuf::from("/uploads"),
            Box::new(acquirer),
            Box::new(processor),
            Box::new(probe),
        );

        let (result, states) = workflow
            .run_traced(MediaReference::remote("https://example.com/v"))
            .await;

        assert!(matches!(result, Err(RemoverError::Fetch(_))));
        assert_eq!(states.last(), Some(&RequestState::Failed));
        assert!(!states.contains(&RequestState::Processing));
    }

    #[tokio::test]
    async fn test_processing_failure_is_terminal_without_probe() {
        let mut acquirer = MockMediaAcquirerTrait::new();
        acquirer
            .expect_acquire_from_url()
            .returning(|_| Ok(acquired(Path::new("/uploads/a.webm"), "a")));
        let mut processor = MockMediaProcessorTrait::new();
        processor
            .expect_process()
            .times(1)
            .returning(|_| Err(RemoverError::ProcessingOutput("no marker".into())));
        let mut probe = MockMediaProbeTrait::new();
        probe.expect_classify().never();

        let workflow = Workflow::with_components(
            PathBuf::from("/uploads"),
            Box::new(acquirer),
            Box::new(processor),
            Box::new(probe),
        );

        let (result, states) = workflow
            .run_traced(MediaReference::remote("https://example.com/v"))
            .await;

        assert!(matches!(result, Err(RemoverError::ProcessingOutput(_))));
        assert_eq!(states.iter().filter(|s| s.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_removes_partial_outputs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.webm").touch().unwrap();
        temp.child("a_isolated_audio.wav").touch().unwrap();
        temp.child("a_processed_video.mp4").touch().unwrap();
        let input = temp.child("a.webm").path().to_path_buf();

        let mut acquirer = MockMediaAcquirerTrait::new();
        acquirer
            .expect_acquire_from_url()
            .returning(move |_| Ok(acquired(&input, "a")));
        let mut processor = MockMediaProcessorTrait::new();
        processor.expect_process().returning(|_| {
            Err(RemoverError::ProcessingTimeout { tool: "Media processor".into(), secs: 5 })
        });
        let mut probe = MockMediaProbeTrait::new();
        probe.expect_classify().never();

        let workflow = Workflow::with_components(
            temp.path().to_path_buf(),
            Box::new(acquirer),
            Box::new(processor),
            Box::new(probe),
        );

        let result = workflow.run(MediaReference::remote("https://example.com/v")).await;

        assert!(matches!(result, Err(RemoverError::ProcessingTimeout { .. })));
        assert!(temp.child("a.webm").path().exists());
        assert!(!temp.child("a_isolated_audio.wav").path().exists());
        assert!(!temp.child("a_processed_video.mp4").path().exists());
    }

    #[test]
    fn test_new_rejects_relative_uploads_dir() {
        let result = Workflow::new(Config::default());
        assert!(matches!(result, Err(RemoverError::Config(_))));
    }
}
