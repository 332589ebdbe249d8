use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, debug, warn};

use crate::config::ProcessorConfig;
use crate::error::{Result, RemoverError};
use super::marker::{find_result_path, resolve_reported_path, MarkerLine};
use super::{CommandOutput, CommandRunner, MediaProcessorTrait, ToolCommand};

/// Environment variable the processor reads to locate its audio-isolation model
pub const DEEP_FILTER_ENV: &str = "DEEPFILTERNET_PATH";

/// Invokes the native media processor once per input file
pub struct MediaProcessorImpl {
    config: ProcessorConfig,
    deep_filter_path: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl MediaProcessorImpl {
    pub fn new(
        config: ProcessorConfig,
        deep_filter_path: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            deep_filter_path,
            runner,
        }
    }

    /// Build `<processor> <input>` with the configured environment
    pub fn build_command(&self, input_path: &Path) -> ToolCommand {
        let mut command = ToolCommand::new(&self.config.binary_path, "Media processor")
            .path_arg(input_path)
            .timeout_secs(self.config.timeout_secs);

        if let Some(dir) = &self.config.working_dir {
            command = command.current_dir(dir);
        }
        if let Some(model_dir) = &self.deep_filter_path {
            command = command.env(DEEP_FILTER_ENV, model_dir.to_string_lossy().to_string());
        }

        command
    }
}

/// Map a finished processor run to the result path.
///
/// A non-zero exit fails regardless of what was printed.
pub fn interpret_output(output: &CommandOutput, working_dir: Option<&Path>) -> Result<PathBuf> {
    if !output.success() {
        return Err(RemoverError::ProcessingExit {
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    match find_result_path(&output.stdout) {
        MarkerLine::Found(raw) => resolve_reported_path(&raw, working_dir)
            .map_err(|e| RemoverError::ProcessingOutput(format!("Cannot resolve '{}': {}", raw, e))),
        MarkerLine::Malformed(line) => Err(RemoverError::ProcessingOutput(format!(
            "Success line carries no path: {}",
            line
        ))),
        MarkerLine::Missing => Err(RemoverError::ProcessingOutput(
            "No success line in processor output".to_string(),
        )),
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn process(&self, input_path: &Path) -> Result<PathBuf> {
        info!("Processing {}", input_path.display());

        let command = self.build_command(input_path);
        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(RemoverError::Io(e)) => {
                return Err(RemoverError::ProcessingExit { code: None, stderr: e.to_string() });
            }
            Err(e) => return Err(e),
        };
        debug!("Processor stdout:\n{}", output.stdout);

        let result = interpret_output(&output, self.config.working_dir.as_deref())?;
        if !result.exists() {
            warn!("Processor reported {} but it does not exist", result.display());
        }

        info!("Processing completed: {}", result.display());
        Ok(result)
    }

    fn check_availability(&self) -> Result<()> {
        let path = Path::new(&self.config.binary_path);
        if path.is_file() {
            info!("Media processor is available");
            Ok(())
        } else {
            Err(RemoverError::Config(format!(
                "Media processor not found at {}",
                path.display()
            )))
        }
    }
}
