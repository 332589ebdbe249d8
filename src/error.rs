use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid media reference: {0}")]
    InvalidReference(String),

    #[error("Failed to resolve remote media: {0}")]
    Resolution(String),

    #[error("Failed to fetch remote media: {0}")]
    Fetch(String),

    #[error("Failed to write media file: {0}")]
    Write(String),

    #[error("Media processor exited with error (code {code:?}): {stderr}")]
    ProcessingExit { code: Option<i32>, stderr: String },

    #[error("Media processor reported no result path: {0}")]
    ProcessingOutput(String),

    #[error("{tool} did not finish within {secs}s")]
    ProcessingTimeout { tool: String, secs: u64 },

    #[error("Media introspection failed: {0}")]
    Introspection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RemoverError {
    /// Message shown to the person who submitted the request.
    pub fn user_message(&self) -> &'static str {
        match self {
            RemoverError::InvalidReference(_) => "The link or file is not valid.",
            RemoverError::Resolution(_) => "Could not read information about the video at that link.",
            RemoverError::Fetch(_) => "Downloading the video failed.",
            RemoverError::Write(_) => "The media file could not be saved.",
            RemoverError::ProcessingExit { .. } => "Processing failed.",
            RemoverError::ProcessingOutput(_) => "The processed file path could not be found.",
            RemoverError::ProcessingTimeout { .. } => "Processing took too long and was stopped.",
            RemoverError::Introspection(_) => "The media type could not be detected.",
            RemoverError::Config(_) => "The application is not configured correctly.",
            RemoverError::Io(_) => "An unexpected error occurred."
        }
    }

    /// Everything except a failed probe ends the request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoverError::Introspection(_))
    }
}

pub type Result<T> = std::result::Result<T, RemoverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_introspection_is_the_only_non_terminal_kind() {
        assert!(!RemoverError::Introspection("probe".into()).is_terminal());
        assert!(RemoverError::ProcessingOutput("none".into()).is_terminal());
        assert!(RemoverError::ProcessingExit { code: Some(1), stderr: String::new() }.is_terminal());
        assert!(RemoverError::InvalidReference("x".into()).is_terminal());
    }

    #[test]
    fn test_user_messages_are_distinct_per_pipeline_kind() {
        let kinds = [
            RemoverError::InvalidReference(String::new()),
            RemoverError::Resolution(String::new()),
            RemoverError::Fetch(String::new()),
            RemoverError::Write(String::new()),
            RemoverError::ProcessingExit { code: None, stderr: String::new() },
            RemoverError::ProcessingOutput(String::new()),
            RemoverError::ProcessingTimeout { tool: "p".into(), secs: 1 },
            RemoverError::Introspection(String::new()),
        ];
        let mut messages: Vec<_> = kinds.iter().map(|k| k.user_message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }
}
