use std::fmt;

use crate::acquire::{validate_url, SanitizedName};
use crate::error::{Result, RemoverError};

/// What a user submitted for processing
#[derive(Clone, PartialEq, Eq)]
pub enum MediaReference {
    /// Raw bytes of an uploaded file and the file name it arrived with
    Upload { name: String, content: Vec<u8> },
    /// Link to a remote video page
    RemoteUrl { url: String },
}

impl MediaReference {
    pub fn upload<S: Into<String>>(name: S, content: Vec<u8>) -> Self {
        MediaReference::Upload {
            name: name.into(),
            content,
        }
    }

    /// Surrounding whitespace is dropped so the validated and the fetched
    /// link are the same string
    pub fn remote<S: AsRef<str>>(url: S) -> Self {
        MediaReference::RemoteUrl {
            url: url.as_ref().trim().to_string(),
        }
    }

    /// Structural checks that need no network or filesystem access
    pub fn validate(&self) -> Result<()> {
        match self {
            MediaReference::Upload { name, content } => {
                if name.is_empty() {
                    return Err(RemoverError::InvalidReference("Upload has no file name".to_string()));
                }
                if content.is_empty() {
                    return Err(RemoverError::InvalidReference(format!("Upload '{}' is empty", name)));
                }
                if SanitizedName::new(name).is_unusable() {
                    return Err(RemoverError::InvalidReference(format!(
                        "Upload name '{}' is not a file name",
                        name
                    )));
                }
                Ok(())
            }
            MediaReference::RemoteUrl { url } => {
                if validate_url(url) {
                    Ok(())
                } else {
                    Err(RemoverError::InvalidReference(format!("Not a valid URL: {}", url)))
                }
            }
        }
    }
}

impl fmt::Debug for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaReference::Upload { name, content } => f
                .debug_struct("Upload")
                .field("name", name)
                .field("bytes", &content.len())
                .finish(),
            MediaReference::RemoteUrl { url } => f.debug_struct("RemoteUrl").field("url", url).finish(),
        }
    }
}
