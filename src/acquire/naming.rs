use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use url::Url;

use crate::error::{Result, RemoverError};

/// Suffix of the processor's intermediate isolated-audio track
pub const ISOLATED_AUDIO_SUFFIX: &str = "_isolated_audio.wav";
/// Suffix of the processor's final output
pub const PROCESSED_VIDEO_SUFFIX: &str = "_processed_video.mp4";
/// Extension of a raw remote fetch
pub const RAW_FETCH_EXTENSION: &str = "webm";

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Works on Unicode scalar values: `"vïdeo"` becomes `"v_deo"`, one
/// underscore per character regardless of its UTF-8 width.
pub fn sanitize_filename(name: &str) -> String {
    name.chars().map(|c| if is_allowed(c) { c } else { '_' }).collect()
}

/// A filesystem-safe name produced by [`sanitize_filename`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedName(String);

impl SanitizedName {
    pub fn new(raw: &str) -> Self {
        Self(sanitize_filename(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for names that would address a directory instead of a file
    pub fn is_unusable(&self) -> bool {
        self.0.is_empty() || self.0 == "." || self.0 == ".."
    }

    /// Name without its final extension (`clip.final.mp4` -> `clip.final`)
    pub fn base_name(&self) -> &str {
        Path::new(&self.0)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when `candidate` parses as a URL with both a scheme and a host
pub fn validate_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

/// Every artifact the pipeline derives from one base name
pub fn derived_artifacts(uploads_dir: &Path, base: &str) -> [PathBuf; 3] {
    [
        uploads_dir.join(format!("{}.{}", base, RAW_FETCH_EXTENSION)),
        uploads_dir.join(format!("{}{}", base, ISOLATED_AUDIO_SUFFIX)),
        uploads_dir.join(format!("{}{}", base, PROCESSED_VIDEO_SUFFIX)),
    ]
}

/// Base name with every trailing derived-artifact stem removed.
///
/// `clip_processed_video` and `clip_isolated_audio` both reduce to `clip`, so
/// a file stored under one of them is also one of `clip`'s derived artifacts.
/// Names sharing a root must never be cleaned and written concurrently.
pub fn artifact_root(base: &str) -> &str {
    let stems = [
        ISOLATED_AUDIO_SUFFIX.trim_end_matches(".wav"),
        PROCESSED_VIDEO_SUFFIX.trim_end_matches(".mp4"),
    ];
    let mut root = base;
    while let Some(stripped) = stems.iter().find_map(|stem| root.strip_suffix(stem)) {
        root = stripped;
    }
    root
}

/// Delete leftovers from an earlier run with the same base name
pub async fn remove_stale_artifacts(uploads_dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    remove_existing(&derived_artifacts(uploads_dir, base)).await
}

/// Delete the processor's partial outputs, keeping the acquired input
pub async fn remove_processing_outputs(uploads_dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    let [_, isolated, processed] = derived_artifacts(uploads_dir, base);
    remove_existing(&[isolated, processed]).await
}

async fn remove_existing(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                info!("Removed stale file: {}", path.display());
                removed.push(path.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RemoverError::Write(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_sanitize_replaces_each_character_once() {
        assert_eq!(sanitize_filename("my vïdeo (final)!.mp4"), "my_v_deo__final__.mp4");
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("a\\b"), "a_b");
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("日本語"), "___");
    }

    #[test]
    fn test_sanitize_properties() {
        let samples = ["", "plain.mp4", "tab\there", "emoji 🎵 song", "Ünïcödé/é", "a-b_c.D9"];
        for sample in samples {
            let once = sanitize_filename(sample);
            assert_eq!(once.chars().count(), sample.chars().count());
            assert!(once.chars().all(is_allowed));
            assert_eq!(sanitize_filename(&once), once);
            assert!(!once.contains('/') && !once.contains('\\'));
        }
    }

    #[test]
    fn test_base_name_and_unusable_names() {
        assert_eq!(SanitizedName::new("clip.final.mp4").base_name(), "clip.final");
        assert_eq!(SanitizedName::new("Some Title").base_name(), "Some_Title");
        assert!(SanitizedName::new("..").is_unusable());
        assert!(SanitizedName::new("").is_unusable());
        assert!(!SanitizedName::new("...").is_unusable());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/watch?v=x"));
        assert!(validate_url("http://youtu.be/abc"));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("ftp://"));
        assert!(!validate_url("mailto:someone@example.com"));
        assert!(!validate_url("file:///tmp/video.mp4"));
        assert!(!validate_url(""));
    }

    #[test]
    fn test_artifact_root_strips_derived_stems() {
        assert_eq!(artifact_root("clip"), "clip");
        assert_eq!(artifact_root("clip_processed_video"), "clip");
        assert_eq!(artifact_root("clip_isolated_audio"), "clip");
        assert_eq!(artifact_root("clip_processed_video_isolated_audio"), "clip");
        assert_eq!(artifact_root("clip_processed"), "clip_processed");
        assert_eq!(artifact_root("clip.final"), "clip.final");
    }

    #[test]
    fn test_overlapping_artifacts_share_a_root() {
        let dir = Path::new("/uploads");
        let upload_base = SanitizedName::new("clip_processed_video.mp4");
        let upload_target = dir.join(upload_base.as_str());

        assert!(derived_artifacts(dir, "clip").contains(&upload_target));
        assert_eq!(artifact_root(upload_base.base_name()), artifact_root("clip"));
    }

    #[tokio::test]
    async fn test_remove_stale_artifacts() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("foo.webm").touch().unwrap();
        temp.child("foo_processed_video.mp4").touch().unwrap();
        temp.child("foobar.webm").touch().unwrap();

        let removed = remove_stale_artifacts(temp.path(), "foo").await.unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!temp.child("foo.webm").path().exists());
        assert!(!temp.child("foo_processed_video.mp4").path().exists());
        assert!(temp.child("foobar.webm").path().exists());
    }

    #[tokio::test]
    async fn test_remove_processing_outputs_keeps_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("foo.webm").touch().unwrap();
        temp.child("foo_isolated_audio.wav").touch().unwrap();

        remove_processing_outputs(temp.path(), "foo").await.unwrap();

        assert!(temp.child("foo.webm").path().exists());
        assert!(!temp.child("foo_isolated_audio.wav").path().exists());
    }
}
