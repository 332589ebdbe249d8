//! Parser for the processor's success line.
//!
//! The processor reports its result on standard output with a line such as
//!
//! ```text
//! Video processed successfully: "/abs/path/clip_processed_video.mp4"
//! ```
//!
//! Marker strings, the `": "` separator and the optional quoting are a wire
//! contract with the native binary and must not change.

use std::path::{Path, PathBuf};

/// Substrings that identify a success line
pub const SUCCESS_MARKERS: [&str; 2] = ["Video processed successfully", "Audio processed successfully"];

const PATH_SEPARATOR: &str = ": ";

/// Outcome of scanning processor output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerLine {
    /// First success line and the raw path it carries
    Found(String),
    /// A success line exists but carries no usable path
    Malformed(String),
    /// No line contains a success marker
    Missing,
}

/// Find the first success line in `stdout` and extract its raw path.
///
/// Only the first matching line is considered, even when it is malformed.
/// An empty path (`Video processed successfully: ""`) is reported as
/// [`MarkerLine::Malformed`] instead of being resolved to the working
/// directory, which is never a usable output file.
pub fn find_result_path(stdout: &str) -> MarkerLine {
    let Some(line) = stdout
        .lines()
        .find(|line| SUCCESS_MARKERS.iter().any(|marker| line.contains(marker)))
    else {
        return MarkerLine::Missing;
    };

    let Some((_, rest)) = line.split_once(PATH_SEPARATOR) else {
        return MarkerLine::Malformed(line.to_string());
    };

    let path = strip_quotes(rest.trim());
    if path.is_empty() {
        MarkerLine::Malformed(line.to_string())
    } else {
        MarkerLine::Found(path.to_string())
    }
}

/// Remove one pair of matching surrounding quotes
fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Resolve a reported path to an absolute one.
///
/// Relative paths are taken relative to `working_dir` when the processor ran
/// in one, otherwise relative to the current directory.
pub fn resolve_reported_path(raw: &str, working_dir: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = Path::new(raw);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match working_dir {
        Some(dir) => std::path::absolute(dir.join(path)),
        None => std::path::absolute(path),
    }
}
