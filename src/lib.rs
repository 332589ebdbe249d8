//! Music Remover - media acquisition and processing pipeline
//!
//! Turns an uploaded file or a remote video link into a local media file,
//! hands it to an external music-removal processor and reports the processed
//! result together with display metadata from ffprobe.

pub mod acquire;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod reference;
pub mod setup;
pub mod workflow;
