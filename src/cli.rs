use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove music from a local video file
    Upload {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Download a remote video and remove its music
    Url {
        /// Link to the video page
        url: String,
    },

    /// Detect whether a file holds video or audio
    Probe {
        /// Media file to inspect
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination of the configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}
