//! Music Remover - command line front end
//!
//! Accepts a local video or a remote link, removes its music with the native
//! media processor and prints where the result was written.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use music_remover::cli::{Args, Commands};
use music_remover::config::Config;
use music_remover::reference::MediaReference;
use music_remover::setup::SetupManager;
use music_remover::workflow::{ProcessedMedia, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Music Remover");

    if let Commands::InitConfig { output } = &args.command {
        Config::default().save_to_file(output)?;
        println!("Wrote default configuration to {}", output.display());
        return Ok(());
    }

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    let config = config.resolve_paths(std::env::current_dir()?)?;

    SetupManager::new().initialize(&config).await?;
    let workflow = Workflow::new(config)?;

    let reference = match args.command {
        Commands::Upload { input } => {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let content = tokio::fs::read(&input).await?;
            MediaReference::upload(name, content)
        }
        Commands::Url { url } => MediaReference::remote(url),
        Commands::Probe { input } => {
            let path = std::path::absolute(&input)?;
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let media = workflow.describe(&path, &stem).await;
            print_media(&media, args.json)?;
            return Ok(());
        }
        Commands::InitConfig { .. } => return Ok(()),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message("Processing media...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = workflow.run(reference).await;
    spinner.finish_and_clear();

    match result {
        Ok(media) => {
            print_media(&media, args.json)?;
            info!("Music Remover completed successfully");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn print_media(media: &ProcessedMedia, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(media)?);
        return Ok(());
    }

    println!("\nProcessed media:");
    println!("{:<12} {}", "Path", media.path.display());
    println!("{:<12} {}", "File", media.file_name);
    match media.size_mb() {
        Some(mb) => println!("{:<12} {:.2} MB", "Size", mb),
        None => println!("{:<12} unknown", "Size"),
    }
    println!("{:<12} {}", "Type", media.kind);
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".music-remover").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive every log call
    let file_appender = rolling::daily(&log_dir, "music-remover.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("music-remover.log").display());

    Ok(())
}
