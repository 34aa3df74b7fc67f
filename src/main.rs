//! srt2rag - Subtitle to knowledge-base text conversion
//!
//! Entry point: sets up logging, loads configuration and runs the selected
//! command.

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use srt2rag::cli::{Args, Commands};
use srt2rag::config::{Config, Credentials};
use srt2rag::provider::Vendor;
use srt2rag::session::ProviderSession;
use srt2rag::workflow::{FileOutcome, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Pick up API keys from ./.env; a missing file is not an error
    dotenvy::dotenv().ok();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = setup_logging(args.verbose)?;

    match args.command {
        Commands::Init { path, force } => {
            if path.exists() && !force {
                return Err(anyhow!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                ));
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        Commands::Providers => {
            let config = load_config(args.config.as_deref())?;
            let credentials = Credentials::from_env(&config);
            print_providers(&config, &credentials);
        }
        Commands::Process { input_dir, output_dir, provider } => {
            let config = load_config(args.config.as_deref())?;

            // Configuration problems here are fatal for the whole run
            let specs = config.select_providers(provider.as_deref())?;
            let credentials = Credentials::from_env(&config);
            let workflow = Workflow::new(config.clone())?;
            let session = ProviderSession::open(&specs, &credentials, config.rate_limit.timeout())?;
            info!("Available providers: {:?}", session.names());

            let report = workflow.run(session, &input_dir, &output_dir).await?;

            for error in &report.release_errors {
                warn!("Cleanup: {}", error);
            }
            for file in &report.files {
                if let FileOutcome::Failed { error } = &file.outcome {
                    println!("FAILED  {}: {}", file.input.display(), error);
                    let tried = error.failed_providers();
                    if !tried.is_empty() {
                        println!("        tried: {}", tried.join(" -> "));
                    }
                }
            }
            println!(
                "\n{} written, {} skipped, {} failed",
                report.written(),
                report.skipped(),
                report.failed()
            );

            if report.has_failures() {
                return Err(anyhow!("{} file(s) failed", report.failed()));
            }
        }
    }

    info!("srt2rag completed successfully");
    Ok(())
}

/// Load the given config file, else ./config.toml, else defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            let local = PathBuf::from("config.toml");
            if local.exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file(&local)?
            } else {
                info!("No config.toml found, using built-in defaults");
                Config::default()
            }
        }
    };
    Ok(config)
}

fn print_providers(config: &Config, credentials: &Credentials) {
    println!("\nConfigured Providers (fallback order):");
    println!(
        "{:<14} {:<34} {:<8} {:<11} {:<9} {:<20}",
        "Name", "Model", "Enabled", "Max tokens", "Limit", "API key"
    );
    println!("{}", "-".repeat(100));

    for spec in &config.providers {
        let limit = Vendor::from_name(&spec.name)
            .max_tokens_ceiling()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let key = if credentials.get(&spec.name).is_some() {
            "set".to_string()
        } else {
            format!("missing ({})", spec.credential_env())
        };

        println!(
            "{:<14} {:<34} {:<8} {:<11} {:<9} {:<20}",
            spec.name,
            spec.model,
            if spec.enabled { "yes" } else { "no" },
            spec.max_tokens,
            limit,
            key
        );
    }
}

fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".srt2rag").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "srt2rag.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("srt2rag.log").display()
    );

    Ok(guard)
}
