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

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert every subtitle file in a directory to cleaned text
    Process {
        /// Directory containing .srt files
        #[arg(short, long, default_value = "input")]
        input_dir: PathBuf,

        /// Directory for the cleaned text files
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Use only this provider instead of the configured fallback list
        #[arg(short, long, env = "SRT2RAG_PROVIDER")]
        provider: Option<String>,
    },

    /// List configured providers and whether they are usable
    Providers,

    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
