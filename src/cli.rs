use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stream image generation answers from an OpenAI-compatible endpoint
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a settings file (defaults to settings.json in the config directories)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a drawing request and stream the answer
    Generate {
        /// What to draw
        #[arg(short, long)]
        prompt: String,

        /// Number of images to keep
        #[arg(short, long)]
        quantity: Option<usize>,

        /// Aspect ratio hint, e.g. 1:1 or 16:9
        #[arg(short, long)]
        ratio: Option<String>,

        /// Model name
        #[arg(short = 'm', long)]
        model: Option<String>,

        /// API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Record the raw response stream to a file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Replay a recorded response stream through the parser
    Replay {
        /// Recording file
        file: PathBuf,

        /// Re-split the recorded bytes into chunks of this size
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Keep the recorded chunk timing
        #[arg(long)]
        realtime: bool,

        /// Number of images to keep
        #[arg(short, long)]
        quantity: Option<usize>,
    },

    /// Split a message into its thinking span and body
    Split {
        /// Message file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
}
