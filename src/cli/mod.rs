//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    author = "neur0map",
    about = "Ask questions about your own documents",
    long_about = "docqa splits a folder of PDF, Markdown and text files into overlapping chunks, \
                  embeds them into a persistent vector index, and answers questions using the most \
                  relevant chunks as context for a language model."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "local", "retrieval-only")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vector index from the source documents
    Ingest {
        /// Directory containing the documents (overrides corpus.source_dir)
        #[arg(short, long, value_name = "DIR")]
        source: Option<PathBuf>,

        /// Index directory (overrides index.path)
        #[arg(short, long, value_name = "DIR")]
        index: Option<PathBuf>,
    },

    /// Answer a question from the indexed documents
    Ask {
        /// Question to ask
        question: String,

        /// Number of context chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the chunks most similar to a query, without generating an answer
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop
    Chat {
        /// Number of context chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Run every question in a file and print context and answers
    Eval {
        /// File with one question per line
        file: PathBuf,

        /// Number of context chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Show the persisted index
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
