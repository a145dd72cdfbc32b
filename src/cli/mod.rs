//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Document chunking and hybrid retrieval engine",
    long_about = "Quarry splits documents into overlapping, sentence-aligned chunks, indexes \
                  them for vector and keyword search, and answers queries through a fused, \
                  reranked hybrid retrieval pipeline."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/quarry/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest text documents: segment, embed, and index them
    Ingest {
        /// Files to ingest (document id defaults to the file stem)
        paths: Vec<PathBuf>,
    },

    /// Search the indexed corpus
    Search {
        /// Query text
        query: String,

        /// Retrieval mode: vector, keyword, concept, or hybrid
        #[arg(short, long, value_parser = ["vector", "keyword", "concept", "hybrid"], default_value = "hybrid")]
        mode: String,

        /// Maximum number of results to return
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Discard candidates below this similarity (0..=1)
        #[arg(short, long, default_value = "0.0")]
        threshold: f32,

        /// Skip the multi-factor reranker
        #[arg(long)]
        no_rerank: bool,

        /// Restrict results to these document ids
        #[arg(short, long)]
        resource: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show corpus statistics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the active configuration
    Show,

    /// Validate the configuration file
    Validate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
